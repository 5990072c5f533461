/// Whitespace token with byte offsets into the chunk text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(Token {
                    text: &text[s..idx],
                    start: s,
                    end: idx,
                });
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            text: &text[s..],
            start: s,
            end: text.len(),
        });
    }
    tokens
}

/// Index of the token containing the byte position, or of the nearest
/// token starting after it.
pub fn token_at(tokens: &[Token<'_>], pos: usize) -> usize {
    for (idx, token) in tokens.iter().enumerate() {
        if pos < token.end {
            return idx;
        }
    }
    tokens.len().saturating_sub(1)
}
