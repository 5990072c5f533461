use crate::chunk::Chunk;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Window size in bytes.
    pub chunk_size: usize,
    /// Bytes of overlap carried into the next window, used only for
    /// boundary search; storage never duplicates a chunk id.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split `text` into ordered chunks with byte offsets.
    ///
    /// Each window that does not touch end-of-text is cut at the last
    /// paragraph break (`\n\n`) inside it, else the last sentence break
    /// (`". "` or `".\n"`), else kept whole. The cut is then backed up to a
    /// UTF-8 character boundary so a chunk never splits a multi-byte
    /// sequence and `chunk.text.as_bytes()` always equals the
    /// `[start_offset..end_offset]` slice of the full text.
    pub fn chunk_text(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let len = text.len();
        let mut chunks = Vec::new();
        if len == 0 {
            return chunks;
        }

        let mut start = 0usize;
        let mut index = 0usize;

        while start < len {
            let mut end = (start + self.config.chunk_size).min(len);

            if end < len {
                let window = &text.as_bytes()[start..end];
                if let Some(pos) = rfind(window, b"\n\n") {
                    end = start + pos + 2;
                } else if let Some(pos) = last_sentence_break(window) {
                    end = start + pos + 2;
                }
                while end > start && !text.is_char_boundary(end) {
                    end -= 1;
                }
                // A window shorter than one character cannot happen for any
                // sane chunk_size, but never emit an empty chunk.
                if end == start {
                    end = next_boundary(text, start + 1);
                }
            }

            chunks.push(Chunk::new(
                doc_id.to_string(),
                text[start..end].to_string(),
                start,
                end,
                index,
            ));
            index += 1;

            if end >= len {
                break;
            }

            // Strictly forward progress, even when the overlap would stall.
            let mut next = end.saturating_sub(self.config.chunk_overlap);
            if next <= start {
                next = start + 1;
            }
            next = next_boundary(text, next);
            if next >= len {
                break;
            }
            start = next;
        }

        chunks
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// Position of the `.` of the last `". "` or `".\n"` in the window.
fn last_sentence_break(window: &[u8]) -> Option<usize> {
    let space = rfind(window, b". ");
    let newline = rfind(window, b".\n");
    match (space, newline) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn next_boundary(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos.min(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunks = chunker(1000, 200).chunk_text("doc", "");
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "One small paragraph.";
        let chunks = chunker(1000, 200).chunk_text("doc", text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, text.len());
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = format!("{}\n\n{}", "a".repeat(500), "b".repeat(600));
        let chunks = chunker(800, 100).chunk_text("doc", &text);
        assert!(chunks.len() > 1);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[0].end_offset, 502);
    }

    #[test]
    fn sentence_boundaries_when_no_paragraphs() {
        // 20,000 bytes of repeated sentences: every interior boundary must
        // land on a ". " break and no chunk may be empty.
        let text = "This is a sentence. ".repeat(1000);
        let chunks = chunker(1000, 200).chunk_text("doc", &text);
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.text.ends_with(". "), "chunk ends: {:?}", &chunk.text);
        }
        for chunk in &chunks {
            assert!(chunk.len_bytes() > 0);
        }
    }

    #[test]
    fn offsets_round_trip_to_the_source_bytes() {
        let text = "Sentence one. Sentence two.\n\nSecond paragraph with more text. ".repeat(40);
        let chunks = chunker(300, 60).chunk_text("doc", &text);
        for chunk in &chunks {
            assert_eq!(
                chunk.text.as_bytes(),
                &text.as_bytes()[chunk.start_offset..chunk.end_offset]
            );
        }
        // Coverage: consecutive chunks overlap or touch, never leave a gap.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset <= pair[0].end_offset);
            assert!(pair[1].start_offset > pair[0].start_offset);
        }
        assert_eq!(chunks.last().unwrap().end_offset, text.len());
    }

    #[test]
    fn never_splits_multibyte_sequences() {
        let text = "héllo wörld ünïcödé ".repeat(200);
        let chunks = chunker(97, 13).chunk_text("doc", &text);
        for chunk in &chunks {
            assert!(text.is_char_boundary(chunk.start_offset));
            assert!(text.is_char_boundary(chunk.end_offset));
            assert_eq!(
                chunk.text.as_bytes(),
                &text.as_bytes()[chunk.start_offset..chunk.end_offset]
            );
        }
    }

    #[test]
    fn makes_progress_when_overlap_exceeds_window() {
        let text = "no breaks here just letters".repeat(50);
        let chunks = chunker(10, 50).chunk_text("doc", &text);
        assert!(!chunks.is_empty());
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset > pair[0].start_offset);
        }
    }

    #[test]
    fn rechunking_identical_text_is_idempotent() {
        let text = "Alpha beta. Gamma delta. ".repeat(200);
        let a = chunker(400, 80).chunk_text("doc", &text);
        let b = chunker(400, 80).chunk_text("doc", &text);
        let ids_a: Vec<&str> = a.iter().map(|c| c.chunk_id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
