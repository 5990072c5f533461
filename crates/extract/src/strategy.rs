use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::llm::LanguageModel;
use crate::prompt;
use crate::schema::{Candidate, LlmEntity, LlmEntityList};

/// Extraction capability: chunk text in, candidates out. Strategies are
/// interchangeable; composition happens through [`FallbackExtractor`].
#[async_trait]
pub trait ExtractStrategy: Send + Sync {
    async fn extract(&self, chunk_text: &str) -> Result<Vec<Candidate>>;
}

/// LLM-backed extraction. The model's claimed offsets are never trusted:
/// each candidate must be a literal substring of the chunk and gets its
/// offset recomputed from the actual match position.
pub struct LlmExtractor<L> {
    llm: L,
    max_tokens: u32,
    temperature: f32,
}

impl<L: LanguageModel> LlmExtractor<L> {
    pub fn new(llm: L) -> Self {
        Self {
            llm,
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl<L: LanguageModel> ExtractStrategy for LlmExtractor<L> {
    async fn extract(&self, chunk_text: &str) -> Result<Vec<Candidate>> {
        let prompt = prompt::build_entity_prompt(chunk_text);
        let raw = self
            .llm
            .generate(&prompt, self.max_tokens, self.temperature)
            .await?;

        let items = parse_entities(&raw).context("Failed to parse entity extraction response")?;

        let mut candidates = Vec::new();
        for item in items {
            let claimed = item.text.trim();
            if claimed.is_empty() {
                continue;
            }
            match locate(chunk_text, claimed) {
                Some(offset) => {
                    // Take the surface form from the chunk itself so the
                    // stored mention matches the source bytes.
                    let text = chunk_text[offset..offset + claimed.len()].to_string();
                    candidates.push(Candidate {
                        text,
                        entity_type: item.entity_type.to_uppercase(),
                        offset,
                        confidence: 0.9,
                    });
                }
                None => {
                    debug!(candidate = %claimed, "dropping entity not present in chunk");
                }
            }
        }
        Ok(candidates)
    }
}

fn parse_entities(raw: &str) -> Result<Vec<LlmEntity>> {
    if let Ok(items) = serde_json::from_str::<Vec<LlmEntity>>(raw) {
        return Ok(items);
    }
    let wrapped: LlmEntityList = serde_json::from_str(raw)?;
    Ok(wrapped.entities)
}

/// Case-sensitive find, then an ASCII-case-insensitive scan at character
/// boundaries. The insensitive path compares byte-for-byte, so the matched
/// span always has the same length as the needle.
fn locate(chunk: &str, needle: &str) -> Option<usize> {
    if let Some(pos) = chunk.find(needle) {
        return Some(pos);
    }
    let n = needle.len();
    if n == 0 || n > chunk.len() {
        return None;
    }
    (0..=chunk.len() - n).find(|&i| {
        chunk.is_char_boundary(i)
            && chunk.is_char_boundary(i + n)
            && chunk.as_bytes()[i..i + n].eq_ignore_ascii_case(needle.as_bytes())
    })
}

/// Decorator: try the primary strategy, and on any error answer from the
/// fallback instead. The primary's error is logged and swallowed, never
/// surfaced to the pipeline.
pub struct FallbackExtractor<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackExtractor<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P: ExtractStrategy, F: ExtractStrategy> ExtractStrategy for FallbackExtractor<P, F> {
    async fn extract(&self, chunk_text: &str) -> Result<Vec<Candidate>> {
        match self.primary.extract(chunk_text).await {
            Ok(candidates) => Ok(candidates),
            Err(error) => {
                warn!(error = %error, "primary extraction failed, using fallback");
                self.fallback.extract(chunk_text).await
            }
        }
    }
}
