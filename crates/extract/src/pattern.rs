use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;

use crate::schema::Candidate;
use crate::strategy::ExtractStrategy;

/// Leading words that disqualify a capitalized sequence from being a name.
const STOP_WORDS: &[&str] = &[
    "the", "this", "that", "these", "those", "a", "an", "in", "on", "at", "it", "he", "she",
    "they", "we", "but", "and", "or", "if", "when", "while", "after", "before", "his", "her",
    "its", "their",
];

/// Regex-rule extraction, used when no language model is available or when
/// the model call fails. Confidences are fixed per rule.
pub struct PatternExtractor {
    name_re: Regex,
    year_re: Regex,
    quote_re: Regex,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self {
            name_re: Regex::new(r"[A-Z][a-z]+(\s+[A-Z][a-z]+)+").unwrap(),
            year_re: Regex::new(r"\b(19|20)\d{2}\b").unwrap(),
            quote_re: Regex::new(r#""([^"]+)""#).unwrap(),
        }
    }

    fn extract_sync(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let mut seen: HashSet<(String, &'static str)> = HashSet::new();

        // Capitalized multi-word sequences not starting with a stop word.
        for m in self.name_re.find_iter(text) {
            let first = m.as_str().split_whitespace().next().unwrap_or("");
            if STOP_WORDS.contains(&first.to_lowercase().as_str()) {
                continue;
            }
            if seen.insert((m.as_str().to_string(), "PERSON")) {
                candidates.push(Candidate {
                    text: m.as_str().to_string(),
                    entity_type: "PERSON".to_string(),
                    offset: m.start(),
                    confidence: 0.5,
                });
            }
        }

        // Four-digit years 1900-2099.
        for m in self.year_re.find_iter(text) {
            if seen.insert((m.as_str().to_string(), "DATE")) {
                candidates.push(Candidate {
                    text: m.as_str().to_string(),
                    entity_type: "DATE".to_string(),
                    offset: m.start(),
                    confidence: 0.8,
                });
            }
        }

        // Double-quoted phrases; the offset points at the quote interior.
        for caps in self.quote_re.captures_iter(text) {
            let interior = caps.get(1).unwrap();
            if seen.insert((interior.as_str().to_string(), "CONCEPT")) {
                candidates.push(Candidate {
                    text: interior.as_str().to_string(),
                    entity_type: "CONCEPT".to_string(),
                    offset: interior.start(),
                    confidence: 0.6,
                });
            }
        }

        candidates
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractStrategy for PatternExtractor {
    async fn extract(&self, chunk_text: &str) -> Result<Vec<Candidate>> {
        Ok(self.extract_sync(chunk_text))
    }
}
