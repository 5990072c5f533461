pub mod extractor;
pub mod llm;
pub mod pattern;
pub mod prompt;
pub mod schema;
pub mod strategy;

pub use extractor::{EntityExtractor, ExtractError};
pub use llm::{LanguageModel, OllamaClient, OllamaConfig};
pub use pattern::PatternExtractor;
pub use schema::{Candidate, ChunkExtraction, ExtractedMention, ENTITY_TYPES};
pub use strategy::{ExtractStrategy, FallbackExtractor, LlmExtractor};
