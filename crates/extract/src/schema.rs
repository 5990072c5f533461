use serde::{Deserialize, Serialize};

/// Allowed entity type vocabulary, listed in the LLM prompt and used by the
/// pattern rules.
pub const ENTITY_TYPES: &[&str] = &[
    "PERSON", "ORG", "GPE", "PRODUCT", "FACILITY", "EVENT", "DATE", "CONCEPT",
];

/// One extraction candidate: a surface form, its type, and its byte offset
/// inside the chunk it was found in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub entity_type: String,
    pub offset: usize,
    pub confidence: f64,
}

/// Shape of one item in the model's JSON response. The model may also
/// report an offset; it is ignored and recomputed from the actual match.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmEntity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

/// Tolerated wrapper shape: `{"entities": [...]}` instead of a bare array.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmEntityList {
    pub entities: Vec<LlmEntity>,
}

/// The chunk-to-mention mapping produced by a chunk extraction run, handed
/// to the coreference, relation, and linking stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedMention {
    pub mention_id: String,
    pub entity_id: String,
    pub text: String,
    pub entity_type: String,
    pub offset: usize,
    pub confidence: f64,
}

impl ExtractedMention {
    pub fn end_offset(&self) -> usize {
        self.offset + self.text.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkExtraction {
    pub chunk_id: String,
    pub mentions: Vec<ExtractedMention>,
}
