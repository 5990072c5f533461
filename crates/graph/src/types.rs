use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub url: String,
    pub title: String,
    pub metadata: HashMap<String, String>,
}

/// Persisted form of a text chunk. Immutable once created: the id encodes
/// `(doc_id, start_offset)`, and the same offset in the same document always
/// carries the same content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkNode {
    pub id: String,
    pub doc_id: String,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub page: Option<u32>,
    pub heading: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub canonical_name: String,
    pub entity_type: String,
    /// Surface forms seen for this entity. Set semantics: no duplicates.
    pub aliases: Vec<String>,
    /// Number of distinct mentions linked to this entity.
    pub mention_count: u64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionKind {
    Entity,
    Pronoun,
}

/// One concrete occurrence of a name or pronoun inside a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub chunk_id: String,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub kind: MentionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorefMention {
    pub mention_id: String,
    pub text: String,
    pub kind: MentionKind,
}

/// Derived grouping of COREF_WITH edges sharing a cluster id: one
/// antecedent mention plus the pronouns resolved to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorefChain {
    pub cluster_id: String,
    pub mentions: Vec<CorefMention>,
}

/// Typed edge between two entities, keyed by (type, subject, object).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationEdge {
    pub relation_type: String,
    pub subject_id: String,
    pub object_id: String,
    pub confidence: f64,
    pub evidence: String,
    pub source_chunk_id: String,
    pub year: Option<String>,
}
