use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::GraphError;
use crate::types::{ChunkNode, CorefChain, Document, Entity, Mention, RelationEdge};

/// Capability consumed by every pipeline stage. All node creation is
/// idempotent upsert keyed by the deterministic ids from `ident`; merge on
/// identity is the sole concurrency-control mechanism, there are no locks
/// spanning calls and no multi-node transactions.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert a document. On repeat create the identity is preserved and
    /// only the mutable fields (title, metadata) are updated.
    async fn create_document(
        &self,
        id: &str,
        url: &str,
        title: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<Document, GraphError>;

    async fn get_document(&self, id: &str) -> Result<Document, GraphError>;

    /// Upsert a chunk and its PART_OF edge. The parent document must exist.
    async fn create_chunk(&self, chunk: &ChunkNode) -> Result<ChunkNode, GraphError>;

    async fn get_chunk(&self, id: &str) -> Result<ChunkNode, GraphError>;

    /// Chunks of a document sorted by start offset. Creation order is not
    /// guaranteed to match; readers always see offset order.
    async fn get_chunks_by_document(&self, doc_id: &str) -> Result<Vec<ChunkNode>, GraphError>;

    /// Upsert an entity. On repeat create the existing canonical name is
    /// kept and the stored confidence is raised to the max observed.
    async fn create_entity(
        &self,
        id: &str,
        name: &str,
        entity_type: &str,
        confidence: f64,
    ) -> Result<Entity, GraphError>;

    async fn get_entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>, GraphError>;

    /// Upsert an entity mention with its FOUND_IN and REFERS_TO edges. The
    /// chunk and entity must already exist.
    #[allow(clippy::too_many_arguments)]
    async fn create_mention(
        &self,
        id: &str,
        chunk_id: &str,
        entity_id: &str,
        text: &str,
        start_offset: usize,
        end_offset: usize,
        confidence: f64,
    ) -> Result<Mention, GraphError>;

    /// Upsert a pronoun mention (FOUND_IN only; it refers to nothing until
    /// a coreference edge is attached).
    async fn create_pronoun_mention(
        &self,
        id: &str,
        chunk_id: &str,
        text: &str,
        start_offset: usize,
        end_offset: usize,
    ) -> Result<Mention, GraphError>;

    async fn get_mention_text(&self, mention_id: &str) -> Result<String, GraphError>;

    /// Create a COREF_WITH edge tagged with the cluster id. Returns false
    /// when the edge already existed.
    async fn create_coref_edge(
        &self,
        source_mention_id: &str,
        target_mention_id: &str,
        cluster_id: &str,
    ) -> Result<bool, GraphError>;

    async fn get_coref_chains(&self, doc_id: &str) -> Result<Vec<CorefChain>, GraphError>;

    /// Upsert a relation edge keyed by (type, subject, object). Confidence
    /// is merged keep-the-max; evidence and source chunk are replaced only
    /// when the new confidence is strictly greater; a year, once attached,
    /// is retained.
    async fn upsert_relation(&self, edge: &RelationEdge) -> Result<(), GraphError>;

    async fn get_relation(
        &self,
        relation_type: &str,
        subject_id: &str,
        object_id: &str,
    ) -> Result<Option<RelationEdge>, GraphError>;

    /// Link a mention to its canonical entity. Atomic at the store
    /// boundary: creates or updates the LINKED_TO edge, appends `alias` to
    /// the entity's alias set if absent, and increments `mention_count`
    /// only when the edge is newly created — repeated identical links
    /// converge instead of inflating the count. Returns whether the edge
    /// was newly created.
    async fn link_mention_to_entity(
        &self,
        mention_id: &str,
        entity_id: &str,
        alias: &str,
        confidence: f64,
    ) -> Result<bool, GraphError>;
}
