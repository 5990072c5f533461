use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use graph::{GraphError, GraphStore};

use crate::schema::{ChunkExtraction, ExtractedMention};
use crate::strategy::ExtractStrategy;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Missing chunk or document: the extractor ran before the chunker.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("extraction strategy failed: {0}")]
    Strategy(#[source] anyhow::Error),
}

/// Runs an extraction strategy over a persisted chunk and upserts the
/// resulting Entity and Mention nodes. All ids are deterministic, so
/// re-running the same chunk with the same strategy output converges on
/// the same graph.
pub struct EntityExtractor<S, X> {
    store: Arc<S>,
    strategy: X,
}

impl<S: GraphStore, X: ExtractStrategy> EntityExtractor<S, X> {
    pub fn new(store: Arc<S>, strategy: X) -> Self {
        Self { store, strategy }
    }

    pub async fn extract_chunk(&self, chunk_id: &str) -> Result<ChunkExtraction, ExtractError> {
        // Fatal preconditions: the chunk and its document must already be
        // in the graph. No fallback for these.
        let chunk = self.store.get_chunk(chunk_id).await?;
        self.store.get_document(&chunk.doc_id).await?;

        let candidates = self
            .strategy
            .extract(&chunk.text)
            .await
            .map_err(ExtractError::Strategy)?;

        let mut mentions = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let entity_id = ident::entity_id(&candidate.text, &candidate.entity_type);
            self.store
                .create_entity(
                    &entity_id,
                    &candidate.text,
                    &candidate.entity_type,
                    candidate.confidence,
                )
                .await?;

            let mention_id = ident::mention_id(chunk_id, &candidate.text, candidate.offset);
            let end = candidate.offset + candidate.text.len();
            self.store
                .create_mention(
                    &mention_id,
                    chunk_id,
                    &entity_id,
                    &candidate.text,
                    candidate.offset,
                    end,
                    candidate.confidence,
                )
                .await?;

            mentions.push(ExtractedMention {
                mention_id,
                entity_id,
                text: candidate.text,
                entity_type: candidate.entity_type.to_uppercase(),
                offset: candidate.offset,
                confidence: candidate.confidence,
            });
        }

        debug!(chunk_id, mentions = mentions.len(), "chunk extracted");
        Ok(ChunkExtraction {
            chunk_id: chunk_id.to_string(),
            mentions,
        })
    }
}
