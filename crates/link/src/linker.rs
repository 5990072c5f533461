use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use graph::{Entity, GraphError, GraphStore};

use crate::index::EntityIndex;
use crate::similarity::similarity;

#[derive(Debug, Error)]
pub enum LinkError {
    /// The mention to link does not exist. A client error: the request is
    /// rejected with no partial writes.
    #[error("cannot link unknown mention: {0}")]
    UnknownMention(String),

    #[error(transparent)]
    Graph(GraphError),
}

impl From<GraphError> for LinkError {
    fn from(error: GraphError) -> Self {
        Self::Graph(error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkerConfig {
    /// Minimum similarity for a candidate to count as the same entity.
    pub accept_threshold: f64,
    /// Ranking bonus for candidates that already carry links.
    pub canonical_bonus: f64,
    /// Capacity of the per-type entity index, in type lists.
    pub index_capacity: usize,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.8,
            canonical_bonus: 0.05,
            index_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRequest {
    pub mention_id: String,
    pub name: String,
    pub entity_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkOutcome {
    pub mention_id: String,
    pub entity_id: String,
    pub confidence: f64,
    pub created_entity: bool,
}

/// Per-item results for a batch: one failed request never aborts the rest.
pub struct BatchOutcome {
    pub results: Vec<Result<LinkOutcome, LinkError>>,
}

impl BatchOutcome {
    pub fn linked(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.linked()
    }
}

/// Maps confirmed similarity to the confidence stored on the LINKED_TO
/// edge. Always inside [0.65, 1.0].
fn link_confidence(sim: f64) -> f64 {
    let tier: f64 = if sim >= 1.0 {
        1.0
    } else if sim >= 0.95 {
        0.95
    } else if sim >= 0.9 {
        0.85
    } else if sim > 0.8 {
        0.75
    } else {
        0.65
    };
    tier.clamp(0.65, 1.0)
}

/// Resolves mentions to canonical cross-document entities, merging textual
/// variants of the same real-world entity by fuzzy name similarity.
pub struct EntityLinker<S> {
    store: Arc<S>,
    config: LinkerConfig,
    index: EntityIndex,
}

impl<S: GraphStore> EntityLinker<S> {
    pub fn new(store: Arc<S>, config: LinkerConfig) -> Self {
        let index = EntityIndex::new(config.index_capacity);
        Self {
            store,
            config,
            index,
        }
    }

    pub async fn link_mention(
        &self,
        mention_id: &str,
        name: &str,
        entity_type: &str,
    ) -> Result<LinkOutcome, LinkError> {
        // The mention must already exist; reject before any write.
        self.store
            .get_mention_text(mention_id)
            .await
            .map_err(|e| match e {
                GraphError::NotFound { .. } => LinkError::UnknownMention(mention_id.to_string()),
                other => LinkError::Graph(other),
            })?;

        let entity_type = entity_type.to_uppercase();
        let normalized = ident::normalize_entity_text(name);
        let candidates = self
            .index
            .get_or_load(self.store.as_ref(), &entity_type)
            .await?;

        let best = self.best_match(&normalized, &candidates);

        let (entity_id, confidence, created_entity) = match best {
            Some((sim, entity)) => (entity.id.clone(), link_confidence(sim), false),
            None => {
                let id = ident::entity_id(name, &entity_type);
                let entity = self
                    .store
                    .create_entity(&id, name, &entity_type, 1.0)
                    .await?;
                self.index.record_entity(&entity);
                // The mention's own name is the canonical name: exact.
                (id, 1.0, true)
            }
        };

        let newly_linked = self
            .store
            .link_mention_to_entity(mention_id, &entity_id, name, confidence)
            .await?;
        self.index
            .record_link(&entity_type, &entity_id, name, newly_linked);

        debug!(
            mention_id,
            entity_id = %entity_id,
            confidence,
            created_entity,
            "mention linked"
        );

        Ok(LinkOutcome {
            mention_id: mention_id.to_string(),
            entity_id,
            confidence,
            created_entity,
        })
    }

    /// Sequential batch with per-item reporting. Candidate lookups hit the
    /// bounded index, so a batch of ~100 stays off cold storage after the
    /// first item of each type.
    pub async fn link_batch(&self, requests: &[LinkRequest]) -> BatchOutcome {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(
                self.link_mention(&request.mention_id, &request.name, &request.entity_type)
                    .await,
            );
        }
        BatchOutcome { results }
    }

    fn best_match<'a>(&self, normalized: &str, candidates: &'a [Entity]) -> Option<(f64, &'a Entity)> {
        let mut best: Option<(f64, f64, &Entity)> = None;
        for entity in candidates {
            let mut sim = similarity(
                normalized,
                &ident::normalize_entity_text(&entity.canonical_name),
            );
            for alias in &entity.aliases {
                sim = sim.max(similarity(normalized, &ident::normalize_entity_text(alias)));
            }
            if sim <= self.config.accept_threshold {
                continue;
            }
            let score = if entity.mention_count > 0 {
                sim + self.config.canonical_bonus
            } else {
                sim
            };
            // Ties go to the entity that already carries links, then to
            // the smaller id for determinism.
            let replace = match best {
                None => true,
                Some((best_score, _, best_entity)) => {
                    score > best_score
                        || (score == best_score
                            && (entity.mention_count > best_entity.mention_count
                                || (entity.mention_count == best_entity.mention_count
                                    && entity.id < best_entity.id)))
                }
            };
            if replace {
                best = Some((score, sim, entity));
            }
        }
        best.map(|(_, sim, entity)| (sim, entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph::InMemoryGraph;
    use std::collections::HashMap;

    async fn store_with_mention(text: &str) -> (Arc<InMemoryGraph>, String) {
        let store = Arc::new(InMemoryGraph::new());
        let doc_id = ident::document_id("https://example.com/link");
        store
            .create_document(&doc_id, "https://example.com/link", "T", &HashMap::new())
            .await
            .unwrap();
        let chunk_id = ident::chunk_id(&doc_id, 0);
        store
            .create_chunk(&graph::ChunkNode {
                id: chunk_id.clone(),
                doc_id,
                text: text.to_string(),
                start_offset: 0,
                end_offset: text.len(),
                page: None,
                heading: None,
            })
            .await
            .unwrap();
        // A provisional entity for the raw surface form, as extraction
        // would have created it.
        let provisional = ident::entity_id(text, "ORG");
        store
            .create_entity(&provisional, text, "ORG", 0.9)
            .await
            .unwrap();
        let mention_id = ident::mention_id(&chunk_id, text, 0);
        store
            .create_mention(&mention_id, &chunk_id, &provisional, text, 0, text.len(), 0.9)
            .await
            .unwrap();
        (store, mention_id)
    }

    #[tokio::test]
    async fn exact_match_links_at_full_confidence() {
        let (store, mention_id) = store_with_mention("OpenAI").await;
        let existing = ident::entity_id("OpenAI", "ORG");

        let linker = EntityLinker::new(store.clone(), LinkerConfig::default());
        let outcome = linker.link_mention(&mention_id, "OpenAI", "ORG").await.unwrap();

        assert_eq!(outcome.entity_id, existing);
        assert_eq!(outcome.confidence, 1.0);
        assert!(!outcome.created_entity);
    }

    #[tokio::test]
    async fn space_variant_links_to_existing_entity() {
        // Only the canonical "OpenAI" entity exists; the mention's surface
        // form is the spaced variant.
        let store = Arc::new(InMemoryGraph::new());
        let doc_id = ident::document_id("https://example.com/link");
        store
            .create_document(&doc_id, "https://example.com/link", "T", &HashMap::new())
            .await
            .unwrap();
        let chunk_id = ident::chunk_id(&doc_id, 0);
        store
            .create_chunk(&graph::ChunkNode {
                id: chunk_id.clone(),
                doc_id,
                text: "Open AI".to_string(),
                start_offset: 0,
                end_offset: 7,
                page: None,
                heading: None,
            })
            .await
            .unwrap();
        let canonical = ident::entity_id("OpenAI", "ORG");
        store
            .create_entity(&canonical, "OpenAI", "ORG", 0.9)
            .await
            .unwrap();
        let mention_id = ident::mention_id(&chunk_id, "Open AI", 0);
        store
            .create_mention(&mention_id, &chunk_id, &canonical, "Open AI", 0, 7, 0.9)
            .await
            .unwrap();

        let linker = EntityLinker::new(store.clone(), LinkerConfig::default());
        let outcome = linker.link_mention(&mention_id, "Open AI", "ORG").await.unwrap();

        // "open ai" vs "openai" is a space-insensitive exact match: 0.95.
        assert_eq!(outcome.entity_id, canonical);
        assert_eq!(outcome.confidence, 0.95);
        let entity = store.entity(&canonical).unwrap();
        assert!(entity.aliases.contains(&"Open AI".to_string()));
    }

    #[tokio::test]
    async fn exact_surface_entity_wins_over_unrelated_ones() {
        let (store, mention_id) = store_with_mention("Initech").await;
        let other = ident::entity_id("Globex Corporation", "ORG");
        store
            .create_entity(&other, "Globex Corporation", "ORG", 0.9)
            .await
            .unwrap();

        let linker = EntityLinker::new(store.clone(), LinkerConfig::default());
        // The extraction-time entity for "Initech" matches exactly; the
        // link resolves to it rather than creating a duplicate.
        let outcome = linker.link_mention(&mention_id, "Initech", "ORG").await.unwrap();
        assert_eq!(outcome.entity_id, ident::entity_id("Initech", "ORG"));
        assert_eq!(outcome.confidence, 1.0);
        assert!(!outcome.created_entity);

        let entity = store.entity(&outcome.entity_id).unwrap();
        assert_eq!(entity.mention_count, 1);
    }

    #[tokio::test]
    async fn brand_new_type_creates_entity_from_scratch() {
        let (store, mention_id) = store_with_mention("Mount Rainier").await;

        let linker = EntityLinker::new(store.clone(), LinkerConfig::default());
        let outcome = linker
            .link_mention(&mention_id, "Mount Rainier", "GPE")
            .await
            .unwrap();

        assert!(outcome.created_entity);
        assert_eq!(outcome.confidence, 1.0);
        assert_eq!(outcome.entity_id, ident::entity_id("Mount Rainier", "GPE"));
    }

    #[tokio::test]
    async fn confidence_stays_in_documented_bounds() {
        let (store, mention_id) = store_with_mention("OpenAI Incorporated").await;
        let canonical = ident::entity_id("OpenAI", "ORG");
        store
            .create_entity(&canonical, "OpenAI", "ORG", 0.9)
            .await
            .unwrap();

        let linker = EntityLinker::new(store.clone(), LinkerConfig::default());
        let outcome = linker
            .link_mention(&mention_id, "OpenAI Incorporated", "ORG")
            .await
            .unwrap();

        assert!(outcome.confidence >= 0.65);
        assert!(outcome.confidence <= 1.0);
    }

    #[tokio::test]
    async fn unknown_mention_is_rejected_without_writes() {
        let store = Arc::new(InMemoryGraph::new());
        let linker = EntityLinker::new(store.clone(), LinkerConfig::default());

        let err = linker.link_mention("ghost", "OpenAI", "ORG").await.unwrap_err();
        assert!(matches!(err, LinkError::UnknownMention(_)));
        assert_eq!(store.entity_count(), 0);
    }

    #[tokio::test]
    async fn batch_reports_per_item_results() {
        let (store, mention_id) = store_with_mention("OpenAI").await;
        let linker = EntityLinker::new(store.clone(), LinkerConfig::default());

        let requests = vec![
            LinkRequest {
                mention_id: mention_id.clone(),
                name: "OpenAI".to_string(),
                entity_type: "ORG".to_string(),
            },
            LinkRequest {
                mention_id: "ghost".to_string(),
                name: "OpenAI".to_string(),
                entity_type: "ORG".to_string(),
            },
            LinkRequest {
                mention_id,
                name: "Open AI".to_string(),
                entity_type: "ORG".to_string(),
            },
        ];
        let outcome = linker.link_batch(&requests).await;

        assert_eq!(outcome.linked(), 2);
        assert_eq!(outcome.failed(), 1);
        assert!(matches!(
            outcome.results[1],
            Err(LinkError::UnknownMention(_))
        ));
    }

    #[tokio::test]
    async fn relinking_converges_mention_count() {
        let (store, mention_id) = store_with_mention("OpenAI").await;
        let linker = EntityLinker::new(store.clone(), LinkerConfig::default());

        let first = linker.link_mention(&mention_id, "OpenAI", "ORG").await.unwrap();
        linker.link_mention(&mention_id, "OpenAI", "ORG").await.unwrap();
        linker.link_mention(&mention_id, "OpenAI", "ORG").await.unwrap();

        let entity = store.entity(&first.entity_id).unwrap();
        assert_eq!(entity.mention_count, 1);
    }
}
