use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use extract::ExtractedMention;
use graph::{GraphError, GraphStore};

use crate::token::{token_at, tokenize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorefConfig {
    pub enabled: bool,
    /// Reserved for future scoring; accepted links currently carry no
    /// confidence of their own.
    pub min_confidence: f64,
    /// Maximum token distance between a pronoun and its antecedent.
    pub max_cluster_distance: usize,
}

impl Default for CorefConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: 0.5,
            max_cluster_distance: 50,
        }
    }
}

/// An accepted pronoun-to-antecedent link. Carries the antecedent's entity
/// id so relation extraction can see through the pronoun.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorefLink {
    pub pronoun_mention_id: String,
    pub antecedent_mention_id: String,
    pub entity_id: String,
    pub cluster_id: String,
    pub pronoun: String,
    pub pronoun_offset: usize,
    pub antecedent_text: String,
}

fn pronoun_targets(word: &str) -> Option<&'static [&'static str]> {
    match word {
        "he" | "she" | "him" | "her" | "his" | "hers" => Some(&["PERSON"]),
        "it" | "its" => Some(&["ORG", "PRODUCT", "GPE", "FACILITY"]),
        "they" | "them" | "their" | "theirs" => Some(&["PERSON", "ORG", "GPE"]),
        _ => None,
    }
}

/// Deterministic rule-based pronoun resolution within a single chunk: each
/// pronoun is linked to the nearest preceding type-compatible entity
/// mention, if one lies within the configured token window.
pub struct CorefResolver<S> {
    store: Arc<S>,
    config: CorefConfig,
}

impl<S: GraphStore> CorefResolver<S> {
    pub fn new(store: Arc<S>, config: CorefConfig) -> Self {
        Self { store, config }
    }

    pub async fn resolve_chunk(
        &self,
        chunk_id: &str,
        chunk_text: &str,
        mentions: &[ExtractedMention],
    ) -> Result<Vec<CorefLink>, GraphError> {
        if !self.config.enabled || mentions.is_empty() {
            return Ok(Vec::new());
        }

        let tokens = tokenize(chunk_text);

        // Last token position of each entity mention.
        let positioned: Vec<(usize, &ExtractedMention)> = mentions
            .iter()
            .map(|m| {
                let last_byte = m.end_offset().saturating_sub(1);
                (token_at(&tokens, last_byte), m)
            })
            .collect();

        let mut links = Vec::new();

        for (pronoun_pos, token) in tokens.iter().enumerate() {
            let word = token.text.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty() {
                continue;
            }
            let lowered = word.to_lowercase();
            let targets = match pronoun_targets(&lowered) {
                Some(t) => t,
                None => continue,
            };

            // Nearest preceding compatible mention; ties go to the later
            // mention in the text.
            let best = positioned
                .iter()
                .filter(|(end_pos, m)| {
                    *end_pos < pronoun_pos && targets.contains(&m.entity_type.as_str())
                })
                .min_by_key(|(end_pos, m)| (pronoun_pos - end_pos, usize::MAX - m.offset));

            let (antecedent_pos, antecedent) = match best {
                Some(&(pos, m)) => (pos, m),
                None => continue,
            };
            if pronoun_pos - antecedent_pos > self.config.max_cluster_distance {
                continue;
            }

            // Persist the pronoun as its own mention, then the edge.
            let word_start = token.start + token.text.find(word).unwrap_or(0);
            let word_end = word_start + word.len();
            let pronoun_mention_id = ident::mention_id(chunk_id, word, word_start);
            self.store
                .create_pronoun_mention(&pronoun_mention_id, chunk_id, word, word_start, word_end)
                .await?;

            let cluster_id = ident::coref_cluster_id(chunk_id, antecedent_pos, pronoun_pos);
            self.store
                .create_coref_edge(&pronoun_mention_id, &antecedent.mention_id, &cluster_id)
                .await?;

            debug!(
                chunk_id,
                pronoun = %word,
                antecedent = %antecedent.text,
                distance = pronoun_pos - antecedent_pos,
                "coreference link"
            );

            links.push(CorefLink {
                pronoun_mention_id,
                antecedent_mention_id: antecedent.mention_id.clone(),
                entity_id: antecedent.entity_id.clone(),
                cluster_id,
                pronoun: word.to_string(),
                pronoun_offset: word_start,
                antecedent_text: antecedent.text.clone(),
            });
        }

        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph::InMemoryGraph;
    use std::collections::HashMap;

    async fn store_with_chunk(text: &str) -> (Arc<InMemoryGraph>, String) {
        let store = Arc::new(InMemoryGraph::new());
        let doc_id = ident::document_id("https://example.com/coref");
        store
            .create_document(&doc_id, "https://example.com/coref", "T", &HashMap::new())
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
        (store, chunk_id)
    }

    async fn seed_mention(
        store: &Arc<InMemoryGraph>,
        chunk_id: &str,
        text: &str,
        entity_type: &str,
        offset: usize,
    ) -> ExtractedMention {
        let entity_id = ident::entity_id(text, entity_type);
        store
            .create_entity(&entity_id, text, entity_type, 0.9)
            .await
            .unwrap();
        let mention_id = ident::mention_id(chunk_id, text, offset);
        store
            .create_mention(
                &mention_id,
                chunk_id,
                &entity_id,
                text,
                offset,
                offset + text.len(),
                0.9,
            )
            .await
            .unwrap();
        ExtractedMention {
            mention_id,
            entity_id,
            text: text.to_string(),
            entity_type: entity_type.to_string(),
            offset,
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn links_pronouns_to_compatible_antecedents() {
        let text = "Sam Altman is CEO of OpenAI. He founded it in 2015.";
        let (store, chunk_id) = store_with_chunk(text).await;
        let sam = seed_mention(&store, &chunk_id, "Sam Altman", "PERSON", 0).await;
        let openai = seed_mention(&store, &chunk_id, "OpenAI", "ORG", 21).await;

        let resolver = CorefResolver::new(store.clone(), CorefConfig::default());
        let links = resolver
            .resolve_chunk(&chunk_id, text, &[sam.clone(), openai.clone()])
            .await
            .unwrap();

        assert_eq!(links.len(), 2);
        let he = links.iter().find(|l| l.pronoun == "He").unwrap();
        assert_eq!(he.antecedent_text, "Sam Altman");
        assert_eq!(he.entity_id, sam.entity_id);
        let it = links.iter().find(|l| l.pronoun == "it").unwrap();
        assert_eq!(it.antecedent_text, "OpenAI");
        assert_eq!(it.entity_id, openai.entity_id);
        assert_eq!(store.coref_edge_count(), 2);
    }

    #[tokio::test]
    async fn distance_window_is_enforced() {
        let padding = "word ".repeat(60);
        let text = format!("Sam Altman spoke. {}Then he left.", padding);
        let (store, chunk_id) = store_with_chunk(&text).await;
        let sam = seed_mention(&store, &chunk_id, "Sam Altman", "PERSON", 0).await;

        let resolver = CorefResolver::new(store.clone(), CorefConfig::default());
        let links = resolver.resolve_chunk(&chunk_id, &text, &[sam]).await.unwrap();

        assert!(links.is_empty());
        assert_eq!(store.coref_edge_count(), 0);
    }

    #[tokio::test]
    async fn type_compatibility_is_enforced() {
        let text = "OpenAI shipped a model. He praised it.";
        let (store, chunk_id) = store_with_chunk(text).await;
        let openai = seed_mention(&store, &chunk_id, "OpenAI", "ORG", 0).await;

        let resolver = CorefResolver::new(store.clone(), CorefConfig::default());
        let links = resolver.resolve_chunk(&chunk_id, text, &[openai]).await.unwrap();

        // "He" wants a PERSON; only "it" can reach the ORG.
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].pronoun, "it");
    }

    #[tokio::test]
    async fn disabled_resolver_is_a_no_op() {
        let text = "Sam Altman spoke. He left.";
        let (store, chunk_id) = store_with_chunk(text).await;
        let sam = seed_mention(&store, &chunk_id, "Sam Altman", "PERSON", 0).await;

        let config = CorefConfig {
            enabled: false,
            ..CorefConfig::default()
        };
        let resolver = CorefResolver::new(store.clone(), config);
        let links = resolver.resolve_chunk(&chunk_id, text, &[sam]).await.unwrap();

        assert!(links.is_empty());
        assert_eq!(store.coref_edge_count(), 0);
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let text = "Sam Altman is CEO of OpenAI. He founded it in 2015.";
        let (store, chunk_id) = store_with_chunk(text).await;
        let sam = seed_mention(&store, &chunk_id, "Sam Altman", "PERSON", 0).await;
        let openai = seed_mention(&store, &chunk_id, "OpenAI", "ORG", 21).await;

        let resolver = CorefResolver::new(store.clone(), CorefConfig::default());
        let mentions = [sam, openai];
        let first = resolver.resolve_chunk(&chunk_id, text, &mentions).await.unwrap();
        let second = resolver.resolve_chunk(&chunk_id, text, &mentions).await.unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(store.coref_edge_count(), 2);
        let clusters_first: Vec<&str> = first.iter().map(|l| l.cluster_id.as_str()).collect();
        let clusters_second: Vec<&str> = second.iter().map(|l| l.cluster_id.as_str()).collect();
        assert_eq!(clusters_first, clusters_second);
    }
}
