use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::GraphError;
use crate::store::GraphStore;
use crate::types::{
    ChunkNode, CorefChain, CorefMention, Document, Entity, Mention, MentionKind, RelationEdge,
};

#[derive(Debug, Clone)]
struct CorefEdgeRecord {
    source_mention_id: String,
    target_mention_id: String,
    cluster_id: String,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, ChunkNode>,
    entities: HashMap<String, Entity>,
    mentions: HashMap<String, Mention>,
    /// mention id -> (entity id, confidence) for LINKED_TO edges.
    links: HashMap<String, (String, f64)>,
    coref_edges: Vec<CorefEdgeRecord>,
    /// (type, subject, object) -> edge.
    relations: HashMap<(String, String, String), RelationEdge>,
}

/// Reference implementation of the upsert semantics, used by tests and as
/// the model the Neo4j adapter must agree with. A single process-wide lock
/// makes every operation atomic, which is exactly the guarantee the Cypher
/// MERGE statements provide per call.
#[derive(Default)]
pub struct InMemoryGraph {
    inner: RwLock<Inner>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.inner.read().unwrap().documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.read().unwrap().chunks.len()
    }

    pub fn entity_count(&self) -> usize {
        self.inner.read().unwrap().entities.len()
    }

    pub fn mention_count(&self) -> usize {
        self.inner.read().unwrap().mentions.len()
    }

    pub fn relation_count(&self) -> usize {
        self.inner.read().unwrap().relations.len()
    }

    pub fn coref_edge_count(&self) -> usize {
        self.inner.read().unwrap().coref_edges.len()
    }

    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.inner.read().unwrap().entities.get(id).cloned()
    }

    pub fn relations(&self) -> Vec<RelationEdge> {
        let inner = self.inner.read().unwrap();
        let mut edges: Vec<RelationEdge> = inner.relations.values().cloned().collect();
        edges.sort_by(|a, b| {
            (&a.relation_type, &a.subject_id, &a.object_id)
                .cmp(&(&b.relation_type, &b.subject_id, &b.object_id))
        });
        edges
    }
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    async fn create_document(
        &self,
        id: &str,
        url: &str,
        title: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<Document, GraphError> {
        let mut inner = self.inner.write().unwrap();
        let doc = inner
            .documents
            .entry(id.to_string())
            .and_modify(|existing| {
                existing.title = title.to_string();
                existing.metadata = metadata.clone();
            })
            .or_insert_with(|| Document {
                id: id.to_string(),
                url: url.to_string(),
                title: title.to_string(),
                metadata: metadata.clone(),
            });
        Ok(doc.clone())
    }

    async fn get_document(&self, id: &str) -> Result<Document, GraphError> {
        self.inner
            .read()
            .unwrap()
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::not_found("document", id))
    }

    async fn create_chunk(&self, chunk: &ChunkNode) -> Result<ChunkNode, GraphError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.documents.contains_key(&chunk.doc_id) {
            return Err(GraphError::not_found("document", &chunk.doc_id));
        }
        // Same offset means same content; first write wins.
        let stored = inner
            .chunks
            .entry(chunk.id.clone())
            .or_insert_with(|| chunk.clone());
        Ok(stored.clone())
    }

    async fn get_chunk(&self, id: &str) -> Result<ChunkNode, GraphError> {
        self.inner
            .read()
            .unwrap()
            .chunks
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::not_found("chunk", id))
    }

    async fn get_chunks_by_document(&self, doc_id: &str) -> Result<Vec<ChunkNode>, GraphError> {
        let inner = self.inner.read().unwrap();
        let mut chunks: Vec<ChunkNode> = inner
            .chunks
            .values()
            .filter(|c| c.doc_id == doc_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.start_offset);
        Ok(chunks)
    }

    async fn create_entity(
        &self,
        id: &str,
        name: &str,
        entity_type: &str,
        confidence: f64,
    ) -> Result<Entity, GraphError> {
        let mut inner = self.inner.write().unwrap();
        let entity = inner
            .entities
            .entry(id.to_string())
            .and_modify(|existing| {
                if confidence > existing.confidence {
                    existing.confidence = confidence;
                }
            })
            .or_insert_with(|| Entity {
                id: id.to_string(),
                canonical_name: name.to_string(),
                entity_type: entity_type.to_uppercase(),
                aliases: Vec::new(),
                mention_count: 0,
                confidence,
            });
        Ok(entity.clone())
    }

    async fn get_entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>, GraphError> {
        let wanted = entity_type.to_uppercase();
        let inner = self.inner.read().unwrap();
        let mut entities: Vec<Entity> = inner
            .entities
            .values()
            .filter(|e| e.entity_type == wanted)
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entities)
    }

    async fn create_mention(
        &self,
        id: &str,
        chunk_id: &str,
        entity_id: &str,
        text: &str,
        start_offset: usize,
        end_offset: usize,
        _confidence: f64,
    ) -> Result<Mention, GraphError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.chunks.contains_key(chunk_id) {
            return Err(GraphError::not_found("chunk", chunk_id));
        }
        if !inner.entities.contains_key(entity_id) {
            return Err(GraphError::not_found("entity", entity_id));
        }
        let mention = inner
            .mentions
            .entry(id.to_string())
            .or_insert_with(|| Mention {
                id: id.to_string(),
                chunk_id: chunk_id.to_string(),
                text: text.to_string(),
                start_offset,
                end_offset,
                kind: MentionKind::Entity,
            });
        Ok(mention.clone())
    }

    async fn create_pronoun_mention(
        &self,
        id: &str,
        chunk_id: &str,
        text: &str,
        start_offset: usize,
        end_offset: usize,
    ) -> Result<Mention, GraphError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.chunks.contains_key(chunk_id) {
            return Err(GraphError::not_found("chunk", chunk_id));
        }
        let mention = inner
            .mentions
            .entry(id.to_string())
            .or_insert_with(|| Mention {
                id: id.to_string(),
                chunk_id: chunk_id.to_string(),
                text: text.to_string(),
                start_offset,
                end_offset,
                kind: MentionKind::Pronoun,
            });
        Ok(mention.clone())
    }

    async fn get_mention_text(&self, mention_id: &str) -> Result<String, GraphError> {
        self.inner
            .read()
            .unwrap()
            .mentions
            .get(mention_id)
            .map(|m| m.text.clone())
            .ok_or_else(|| GraphError::not_found("mention", mention_id))
    }

    async fn create_coref_edge(
        &self,
        source_mention_id: &str,
        target_mention_id: &str,
        cluster_id: &str,
    ) -> Result<bool, GraphError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.mentions.contains_key(source_mention_id) {
            return Err(GraphError::not_found("mention", source_mention_id));
        }
        if !inner.mentions.contains_key(target_mention_id) {
            return Err(GraphError::not_found("mention", target_mention_id));
        }
        let exists = inner.coref_edges.iter().any(|e| {
            e.source_mention_id == source_mention_id && e.target_mention_id == target_mention_id
        });
        if exists {
            return Ok(false);
        }
        inner.coref_edges.push(CorefEdgeRecord {
            source_mention_id: source_mention_id.to_string(),
            target_mention_id: target_mention_id.to_string(),
            cluster_id: cluster_id.to_string(),
        });
        Ok(true)
    }

    async fn get_coref_chains(&self, doc_id: &str) -> Result<Vec<CorefChain>, GraphError> {
        let inner = self.inner.read().unwrap();
        let mut chains: HashMap<String, Vec<CorefMention>> = HashMap::new();

        for edge in &inner.coref_edges {
            let source = match inner.mentions.get(&edge.source_mention_id) {
                Some(m) => m,
                None => continue,
            };
            let chunk = match inner.chunks.get(&source.chunk_id) {
                Some(c) => c,
                None => continue,
            };
            if chunk.doc_id != doc_id {
                continue;
            }
            let members = chains.entry(edge.cluster_id.clone()).or_default();
            for mention_id in [&edge.target_mention_id, &edge.source_mention_id] {
                if members.iter().any(|m| &m.mention_id == mention_id) {
                    continue;
                }
                if let Some(m) = inner.mentions.get(mention_id) {
                    members.push(CorefMention {
                        mention_id: m.id.clone(),
                        text: m.text.clone(),
                        kind: m.kind,
                    });
                }
            }
        }

        let mut result: Vec<CorefChain> = chains
            .into_iter()
            .map(|(cluster_id, mentions)| CorefChain {
                cluster_id,
                mentions,
            })
            .collect();
        result.sort_by(|a, b| a.cluster_id.cmp(&b.cluster_id));
        Ok(result)
    }

    async fn upsert_relation(&self, edge: &RelationEdge) -> Result<(), GraphError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.entities.contains_key(&edge.subject_id) {
            return Err(GraphError::not_found("entity", &edge.subject_id));
        }
        if !inner.entities.contains_key(&edge.object_id) {
            return Err(GraphError::not_found("entity", &edge.object_id));
        }
        let key = (
            edge.relation_type.clone(),
            edge.subject_id.clone(),
            edge.object_id.clone(),
        );
        inner
            .relations
            .entry(key)
            .and_modify(|existing| {
                if edge.confidence > existing.confidence {
                    existing.confidence = edge.confidence;
                    existing.evidence = edge.evidence.clone();
                    existing.source_chunk_id = edge.source_chunk_id.clone();
                }
                if existing.year.is_none() {
                    existing.year = edge.year.clone();
                }
            })
            .or_insert_with(|| edge.clone());
        Ok(())
    }

    async fn get_relation(
        &self,
        relation_type: &str,
        subject_id: &str,
        object_id: &str,
    ) -> Result<Option<RelationEdge>, GraphError> {
        let key = (
            relation_type.to_string(),
            subject_id.to_string(),
            object_id.to_string(),
        );
        Ok(self.inner.read().unwrap().relations.get(&key).cloned())
    }

    async fn link_mention_to_entity(
        &self,
        mention_id: &str,
        entity_id: &str,
        alias: &str,
        confidence: f64,
    ) -> Result<bool, GraphError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.mentions.contains_key(mention_id) {
            return Err(GraphError::not_found("mention", mention_id));
        }
        if !inner.entities.contains_key(entity_id) {
            return Err(GraphError::not_found("entity", entity_id));
        }

        let newly_linked = match inner.links.get(mention_id) {
            Some((existing_entity, _)) => existing_entity != entity_id,
            None => true,
        };
        inner
            .links
            .insert(mention_id.to_string(), (entity_id.to_string(), confidence));

        let entity = inner.entities.get_mut(entity_id).unwrap();
        if newly_linked {
            entity.mention_count += 1;
        }
        if !entity.aliases.iter().any(|a| a == alias) {
            entity.aliases.push(alias.to_string());
        }
        Ok(newly_linked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> HashMap<String, String> {
        HashMap::new()
    }

    fn chunk(id: &str, doc_id: &str, start: usize) -> ChunkNode {
        ChunkNode {
            id: id.to_string(),
            doc_id: doc_id.to_string(),
            text: "text".to_string(),
            start_offset: start,
            end_offset: start + 4,
            page: None,
            heading: None,
        }
    }

    #[tokio::test]
    async fn document_upsert_preserves_identity() {
        let store = InMemoryGraph::new();
        store
            .create_document("d1", "https://a", "First", &meta())
            .await
            .unwrap();
        let updated = store
            .create_document("d1", "https://a", "Second", &meta())
            .await
            .unwrap();
        assert_eq!(updated.title, "Second");
        assert_eq!(store.document_count(), 1);
    }

    #[tokio::test]
    async fn chunk_requires_parent_document() {
        let store = InMemoryGraph::new();
        let err = store.create_chunk(&chunk("c1", "missing", 0)).await;
        assert!(matches!(err, Err(GraphError::NotFound { kind: "document", .. })));
    }

    #[tokio::test]
    async fn chunks_are_returned_in_offset_order() {
        let store = InMemoryGraph::new();
        store
            .create_document("d1", "https://a", "T", &meta())
            .await
            .unwrap();
        store.create_chunk(&chunk("c2", "d1", 100)).await.unwrap();
        store.create_chunk(&chunk("c1", "d1", 0)).await.unwrap();
        let chunks = store.get_chunks_by_document("d1").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "c1");
        assert_eq!(chunks[1].id, "c2");
    }

    #[tokio::test]
    async fn relation_confidence_never_decreases() {
        let store = InMemoryGraph::new();
        store
            .create_document("d1", "https://a", "T", &meta())
            .await
            .unwrap();
        store.create_entity("e1", "A", "ORG", 0.9).await.unwrap();
        store.create_entity("e2", "B", "ORG", 0.9).await.unwrap();

        let strong = RelationEdge {
            relation_type: "FOUNDED".into(),
            subject_id: "e1".into(),
            object_id: "e2".into(),
            confidence: 0.95,
            evidence: "strong evidence".into(),
            source_chunk_id: "c1".into(),
            year: Some("2015".into()),
        };
        store.upsert_relation(&strong).await.unwrap();

        let weak = RelationEdge {
            confidence: 0.7,
            evidence: "weak evidence".into(),
            year: None,
            ..strong.clone()
        };
        store.upsert_relation(&weak).await.unwrap();

        let stored = store
            .get_relation("FOUNDED", "e1", "e2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.confidence, 0.95);
        assert_eq!(stored.evidence, "strong evidence");
        assert_eq!(stored.year.as_deref(), Some("2015"));
    }

    #[tokio::test]
    async fn repeated_links_converge() {
        let store = InMemoryGraph::new();
        store
            .create_document("d1", "https://a", "T", &meta())
            .await
            .unwrap();
        store.create_chunk(&chunk("c1", "d1", 0)).await.unwrap();
        store.create_entity("e1", "Acme", "ORG", 0.9).await.unwrap();
        store
            .create_mention("m1", "c1", "e1", "Acme", 0, 4, 0.9)
            .await
            .unwrap();

        store
            .link_mention_to_entity("m1", "e1", "Acme", 1.0)
            .await
            .unwrap();
        store
            .link_mention_to_entity("m1", "e1", "Acme", 1.0)
            .await
            .unwrap();

        let entity = store.entity("e1").unwrap();
        assert_eq!(entity.mention_count, 1);
        assert_eq!(entity.aliases, vec!["Acme".to_string()]);
    }

    #[tokio::test]
    async fn linking_unknown_mention_is_rejected() {
        let store = InMemoryGraph::new();
        store
            .create_document("d1", "https://a", "T", &meta())
            .await
            .unwrap();
        store.create_entity("e1", "Acme", "ORG", 0.9).await.unwrap();
        let err = store
            .link_mention_to_entity("ghost", "e1", "Acme", 1.0)
            .await;
        assert!(matches!(err, Err(GraphError::NotFound { kind: "mention", .. })));
    }

    #[tokio::test]
    async fn coref_edges_deduplicate() {
        let store = InMemoryGraph::new();
        store
            .create_document("d1", "https://a", "T", &meta())
            .await
            .unwrap();
        store.create_chunk(&chunk("c1", "d1", 0)).await.unwrap();
        store.create_entity("e1", "Acme", "ORG", 0.9).await.unwrap();
        store
            .create_mention("m1", "c1", "e1", "Acme", 0, 4, 0.9)
            .await
            .unwrap();
        store
            .create_pronoun_mention("m2", "c1", "it", 10, 12)
            .await
            .unwrap();

        assert!(store.create_coref_edge("m2", "m1", "cluster1").await.unwrap());
        assert!(!store.create_coref_edge("m2", "m1", "cluster1").await.unwrap());

        let chains = store.get_coref_chains("d1").await.unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].mentions.len(), 2);
        assert_eq!(chains[0].mentions[0].kind, MentionKind::Entity);
        assert_eq!(chains[0].mentions[1].kind, MentionKind::Pronoun);
    }
}
