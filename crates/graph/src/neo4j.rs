//! Neo4j-backed GraphStore. Every write is a Cypher MERGE keyed on the
//! deterministic node ids, so concurrent writers converge on identity
//! instead of coordinating through locks. Alias appends and mention-count
//! increments happen inside the MERGE statement itself; the count only
//! moves on `ON CREATE` of the LINKED_TO edge.

use async_trait::async_trait;
use neo4rs::{Graph, Query};
use std::collections::HashMap;
use tracing::info;

use crate::error::GraphError;
use crate::store::GraphStore;
use crate::types::{
    ChunkNode, CorefChain, CorefMention, Document, Entity, Mention, MentionKind, RelationEdge,
};

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Neo4jGraph {
    graph: Graph,
}

impl Neo4jGraph {
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .map_err(|e| GraphError::Backend(format!("failed to connect to Neo4j: {}", e)))?;
        info!(uri = %config.uri, "connected to Neo4j");
        Ok(Self { graph })
    }

    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Create id indexes for every node label used by the pipeline.
    pub async fn init_schema(&self) -> Result<(), GraphError> {
        for (name, label) in [
            ("document_id_index", "Document"),
            ("chunk_id_index", "Chunk"),
            ("entity_id_index", "Entity"),
            ("mention_id_index", "Mention"),
        ] {
            let statement = format!(
                "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.id)",
                name, label
            );
            self.run(Query::new(statement)).await?;
        }
        let by_type =
            "CREATE INDEX entity_type_index IF NOT EXISTS FOR (n:Entity) ON (n.entity_type)";
        self.run(Query::new(by_type.to_string())).await?;
        info!("Neo4j schema initialized");
        Ok(())
    }

    async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph
            .run(query)
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))
    }

    async fn rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?;
        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?
        {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn one(&self, query: Query) -> Result<Option<neo4rs::Row>, GraphError> {
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?;
        stream
            .next()
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))
    }

    async fn node_exists(&self, label: &str, id: &str) -> Result<bool, GraphError> {
        let statement = format!("MATCH (n:{} {{id: $id}}) RETURN count(n) AS c", label);
        let row = self.one(Query::new(statement).param("id", id.to_string())).await?;
        Ok(row
            .map(|r| r.get::<i64>("c").unwrap_or(0) > 0)
            .unwrap_or(false))
    }
}

fn chunk_from_row(row: &neo4rs::Row) -> ChunkNode {
    let page = row.get::<i64>("page").unwrap_or(-1);
    let heading = row.get::<String>("heading").unwrap_or_default();
    ChunkNode {
        id: row.get::<String>("id").unwrap_or_default(),
        doc_id: row.get::<String>("doc_id").unwrap_or_default(),
        text: row.get::<String>("text").unwrap_or_default(),
        start_offset: row.get::<i64>("start_offset").unwrap_or(0) as usize,
        end_offset: row.get::<i64>("end_offset").unwrap_or(0) as usize,
        page: if page < 0 { None } else { Some(page as u32) },
        heading: if heading.is_empty() { None } else { Some(heading) },
    }
}

fn entity_from_row(row: &neo4rs::Row) -> Entity {
    Entity {
        id: row.get::<String>("id").unwrap_or_default(),
        canonical_name: row.get::<String>("canonical_name").unwrap_or_default(),
        entity_type: row.get::<String>("entity_type").unwrap_or_default(),
        aliases: row.get::<Vec<String>>("aliases").unwrap_or_default(),
        mention_count: row.get::<i64>("mention_count").unwrap_or(0) as u64,
        confidence: row.get::<f64>("confidence").unwrap_or(0.0),
    }
}

#[async_trait]
impl GraphStore for Neo4jGraph {
    async fn create_document(
        &self,
        id: &str,
        url: &str,
        title: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<Document, GraphError> {
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| GraphError::Backend(e.to_string()))?;
        let query = Query::new(
            "MERGE (d:Document {id: $id})
             ON CREATE SET d.url = $url, d.title = $title, d.metadata = $metadata
             ON MATCH SET d.title = $title, d.metadata = $metadata"
                .to_string(),
        )
        .param("id", id.to_string())
        .param("url", url.to_string())
        .param("title", title.to_string())
        .param("metadata", metadata_json);
        self.run(query).await?;
        Ok(Document {
            id: id.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            metadata: metadata.clone(),
        })
    }

    async fn get_document(&self, id: &str) -> Result<Document, GraphError> {
        let query = Query::new(
            "MATCH (d:Document {id: $id})
             RETURN d.id AS id, d.url AS url, d.title AS title, d.metadata AS metadata"
                .to_string(),
        )
        .param("id", id.to_string());
        let row = self
            .one(query)
            .await?
            .ok_or_else(|| GraphError::not_found("document", id))?;
        let metadata_json = row.get::<String>("metadata").unwrap_or_default();
        let metadata = if metadata_json.is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(&metadata_json)
                .map_err(|e| GraphError::Backend(e.to_string()))?
        };
        Ok(Document {
            id: row.get::<String>("id").unwrap_or_default(),
            url: row.get::<String>("url").unwrap_or_default(),
            title: row.get::<String>("title").unwrap_or_default(),
            metadata,
        })
    }

    async fn create_chunk(&self, chunk: &ChunkNode) -> Result<ChunkNode, GraphError> {
        if !self.node_exists("Document", &chunk.doc_id).await? {
            return Err(GraphError::not_found("document", &chunk.doc_id));
        }
        let query = Query::new(
            "MATCH (d:Document {id: $doc_id})
             MERGE (c:Chunk {id: $id})
             ON CREATE SET c.doc_id = $doc_id, c.text = $text,
                           c.start_offset = $start_offset, c.end_offset = $end_offset,
                           c.page = CASE WHEN $page < 0 THEN null ELSE $page END,
                           c.heading = CASE WHEN $heading = '' THEN null ELSE $heading END
             MERGE (c)-[:PART_OF]->(d)"
                .to_string(),
        )
        .param("id", chunk.id.clone())
        .param("doc_id", chunk.doc_id.clone())
        .param("text", chunk.text.clone())
        .param("start_offset", chunk.start_offset as i64)
        .param("end_offset", chunk.end_offset as i64)
        .param("page", chunk.page.map(|p| p as i64).unwrap_or(-1))
        .param("heading", chunk.heading.clone().unwrap_or_default());
        self.run(query).await?;
        Ok(chunk.clone())
    }

    async fn get_chunk(&self, id: &str) -> Result<ChunkNode, GraphError> {
        let query = Query::new(
            "MATCH (c:Chunk {id: $id})
             RETURN c.id AS id, c.doc_id AS doc_id, c.text AS text,
                    c.start_offset AS start_offset, c.end_offset AS end_offset,
                    coalesce(c.page, -1) AS page, coalesce(c.heading, '') AS heading"
                .to_string(),
        )
        .param("id", id.to_string());
        let row = self
            .one(query)
            .await?
            .ok_or_else(|| GraphError::not_found("chunk", id))?;
        Ok(chunk_from_row(&row))
    }

    async fn get_chunks_by_document(&self, doc_id: &str) -> Result<Vec<ChunkNode>, GraphError> {
        let query = Query::new(
            "MATCH (c:Chunk)-[:PART_OF]->(d:Document {id: $doc_id})
             RETURN c.id AS id, c.doc_id AS doc_id, c.text AS text,
                    c.start_offset AS start_offset, c.end_offset AS end_offset,
                    coalesce(c.page, -1) AS page, coalesce(c.heading, '') AS heading
             ORDER BY c.start_offset"
                .to_string(),
        )
        .param("doc_id", doc_id.to_string());
        let rows = self.rows(query).await?;
        Ok(rows.iter().map(chunk_from_row).collect())
    }

    async fn create_entity(
        &self,
        id: &str,
        name: &str,
        entity_type: &str,
        confidence: f64,
    ) -> Result<Entity, GraphError> {
        let query = Query::new(
            "MERGE (e:Entity {id: $id})
             ON CREATE SET e.canonical_name = $name, e.entity_type = $entity_type,
                           e.aliases = [], e.mention_count = 0, e.confidence = $confidence
             ON MATCH SET e.confidence = CASE WHEN $confidence > e.confidence
                                              THEN $confidence ELSE e.confidence END
             RETURN e.id AS id, e.canonical_name AS canonical_name,
                    e.entity_type AS entity_type, e.aliases AS aliases,
                    e.mention_count AS mention_count, e.confidence AS confidence"
                .to_string(),
        )
        .param("id", id.to_string())
        .param("name", name.to_string())
        .param("entity_type", entity_type.to_uppercase())
        .param("confidence", confidence);
        let row = self
            .one(query)
            .await?
            .ok_or_else(|| GraphError::Backend("entity merge returned no row".to_string()))?;
        Ok(entity_from_row(&row))
    }

    async fn get_entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>, GraphError> {
        let query = Query::new(
            "MATCH (e:Entity {entity_type: $entity_type})
             RETURN e.id AS id, e.canonical_name AS canonical_name,
                    e.entity_type AS entity_type, e.aliases AS aliases,
                    e.mention_count AS mention_count, e.confidence AS confidence
             ORDER BY e.id"
                .to_string(),
        )
        .param("entity_type", entity_type.to_uppercase());
        let rows = self.rows(query).await?;
        Ok(rows.iter().map(entity_from_row).collect())
    }

    async fn create_mention(
        &self,
        id: &str,
        chunk_id: &str,
        entity_id: &str,
        text: &str,
        start_offset: usize,
        end_offset: usize,
        confidence: f64,
    ) -> Result<Mention, GraphError> {
        if !self.node_exists("Chunk", chunk_id).await? {
            return Err(GraphError::not_found("chunk", chunk_id));
        }
        if !self.node_exists("Entity", entity_id).await? {
            return Err(GraphError::not_found("entity", entity_id));
        }
        let query = Query::new(
            "MATCH (c:Chunk {id: $chunk_id})
             MATCH (e:Entity {id: $entity_id})
             MERGE (m:Mention {id: $id})
             ON CREATE SET m.chunk_id = $chunk_id, m.text = $text,
                           m.start_offset = $start_offset, m.end_offset = $end_offset,
                           m.kind = 'entity'
             MERGE (m)-[:FOUND_IN]->(c)
             MERGE (m)-[r:REFERS_TO]->(e)
             ON CREATE SET r.confidence = $confidence"
                .to_string(),
        )
        .param("id", id.to_string())
        .param("chunk_id", chunk_id.to_string())
        .param("entity_id", entity_id.to_string())
        .param("text", text.to_string())
        .param("start_offset", start_offset as i64)
        .param("end_offset", end_offset as i64)
        .param("confidence", confidence);
        self.run(query).await?;
        Ok(Mention {
            id: id.to_string(),
            chunk_id: chunk_id.to_string(),
            text: text.to_string(),
            start_offset,
            end_offset,
            kind: MentionKind::Entity,
        })
    }

    async fn create_pronoun_mention(
        &self,
        id: &str,
        chunk_id: &str,
        text: &str,
        start_offset: usize,
        end_offset: usize,
    ) -> Result<Mention, GraphError> {
        if !self.node_exists("Chunk", chunk_id).await? {
            return Err(GraphError::not_found("chunk", chunk_id));
        }
        let query = Query::new(
            "MATCH (c:Chunk {id: $chunk_id})
             MERGE (m:Mention {id: $id})
             ON CREATE SET m.chunk_id = $chunk_id, m.text = $text,
                           m.start_offset = $start_offset, m.end_offset = $end_offset,
                           m.kind = 'pronoun'
             MERGE (m)-[:FOUND_IN]->(c)"
                .to_string(),
        )
        .param("id", id.to_string())
        .param("chunk_id", chunk_id.to_string())
        .param("text", text.to_string())
        .param("start_offset", start_offset as i64)
        .param("end_offset", end_offset as i64);
        self.run(query).await?;
        Ok(Mention {
            id: id.to_string(),
            chunk_id: chunk_id.to_string(),
            text: text.to_string(),
            start_offset,
            end_offset,
            kind: MentionKind::Pronoun,
        })
    }

    async fn get_mention_text(&self, mention_id: &str) -> Result<String, GraphError> {
        let query = Query::new(
            "MATCH (m:Mention {id: $id}) RETURN m.text AS text".to_string(),
        )
        .param("id", mention_id.to_string());
        let row = self
            .one(query)
            .await?
            .ok_or_else(|| GraphError::not_found("mention", mention_id))?;
        Ok(row.get::<String>("text").unwrap_or_default())
    }

    async fn create_coref_edge(
        &self,
        source_mention_id: &str,
        target_mention_id: &str,
        cluster_id: &str,
    ) -> Result<bool, GraphError> {
        if !self.node_exists("Mention", source_mention_id).await? {
            return Err(GraphError::not_found("mention", source_mention_id));
        }
        if !self.node_exists("Mention", target_mention_id).await? {
            return Err(GraphError::not_found("mention", target_mention_id));
        }
        let query = Query::new(
            "MATCH (s:Mention {id: $source_id})
             MATCH (t:Mention {id: $target_id})
             MERGE (s)-[r:COREF_WITH]->(t)
             ON CREATE SET r.cluster_id = $cluster_id, r.created = true
             ON MATCH SET r.created = false
             RETURN r.created AS created"
                .to_string(),
        )
        .param("source_id", source_mention_id.to_string())
        .param("target_id", target_mention_id.to_string())
        .param("cluster_id", cluster_id.to_string());
        let row = self.one(query).await?;
        Ok(row
            .map(|r| r.get::<bool>("created").unwrap_or(false))
            .unwrap_or(false))
    }

    async fn get_coref_chains(&self, doc_id: &str) -> Result<Vec<CorefChain>, GraphError> {
        let query = Query::new(
            "MATCH (d:Document {id: $doc_id})<-[:PART_OF]-(:Chunk)
                   <-[:FOUND_IN]-(s:Mention)-[r:COREF_WITH]->(t:Mention)
             RETURN r.cluster_id AS cluster_id,
                    s.id AS source_id, s.text AS source_text, s.kind AS source_kind,
                    t.id AS target_id, t.text AS target_text, t.kind AS target_kind
             ORDER BY r.cluster_id"
                .to_string(),
        )
        .param("doc_id", doc_id.to_string());
        let rows = self.rows(query).await?;

        let mut chains: Vec<CorefChain> = Vec::new();
        for row in &rows {
            let cluster_id = row.get::<String>("cluster_id").unwrap_or_default();
            let members = [
                (
                    row.get::<String>("target_id").unwrap_or_default(),
                    row.get::<String>("target_text").unwrap_or_default(),
                    row.get::<String>("target_kind").unwrap_or_default(),
                ),
                (
                    row.get::<String>("source_id").unwrap_or_default(),
                    row.get::<String>("source_text").unwrap_or_default(),
                    row.get::<String>("source_kind").unwrap_or_default(),
                ),
            ];
            let chain = match chains.iter_mut().find(|c| c.cluster_id == cluster_id) {
                Some(chain) => chain,
                None => {
                    chains.push(CorefChain {
                        cluster_id: cluster_id.clone(),
                        mentions: Vec::new(),
                    });
                    chains.last_mut().unwrap()
                }
            };
            for (mention_id, text, kind) in members {
                if chain.mentions.iter().any(|m| m.mention_id == mention_id) {
                    continue;
                }
                chain.mentions.push(CorefMention {
                    mention_id,
                    text,
                    kind: if kind == "pronoun" {
                        MentionKind::Pronoun
                    } else {
                        MentionKind::Entity
                    },
                });
            }
        }
        Ok(chains)
    }

    async fn upsert_relation(&self, edge: &RelationEdge) -> Result<(), GraphError> {
        if !self.node_exists("Entity", &edge.subject_id).await? {
            return Err(GraphError::not_found("entity", &edge.subject_id));
        }
        if !self.node_exists("Entity", &edge.object_id).await? {
            return Err(GraphError::not_found("entity", &edge.object_id));
        }
        // Evidence and source chunk are rewritten only while the incoming
        // confidence is strictly greater; the comparisons run before the
        // confidence itself is raised.
        let query = Query::new(
            "MATCH (s:Entity {id: $subject_id})
             MATCH (o:Entity {id: $object_id})
             MERGE (s)-[r:RELATES {type: $relation_type}]->(o)
             ON CREATE SET r.confidence = $confidence, r.evidence = $evidence,
                           r.source_chunk_id = $source_chunk_id,
                           r.year = CASE WHEN $year = '' THEN null ELSE $year END
             ON MATCH SET r.evidence = CASE WHEN $confidence > r.confidence
                                            THEN $evidence ELSE r.evidence END,
                          r.source_chunk_id = CASE WHEN $confidence > r.confidence
                                                   THEN $source_chunk_id
                                                   ELSE r.source_chunk_id END,
                          r.year = coalesce(r.year,
                                            CASE WHEN $year = '' THEN null ELSE $year END),
                          r.confidence = CASE WHEN $confidence > r.confidence
                                              THEN $confidence ELSE r.confidence END"
                .to_string(),
        )
        .param("subject_id", edge.subject_id.clone())
        .param("object_id", edge.object_id.clone())
        .param("relation_type", edge.relation_type.clone())
        .param("confidence", edge.confidence)
        .param("evidence", edge.evidence.clone())
        .param("source_chunk_id", edge.source_chunk_id.clone())
        .param("year", edge.year.clone().unwrap_or_default());
        self.run(query).await
    }

    async fn get_relation(
        &self,
        relation_type: &str,
        subject_id: &str,
        object_id: &str,
    ) -> Result<Option<RelationEdge>, GraphError> {
        let query = Query::new(
            "MATCH (s:Entity {id: $subject_id})
                   -[r:RELATES {type: $relation_type}]->
                   (o:Entity {id: $object_id})
             RETURN r.confidence AS confidence, r.evidence AS evidence,
                    r.source_chunk_id AS source_chunk_id, coalesce(r.year, '') AS year"
                .to_string(),
        )
        .param("subject_id", subject_id.to_string())
        .param("object_id", object_id.to_string())
        .param("relation_type", relation_type.to_string());
        let row = match self.one(query).await? {
            Some(row) => row,
            None => return Ok(None),
        };
        let year = row.get::<String>("year").unwrap_or_default();
        Ok(Some(RelationEdge {
            relation_type: relation_type.to_string(),
            subject_id: subject_id.to_string(),
            object_id: object_id.to_string(),
            confidence: row.get::<f64>("confidence").unwrap_or(0.0),
            evidence: row.get::<String>("evidence").unwrap_or_default(),
            source_chunk_id: row.get::<String>("source_chunk_id").unwrap_or_default(),
            year: if year.is_empty() { None } else { Some(year) },
        }))
    }

    async fn link_mention_to_entity(
        &self,
        mention_id: &str,
        entity_id: &str,
        alias: &str,
        confidence: f64,
    ) -> Result<bool, GraphError> {
        if !self.node_exists("Mention", mention_id).await? {
            return Err(GraphError::not_found("mention", mention_id));
        }
        if !self.node_exists("Entity", entity_id).await? {
            return Err(GraphError::not_found("entity", entity_id));
        }
        // Single statement: the count moves only on edge creation, and the
        // alias list append is conditional on membership, so replays and
        // concurrent writers converge on the same end state.
        let query = Query::new(
            "MATCH (m:Mention {id: $mention_id})
             MATCH (e:Entity {id: $entity_id})
             MERGE (m)-[l:LINKED_TO]->(e)
             ON CREATE SET l.confidence = $confidence, l.created = true,
                           e.mention_count = coalesce(e.mention_count, 0) + 1
             ON MATCH SET l.confidence = $confidence, l.created = false
             SET e.aliases = CASE WHEN $alias IN coalesce(e.aliases, [])
                                  THEN e.aliases
                                  ELSE coalesce(e.aliases, []) + $alias END
             RETURN l.created AS created"
                .to_string(),
        )
        .param("mention_id", mention_id.to_string())
        .param("entity_id", entity_id.to_string())
        .param("alias", alias.to_string())
        .param("confidence", confidence);
        let row = self.one(query).await?;
        Ok(row
            .map(|r| r.get::<bool>("created").unwrap_or(false))
            .unwrap_or(false))
    }
}
