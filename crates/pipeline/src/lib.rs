//! End-to-end orchestration: document in, provenance-tracked graph out.
//! One logical worker processes a document through chunking, extraction,
//! coreference, relation extraction, and linking; independent documents run
//! in parallel under a bounded semaphore.

pub mod config;
pub mod error;

pub use config::{ConcurrencyConfig, PipelineConfig};
pub use error::PipelineError;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use extract::{ChunkExtraction, EntityExtractor, ExtractStrategy};
use graph::{ChunkNode, GraphStore};
use ingest::{Chunk, Chunker};
use link::{EntityLinker, LinkRequest};
use resolve::{CorefResolver, RelationExtractor, RelationMention};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    pub url: String,
    pub title: String,
    pub text: String,
    pub metadata: HashMap<String, String>,
}

impl DocumentInput {
    pub fn new(url: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub doc_id: String,
    pub chunks: usize,
    pub mentions: usize,
    pub coref_links: usize,
    pub relations: usize,
    pub linked: usize,
    pub link_failures: usize,
}

pub struct Pipeline<S, X> {
    store: Arc<S>,
    chunker: Chunker,
    extractor: Arc<EntityExtractor<S, X>>,
    coref: CorefResolver<S>,
    relations: RelationExtractor<S>,
    linker: EntityLinker<S>,
    concurrency: ConcurrencyConfig,
}

impl<S, X> Pipeline<S, X>
where
    S: GraphStore + 'static,
    X: ExtractStrategy + 'static,
{
    pub fn new(store: Arc<S>, strategy: X, config: PipelineConfig) -> Self {
        let chunker = Chunker::new(config.chunker.clone());
        let extractor = Arc::new(EntityExtractor::new(store.clone(), strategy));
        let coref = CorefResolver::new(store.clone(), config.coref.clone());
        let relations = RelationExtractor::new(store.clone());
        let linker = EntityLinker::new(store.clone(), config.linker.clone());
        Self {
            store,
            chunker,
            extractor,
            coref,
            relations,
            linker,
            concurrency: config.concurrency.clone(),
        }
    }

    /// Process one document end-to-end. Replays converge: every write is
    /// an idempotent upsert keyed by deterministic ids.
    pub async fn process_document(
        &self,
        input: &DocumentInput,
    ) -> Result<DocumentReport, PipelineError> {
        let doc_id = ident::document_id(&input.url);
        self.store
            .create_document(&doc_id, &ident::normalize_url(&input.url), &input.title, &input.metadata)
            .await?;

        let chunks = self.chunker.chunk_text(&doc_id, &input.text);
        for chunk in &chunks {
            self.store.create_chunk(&to_chunk_node(chunk)).await?;
        }
        info!(doc_id = %doc_id, chunks = chunks.len(), "document chunked");

        // Fan out extraction per chunk; everything downstream needs the
        // complete chunk-to-mention mapping, so join before continuing.
        let extractions = self.extract_all(&chunks).await?;

        let mut coref_links = 0usize;
        let mut relations = 0usize;
        let mut requests = Vec::new();

        for (chunk, extraction) in chunks.iter().zip(&extractions) {
            let links = self
                .coref
                .resolve_chunk(&chunk.chunk_id, &chunk.text, &extraction.mentions)
                .await?;

            let mut stage_mentions: Vec<RelationMention> = extraction
                .mentions
                .iter()
                .map(RelationMention::from_mention)
                .collect();
            stage_mentions.extend(links.iter().map(RelationMention::from_coref));
            let edges = self
                .relations
                .extract_chunk(&chunk.chunk_id, &chunk.text, &stage_mentions)
                .await?;

            coref_links += links.len();
            relations += edges.len();

            requests.extend(extraction.mentions.iter().map(|m| LinkRequest {
                mention_id: m.mention_id.clone(),
                name: m.text.clone(),
                entity_type: m.entity_type.clone(),
            }));
        }

        let batch = self.linker.link_batch(&requests).await;
        for result in &batch.results {
            if let Err(error) = result {
                warn!(doc_id = %doc_id, error = %error, "mention link failed");
            }
        }

        let report = DocumentReport {
            doc_id: doc_id.clone(),
            chunks: chunks.len(),
            mentions: extractions.iter().map(|e| e.mentions.len()).sum(),
            coref_links,
            relations,
            linked: batch.linked(),
            link_failures: batch.failed(),
        };
        info!(
            doc_id = %doc_id,
            mentions = report.mentions,
            coref_links = report.coref_links,
            relations = report.relations,
            linked = report.linked,
            "document processed"
        );
        Ok(report)
    }

    /// Process independent documents in parallel, bounded by the document
    /// concurrency limit. Results come back in input order; one failed
    /// document never affects the others.
    pub async fn process_documents(
        self: &Arc<Self>,
        inputs: Vec<DocumentInput>,
    ) -> Vec<Result<DocumentReport, PipelineError>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max_concurrent_documents.max(1)));
        let mut join_set = JoinSet::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                (index, pipeline.process_document(&input).await)
            });
        }

        let mut results: Vec<Option<Result<DocumentReport, PipelineError>>> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if results.len() <= index {
                        results.resize_with(index + 1, || None);
                    }
                    results[index] = Some(result);
                }
                Err(join_error) => {
                    warn!(error = %join_error, "document worker panicked");
                }
            }
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(PipelineError::Worker("worker dropped".into()))))
            .collect()
    }

    async fn extract_all(
        &self,
        chunks: &[Chunk],
    ) -> Result<Vec<ChunkExtraction>, PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max_concurrent_chunks.max(1)));
        let mut join_set = JoinSet::new();

        for (index, chunk) in chunks.iter().enumerate() {
            let extractor = Arc::clone(&self.extractor);
            let semaphore = Arc::clone(&semaphore);
            let chunk_id = chunk.chunk_id.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                (index, extractor.extract_chunk(&chunk_id).await)
            });
        }

        let mut extractions: Vec<Option<ChunkExtraction>> = vec![None; chunks.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, result) =
                joined.map_err(|e| PipelineError::Worker(e.to_string()))?;
            extractions[index] = Some(result?);
        }

        Ok(extractions
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| ChunkExtraction {
                chunk_id: String::new(),
                mentions: Vec::new(),
            }))
            .collect())
    }
}

fn to_chunk_node(chunk: &Chunk) -> ChunkNode {
    ChunkNode {
        id: chunk.chunk_id.clone(),
        doc_id: chunk.doc_id.clone(),
        text: chunk.text.clone(),
        start_offset: chunk.start_offset,
        end_offset: chunk.end_offset,
        page: chunk.page,
        heading: chunk.heading.clone(),
    }
}
