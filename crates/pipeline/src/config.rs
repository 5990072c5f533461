use serde::{Deserialize, Serialize};

use ingest::ChunkerConfig;
use link::LinkerConfig;
use resolve::CorefConfig;

/// Aggregated configuration for one pipeline instance. Built once at
/// startup and injected by constructor; immutable afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub chunker: ChunkerConfig,
    pub coref: CorefConfig,
    pub linker: LinkerConfig,
    pub concurrency: ConcurrencyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Documents processed end-to-end in parallel.
    pub max_concurrent_documents: usize,
    /// Chunk extraction calls in flight within one document.
    pub max_concurrent_chunks: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_documents: 4,
            max_concurrent_chunks: 8,
        }
    }
}
