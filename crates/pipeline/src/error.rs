use thiserror::Error;

use extract::ExtractError;
use graph::GraphError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage found a required parent node missing. Fatal for the
    /// document; partial progress already committed is kept and retries
    /// converge through idempotent upserts.
    #[error("precondition failed: {kind} {id} not present")]
    Precondition { kind: &'static str, id: String },

    #[error(transparent)]
    Graph(GraphError),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("worker task failed: {0}")]
    Worker(String),
}

impl From<GraphError> for PipelineError {
    fn from(error: GraphError) -> Self {
        match error {
            GraphError::NotFound { kind, id } => Self::Precondition { kind, id },
            other => Self::Graph(other),
        }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(error: ExtractError) -> Self {
        match error {
            ExtractError::Graph(graph_error) => graph_error.into(),
            ExtractError::Strategy(source) => Self::Extraction(source.to_string()),
        }
    }
}
