use thiserror::Error;

/// Errors from graph store operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A required node is absent. Callers treat this as a fatal
    /// precondition violation, never as something to retry.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("graph backend error: {0}")]
    Backend(String),
}

impl GraphError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
