use thiserror::Error;

/// Error kinds for the indexing and retrieval core (see spec §7).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("parse error: {0}")]
    ParseFailure(String),

    #[error("storage error: {0}")]
    StorageError(String),

    /// Snapshot failed to deserialize, or reports a major version higher
    /// than this build supports. The loader treats this as "no index".
    #[error("index corrupted: {0}")]
    IndexCorrupted(String),

    /// Snapshot major version is older than current. Caller should log a
    /// warning and migrate/rebuild on the next full refresh.
    #[error("version skew: {0}")]
    VersionSkew(String),

    /// Embedding provider or vector store failed. Hybrid search degrades
    /// to sparse-only for the query that triggered this.
    #[error("provider error: {0}")]
    ProviderFailure(String),

    /// Available token budget was non-positive. Not a hard failure: the
    /// budget optimizer treats this as an empty, non-error result.
    #[error("budget infeasible: {0}")]
    BudgetInfeasible(String),

    /// A long-running operation observed its cancellation token set.
    #[error("operation cancelled")]
    CancelRequested,

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseFailure(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::ProviderFailure(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::CancelRequested)
    }
}
