use async_trait::async_trait;

use crate::application::use_cases::EmbeddingCache;
use crate::domain::{DomainError, EngineState, ProjectIndex, SnapshotKey};

/// Persistence boundary for C7 (§4.7, §6). The core never performs I/O on
/// the query path; all reads/writes funnel through this port.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save_index(&self, key: &SnapshotKey, index: &ProjectIndex) -> Result<(), DomainError>;

    async fn load_index(&self, key: &SnapshotKey) -> Result<Option<ProjectIndex>, DomainError>;

    async fn save_state(&self, key: &SnapshotKey, state: &EngineState) -> Result<(), DomainError>;

    async fn load_state(&self, key: &SnapshotKey) -> Result<Option<EngineState>, DomainError>;

    async fn list_keys(&self) -> Result<Vec<SnapshotKey>, DomainError>;

    async fn delete(&self, key: &SnapshotKey) -> Result<(), DomainError>;

    /// Persists the embedding cache (C12, §6 `embeddings/embeddings.json`).
    /// Shared across branches of a project since it's keyed by content hash.
    async fn save_embedding_cache(&self, cache: &EmbeddingCache) -> Result<(), DomainError>;

    async fn load_embedding_cache(&self) -> Result<Option<EmbeddingCache>, DomainError>;
}
