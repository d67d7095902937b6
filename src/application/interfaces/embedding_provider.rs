use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, Embedding, EmbeddingConfig};

/// Generates vector embeddings from chunks and queries (§4.9, §4.12).
/// Failures here are non-fatal to search: the hybrid retriever degrades to
/// sparse-only when a provider call returns `ProviderFailure`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_chunk(&self, chunk: &Chunk) -> Result<Embedding, DomainError>;

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Embedding>, DomainError>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DomainError>;

    fn config(&self) -> &EmbeddingConfig;
}
