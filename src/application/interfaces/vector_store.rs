use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::{Chunk, DomainError, Embedding};

/// A chunk paired with its embedding, the unit `add` operates on.
#[derive(Debug, Clone)]
pub struct ChunkWithEmbedding {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// A single hit from a vector search. `score` is cosine-similarity-like,
/// higher is better, in `[0, 1]` (§4.9).
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub chunk_metadata: HashMap<String, String>,
}

/// Minimal vector-store contract the core depends on (§4.9). An
/// implementation backed only by BM25 is permitted; hybrid search then
/// degrades to sparse-only.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, chunks: &[ChunkWithEmbedding]) -> Result<(), DomainError>;

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        file_filter: Option<&str>,
    ) -> Result<Vec<VectorMatch>, DomainError>;

    async fn delete(&self, ids: &[String]) -> Result<(), DomainError>;

    async fn delete_by_file(&self, path: &str) -> Result<u64, DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;

    async fn clear(&self) -> Result<(), DomainError>;
}
