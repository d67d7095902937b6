use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{ChunkWithEmbedding, VectorMatch, VectorStore};
use crate::domain::DomainError;

/// In-process vector store (C9). Suitable for tests and small projects
/// where standing up an external vector database is overkill.
pub struct InMemoryVectorStore {
    entries: Arc<Mutex<HashMap<String, (Vec<f32>, HashMap<String, String>)>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, chunks: &[ChunkWithEmbedding]) -> Result<(), DomainError> {
        let mut entries = self.entries.lock().await;
        for item in chunks {
            let mut metadata = HashMap::new();
            metadata.insert("file".to_string(), item.chunk.file().to_string());
            metadata.insert(
                "language".to_string(),
                item.chunk.language_tag().as_str().to_string(),
            );
            entries.insert(
                item.chunk.id().to_string(),
                (item.embedding.vector().to_vec(), metadata),
            );
        }
        debug!("in-memory vector store now holds {} entries", entries.len());
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        file_filter: Option<&str>,
    ) -> Result<Vec<VectorMatch>, DomainError> {
        let entries = self.entries.lock().await;
        let mut scored: Vec<VectorMatch> = entries
            .iter()
            .filter(|(_, (_, metadata))| {
                file_filter.map_or(true, |f| metadata.get("file").map(|m| m.as_str()) == Some(f))
            })
            .map(|(id, (vector, metadata))| VectorMatch {
                id: id.clone(),
                score: cosine_similarity(query_embedding, vector),
                chunk_metadata: metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), DomainError> {
        let mut entries = self.entries.lock().await;
        for id in ids {
            entries.remove(id);
        }
        Ok(())
    }

    async fn delete_by_file(&self, path: &str) -> Result<u64, DomainError> {
        let mut entries = self.entries.lock().await;
        let to_remove: Vec<String> = entries
            .iter()
            .filter(|(_, (_, metadata))| metadata.get("file").map(|m| m.as_str()) == Some(path))
            .map(|(id, _)| id.clone())
            .collect();
        let count = to_remove.len() as u64;
        for id in to_remove {
            entries.remove(&id);
        }
        Ok(count)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.entries.lock().await.len() as u64)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Chunk, Embedding, Language};

    fn chunk_with_embedding(id: &str, vector: Vec<f32>) -> ChunkWithEmbedding {
        let chunk = Chunk::new(id.to_string(), 1, 1, "x".to_string(), Language::Rust, None, 0);
        ChunkWithEmbedding {
            embedding: Embedding::new(chunk.id().to_string(), vector, "mock".to_string()),
            chunk,
        }
    }

    #[tokio::test]
    async fn test_search_ranks_by_cosine_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .add(&[
                chunk_with_embedding("a.rs", vec![1.0, 0.0]),
                chunk_with_embedding("b.rs", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results[0].id, "a.rs");
    }

    #[tokio::test]
    async fn test_delete_by_file_removes_matching_entries() {
        let store = InMemoryVectorStore::new();
        store
            .add(&[chunk_with_embedding("a.rs", vec![1.0, 0.0])])
            .await
            .unwrap();
        let deleted = store.delete_by_file("a.rs").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
