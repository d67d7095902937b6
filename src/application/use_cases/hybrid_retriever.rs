use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::use_cases::bm25_index::Bm25Index;
use crate::application::use_cases::rrf_fuse::{rrf_fuse, DEFAULT_WEIGHT_DENSE, DEFAULT_WEIGHT_SPARSE, RRF_K};
use crate::application::{EmbeddingProvider, VectorStore};
use crate::domain::{Chunk, DomainError, SearchResult};

#[derive(Debug, Clone)]
pub struct HybridRetrieverConfig {
    pub k: f32,
    pub weight_sparse: f32,
    pub weight_dense: f32,
    pub min_score: f32,
}

impl Default for HybridRetrieverConfig {
    fn default() -> Self {
        Self {
            k: RRF_K,
            weight_sparse: DEFAULT_WEIGHT_SPARSE,
            weight_dense: DEFAULT_WEIGHT_DENSE,
            min_score: 0.0,
        }
    }
}

/// Combines BM25 (C8) and an optional dense vector store (C9) via weighted
/// RRF (C10, §4.10). Degrades gracefully: a missing or failing leg simply
/// contributes nothing to the fused ranking.
pub struct HybridRetriever {
    vector_store: Option<Arc<dyn VectorStore>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    config: HybridRetrieverConfig,
}

impl HybridRetriever {
    pub fn new(config: HybridRetrieverConfig) -> Self {
        Self {
            vector_store: None,
            embedding_provider: None,
            config,
        }
    }

    pub fn with_dense(
        mut self,
        vector_store: Arc<dyn VectorStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        self.vector_store = Some(vector_store);
        self.embedding_provider = Some(embedding_provider);
        self
    }

    /// `search(query, limit)` per §4.10: fetch `min(limit*3, 100)` from
    /// BM25, the same count from dense search when configured, fuse with
    /// weighted RRF, drop below `minScore`, return up to `limit`.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        bm25: &Bm25Index,
        chunks: &HashMap<String, Chunk>,
        file_filter: Option<&str>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let start = Instant::now();
        let fetch_limit = (limit * 3).min(100);

        let sparse: Vec<(Chunk, f32)> = bm25
            .search(query, fetch_limit)
            .into_iter()
            .filter_map(|(id, score)| chunks.get(&id).map(|c| (c.clone(), score)))
            .collect();

        let dense = self.fetch_dense(query, fetch_limit, file_filter, chunks).await;

        debug!(
            "hybrid retrieval: {} sparse, {} dense candidates",
            sparse.len(),
            dense.len()
        );

        let fused = rrf_fuse(
            sparse,
            dense,
            self.config.k,
            self.config.weight_sparse,
            self.config.weight_dense,
            self.config.min_score,
            limit,
        );

        info!(
            "hybrid search for \"{}\" returned {} results in {:.3}s",
            query,
            fused.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(fused)
    }

    async fn fetch_dense(
        &self,
        query: &str,
        fetch_limit: usize,
        file_filter: Option<&str>,
        chunks: &HashMap<String, Chunk>,
    ) -> Vec<(Chunk, f32)> {
        let (Some(store), Some(provider)) = (&self.vector_store, &self.embedding_provider) else {
            return Vec::new();
        };

        let embedding = match provider.embed_query(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!("dense leg unavailable, degrading to sparse-only: {}", e);
                return Vec::new();
            }
        };

        match store.search(&embedding, fetch_limit, file_filter).await {
            Ok(matches) => matches
                .into_iter()
                .filter_map(|m| chunks.get(&m.id).map(|c| (c.clone(), m.score)))
                .collect(),
            Err(e) => {
                warn!("vector store search failed, degrading to sparse-only: {}", e);
                Vec::new()
            }
        }
    }
}
