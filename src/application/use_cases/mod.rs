pub mod bm25_index;
pub mod budget_optimizer;
pub mod delete_project;
pub mod dependency_graph;
pub mod embedding_cache;
pub mod hybrid_retriever;
pub mod incremental_indexer;
pub mod list_projects;
pub mod rrf_fuse;
pub mod search_code;

pub use bm25_index::{tokenize, Bm25Index};
pub use budget_optimizer::{
    optimize, optimize_with_priority, BudgetCandidate, BudgetParams, BudgetSelection,
};
pub use delete_project::DeleteProjectUseCase;
pub use dependency_graph::{resolve_import, DependencyGraph};
pub use embedding_cache::{EmbeddingCache, EmbeddingCacheConfig};
pub use hybrid_retriever::{HybridRetriever, HybridRetrieverConfig};
pub use incremental_indexer::{IncrementalIndexer, IndexerConfig};
pub use list_projects::{ListProjectsUseCase, ProjectSummary};
pub use rrf_fuse::{rrf_fuse, DEFAULT_WEIGHT_DENSE, DEFAULT_WEIGHT_SPARSE, RRF_K};
pub use search_code::SearchCodeUseCase;
