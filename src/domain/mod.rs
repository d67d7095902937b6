pub mod error;
pub mod models;

pub use error::DomainError;
pub use models::{
    compute_file_hash, estimate_token_count, Chunk, Embedding, EmbeddingConfig, EngineState,
    FileRecord, GitInfo, ImportKind, ImportRef, IndexStats, Language, LanguageStats, ParseError,
    ParseResult, ProjectIndex, SearchQuery, SearchResult, SnapshotKey, Span, Symbol, SymbolKind,
    EMPTY_DIGEST, SNAPSHOT_VERSION,
};
