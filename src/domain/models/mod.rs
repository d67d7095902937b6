pub mod chunk;
pub mod embedding;
pub mod engine_state;
pub mod file_hash;
pub mod file_record;
pub mod language;
pub mod project_index;
pub mod search_result;
pub mod symbol;

pub use chunk::{estimate_token_count, Chunk};
pub use embedding::{Embedding, EmbeddingConfig};
pub use engine_state::{EngineState, SnapshotKey};
pub use file_hash::{compute_file_hash, EMPTY_DIGEST};
pub use file_record::{normalize_path, FileRecord, ParseError, ParseResult};
pub use language::Language;
pub use project_index::{GitInfo, IndexStats, LanguageStats, ProjectIndex, SNAPSHOT_VERSION};
pub use search_result::{SearchQuery, SearchResult};
pub use symbol::{ImportKind, ImportRef, Span, Symbol, SymbolKind};
