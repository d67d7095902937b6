pub mod embedding_provider;
pub mod parser_port;
pub mod snapshot_store;
pub mod vector_store;

pub use embedding_provider::EmbeddingProvider;
pub use parser_port::SourceParser;
pub use snapshot_store::SnapshotStore;
pub use vector_store::{ChunkWithEmbedding, VectorMatch, VectorStore};
