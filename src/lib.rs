//! # CodeSearch
//!
//! Incremental code indexer and hybrid (BM25 + vector) retriever with
//! token-budgeted context assembly.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Core business models, repository traits, and service interfaces
//! - `application`: Use cases and orchestration logic (incremental indexing,
//!   hybrid retrieval, budget optimization)
//! - `connector`: External integrations (Tree-sitter, DuckDB, ONNX embeddings,
//!   file system snapshot persistence)

pub mod application;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use connector::*;
pub use domain::*;
