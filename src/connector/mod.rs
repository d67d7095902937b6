//! # Connector Layer
//!
//! External integrations implementing domain interfaces:
//! - Embedding generation (deterministic mock, or ONNX via `ort`)
//! - Vector storage (DuckDB VSS extension, or in-memory for tests)
//! - Parsing (Tree-sitter)
//! - Snapshot persistence (file system, per §6)

pub mod adapter;
pub mod persistence;

pub use adapter::*;
pub use persistence::*;
