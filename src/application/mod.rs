//! # Application Layer
//!
//! Use cases and orchestration logic coordinating domain and connector layers.

pub mod cancellation;
pub mod engine_config;
pub mod interfaces;
pub mod use_cases;

pub use cancellation::CancellationToken;
pub use engine_config::{Bm25Config, BudgetConfig, EmbeddingsConfig, EngineConfig};
pub use interfaces::*;
pub use use_cases::*;
