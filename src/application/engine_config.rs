use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Every recognized configuration knob (§6 "Configuration surface"),
/// collected into one serde-deserializable struct. Only `project_root`
/// is required; everything else defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub project_root: PathBuf,
    pub user_id: String,
    pub cache_dir: Option<PathBuf>,
    pub ignore_patterns: Vec<String>,
    pub max_file_size: u64,
    pub enable_git_branch: bool,

    pub bm25: Bm25Config,
    pub budget: BudgetConfig,
    pub embeddings: EmbeddingsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
    pub min_df: usize,
    pub max_df_ratio: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            min_df: 1,
            max_df_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_tokens: u32,
    pub system_reserve: u32,
    pub response_reserve: u32,
    pub min_score: f32,
    pub diversity_weight: f32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            system_reserve: 500,
            response_reserve: 2000,
            min_score: 0.1,
            diversity_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: String,
    pub model: String,
    pub batch_size: usize,
    pub cache_dir: Option<PathBuf>,
    pub cache_max_size_mb: u64,
    pub cache_max_age_days: u32,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "mock-v1".to_string(),
            batch_size: 32,
            cache_dir: None,
            cache_max_size_mb: 100,
            cache_max_age_days: 30,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::new(),
            user_id: "default".to_string(),
            cache_dir: None,
            ignore_patterns: Vec::new(),
            max_file_size: 1024 * 1024,
            enable_git_branch: true,
            bm25: Bm25Config::default(),
            budget: BudgetConfig::default(),
            embeddings: EmbeddingsConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Loads a TOML configuration file, falling back to defaults (with
    /// `project_root` set) when the file is absent.
    pub fn load(project_root: &Path, config_path: &Path) -> Result<Self, DomainError> {
        let text = match std::fs::read_to_string(config_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new(project_root));
            }
            Err(e) => return Err(DomainError::IoFailure(e)),
        };

        let mut config: Self = toml::from_str(&text)
            .map_err(|e| DomainError::invalid_input(format!("invalid config {config_path:?}: {e}")))?;
        config.project_root = project_root.to_path_buf();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_sane_budget() {
        let config = EngineConfig::new("/tmp/proj");
        assert_eq!(config.user_id, "default");
        assert_eq!(config.budget.max_tokens, 8000);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path(), &dir.path().join("codesearch.toml")).unwrap();
        assert_eq!(config.project_root, dir.path());
        assert_eq!(config.bm25.k1, 1.2);
    }

    #[test]
    fn test_load_parses_partial_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("codesearch.toml");
        std::fs::write(&config_path, "user_id = \"alice\"\n[budget]\nmax_tokens = 4000\n").unwrap();

        let config = EngineConfig::load(dir.path(), &config_path).unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.budget.max_tokens, 4000);
        assert_eq!(config.budget.system_reserve, 500);
    }
}
