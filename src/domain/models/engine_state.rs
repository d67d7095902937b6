use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{GitInfo, IndexStats, ProjectIndex, SNAPSHOT_VERSION};

/// Identifies one persisted snapshot: `(userId, branch)` with `/` replaced
/// by `-` in `branch` (§4.7 "Snapshot key").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub user_id: String,
    pub branch: String,
}

impl SnapshotKey {
    pub fn new(user_id: impl Into<String>, branch: impl Into<String>) -> Self {
        let branch = branch.into().replace('/', "-");
        Self {
            user_id: user_id.into(),
            branch,
        }
    }

    /// File stem used for the project-index snapshot (§6): `index-<userId>-<branch>`.
    pub fn index_file_name(&self) -> String {
        format!("index-{}-{}.json", self.user_id, self.branch)
    }
}

/// A separate, lighter-weight snapshot used to warm-start a process
/// without loading the full file index (§4.7 "State-only snapshots").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub version: u32,
    pub uce_version: String,
    pub timestamp: i64,
    pub root: String,
    pub git: GitInfo,
    pub file_hashes: BTreeMap<String, String>,
    pub generation: u64,
    pub embeddings_count: u64,
    pub bm25_vocab: Option<usize>,
    pub graph_node_count: Option<usize>,
    pub stats: IndexStats,
}

impl EngineState {
    /// Derives the warm-start state blob from a full project index.
    pub fn from_index(index: &ProjectIndex, uce_version: impl Into<String>, embeddings_count: u64, bm25_vocab: Option<usize>) -> Self {
        let file_hashes = index
            .files
            .iter()
            .map(|(path, record)| (path.clone(), record.hash().to_string()))
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            uce_version: uce_version.into(),
            timestamp: index.updated_at,
            root: index.root.clone(),
            git: index.git.clone(),
            file_hashes,
            generation: index.generation,
            embeddings_count,
            bm25_vocab,
            graph_node_count: Some(index.deps.len()),
            stats: index.stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key_replaces_slashes_in_branch() {
        let key = SnapshotKey::new("default", "feature/foo");
        assert_eq!(key.branch, "feature-foo");
        assert_eq!(key.index_file_name(), "index-default-feature-foo.json");
    }
}
