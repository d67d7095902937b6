use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::application::use_cases::EmbeddingCache;
use crate::application::SnapshotStore;
use crate::domain::{DomainError, EngineState, GitInfo, ProjectIndex, SnapshotKey, SNAPSHOT_VERSION};

/// File-system backed `SnapshotStore` (C7, §4.7, §6). Writes under
/// `<projectRoot>/.uce/` by default, accepting a pre-existing `.context/`
/// directory in its place.
pub struct FileSnapshotStore {
    cache_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(project_root: &Path) -> Self {
        let cache_dir = Self::resolve_cache_dir(project_root);
        Self { cache_dir }
    }

    /// Accepts whichever of `.uce`/`.context` already exists; defaults to
    /// `.uce` when creating new data (§6).
    fn resolve_cache_dir(project_root: &Path) -> PathBuf {
        let context_dir = project_root.join(".context");
        if context_dir.is_dir() {
            return context_dir;
        }
        project_root.join(".uce")
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn index_path(&self, key: &SnapshotKey) -> PathBuf {
        self.cache_dir.join(key.index_file_name())
    }

    fn state_path(&self) -> PathBuf {
        self.cache_dir.join("state.json.gz")
    }

    fn embedding_cache_path(&self) -> PathBuf {
        self.cache_dir.join("embeddings").join("embeddings.json")
    }

    /// Serializes to a temp file in the same directory, fsyncs it, then
    /// renames over the target so readers never observe a partial write.
    fn atomic_write(&self, path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
        let dir = path.parent().ok_or_else(|| DomainError::storage("snapshot path has no parent"))?;
        std::fs::create_dir_all(dir)?;

        let tmp_path = path.with_extension(format!(
            "{}.tmp",
            path.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));

        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn read_git_info(project_root: &Path) -> GitInfo {
        let git_dir = project_root.join(".git");
        let head_path = git_dir.join("HEAD");
        let Ok(head) = std::fs::read_to_string(&head_path) else {
            return GitInfo {
                branch: "main".to_string(),
                commit: Some(String::new()),
                dirty: false,
            };
        };
        let head = head.trim();
        let dirty = git_dir.join("index").exists();

        if let Some(ref_path) = head.strip_prefix("ref: ") {
            let branch = ref_path.rsplit('/').next().unwrap_or("main").to_string();
            let commit = std::fs::read_to_string(git_dir.join(ref_path))
                .ok()
                .map(|c| c.trim().to_string());
            GitInfo { branch, commit, dirty }
        } else {
            GitInfo {
                branch: "HEAD".to_string(),
                commit: Some(head.to_string()),
                dirty,
            }
        }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save_index(&self, key: &SnapshotKey, index: &ProjectIndex) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|e| DomainError::storage(format!("failed to serialize index: {}", e)))?;
        self.atomic_write(&self.index_path(key), &bytes)?;
        debug!("saved project index to {:?}", self.index_path(key));
        Ok(())
    }

    async fn load_index(&self, key: &SnapshotKey) -> Result<Option<ProjectIndex>, DomainError> {
        let path = self.index_path(key);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DomainError::IoFailure(e)),
        };

        match serde_json::from_slice::<ProjectIndex>(&bytes) {
            Ok(index) => {
                if index.version > SNAPSHOT_VERSION {
                    warn!(
                        "snapshot {:?} is version {}, newer than supported version {}; starting from empty index",
                        path, index.version, SNAPSHOT_VERSION
                    );
                    return Ok(None);
                }
                if index.version < SNAPSHOT_VERSION {
                    warn!(
                        "snapshot {:?} is version {}, current build expects {}; loading as-is, next full refresh migrates it",
                        path, index.version, SNAPSHOT_VERSION
                    );
                }
                Ok(Some(index))
            }
            Err(e) => {
                warn!("failed to parse snapshot {:?}: {} (starting from empty index)", path, e);
                Ok(None)
            }
        }
    }

    async fn save_state(&self, _key: &SnapshotKey, state: &EngineState) -> Result<(), DomainError> {
        let json = serde_json::to_vec(state)
            .map_err(|e| DomainError::storage(format!("failed to serialize state: {}", e)))?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .map_err(|e| DomainError::storage(format!("failed to gzip state: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| DomainError::storage(format!("failed to finish gzip stream: {}", e)))?;

        self.atomic_write(&self.state_path(), &compressed)?;
        Ok(())
    }

    async fn load_state(&self, _key: &SnapshotKey) -> Result<Option<EngineState>, DomainError> {
        let path = self.state_path();
        let compressed = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DomainError::IoFailure(e)),
        };

        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut json = Vec::new();
        decoder
            .read_to_end(&mut json)
            .map_err(|e| DomainError::storage(format!("failed to ungzip state: {}", e)))?;

        serde_json::from_slice(&json)
            .map(Some)
            .map_err(|e| DomainError::IndexCorrupted(e.to_string()))
    }

    async fn list_keys(&self) -> Result<Vec<SnapshotKey>, DomainError> {
        if !self.cache_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix("index-") else { continue };
            let Some(rest) = rest.strip_suffix(".json") else { continue };
            // rest is "<userId>-<branch-with-dashes>"; userId never contains
            // '-' by convention (default "default"), so split on the first dash.
            if let Some((user_id, branch)) = rest.split_once('-') {
                keys.push(SnapshotKey {
                    user_id: user_id.to_string(),
                    branch: branch.to_string(),
                });
            }
        }
        Ok(keys)
    }

    async fn delete(&self, key: &SnapshotKey) -> Result<(), DomainError> {
        let path = self.index_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DomainError::IoFailure(e)),
        }
    }

    async fn save_embedding_cache(&self, cache: &EmbeddingCache) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec_pretty(cache)
            .map_err(|e| DomainError::storage(format!("failed to serialize embedding cache: {}", e)))?;
        self.atomic_write(&self.embedding_cache_path(), &bytes)?;
        Ok(())
    }

    async fn load_embedding_cache(&self) -> Result<Option<EmbeddingCache>, DomainError> {
        let path = self.embedding_cache_path();
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DomainError::IoFailure(e)),
        };
        match serde_json::from_slice(&bytes) {
            Ok(cache) => Ok(Some(cache)),
            Err(e) => {
                warn!("failed to parse embedding cache {:?}: {} (starting from empty cache)", path, e);
                Ok(None)
            }
        }
    }
}

/// Reads git branch/commit/dirty state directly from `.git/`, per §6. Kept
/// free so callers building a fresh `ProjectIndex` don't need a store
/// instance just to learn the current branch.
pub fn read_git_info(project_root: &Path) -> GitInfo {
    FileSnapshotStore::read_git_info(project_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Language;
    use crate::domain::FileRecord;

    fn sample_index() -> ProjectIndex {
        let mut index = ProjectIndex::new("proj", "/tmp/proj", GitInfo::unknown(), 0);
        index.files.insert(
            "a.rs".to_string(),
            FileRecord::new("a.rs", "h1", 0, 10, Language::Rust),
        );
        index.refresh_stats();
        index
    }

    #[tokio::test]
    async fn test_save_then_load_index_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let key = SnapshotKey::new("default", "main");
        let index = sample_index();

        store.save_index(&key, &index).await.unwrap();
        let loaded = store.load_index(&key).await.unwrap().unwrap();

        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.name, "proj");
    }

    #[tokio::test]
    async fn test_load_missing_index_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let key = SnapshotKey::new("default", "main");

        assert!(store.load_index(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_branch_switch_uses_separate_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let main_key = SnapshotKey::new("default", "main");
        let feature_key = SnapshotKey::new("default", "feature/x");

        store.save_index(&main_key, &sample_index()).await.unwrap();

        assert!(store.load_index(&feature_key).await.unwrap().is_none());
        assert!(store.load_index(&main_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_state_roundtrips_through_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let key = SnapshotKey::new("default", "main");
        let index = sample_index();
        let state = EngineState::from_index(&index, "0.1.0", 0, Some(10));

        store.save_state(&key, &state).await.unwrap();
        let loaded = store.load_state(&key).await.unwrap().unwrap();

        assert_eq!(loaded.generation, state.generation);
        assert_eq!(loaded.bm25_vocab, Some(10));
    }

    #[tokio::test]
    async fn test_list_keys_discovers_saved_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        store
            .save_index(&SnapshotKey::new("default", "main"), &sample_index())
            .await
            .unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].branch, "main");
    }

    #[tokio::test]
    async fn test_delete_removes_index_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let key = SnapshotKey::new("default", "main");
        store.save_index(&key, &sample_index()).await.unwrap();

        store.delete(&key).await.unwrap();
        assert!(store.load_index(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_embedding_cache_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let mut cache = EmbeddingCache::new(crate::application::use_cases::EmbeddingCacheConfig::default());
        cache.put("mock", "m1", "fn foo() {}", vec![0.1, 0.2], 100);

        store.save_embedding_cache(&cache).await.unwrap();
        let loaded = store.load_embedding_cache().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_embedding_cache_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        assert!(store.load_embedding_cache().await.unwrap().is_none());
    }

    #[test]
    fn test_read_git_info_without_git_dir_defaults_to_main() {
        let dir = tempfile::tempdir().unwrap();
        let info = read_git_info(dir.path());
        assert_eq!(info.branch, "main");
        assert!(!info.dirty);
    }
}
