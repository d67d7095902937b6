use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::FileRecord;

/// Current on-disk snapshot format (§6). Bumped on breaking changes; a
/// snapshot older than this build loads with a warning and migrates on
/// the next full refresh, newer than this build is treated as absent.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitInfo {
    pub branch: String,
    pub commit: Option<String>,
    pub dirty: bool,
}

impl GitInfo {
    pub fn unknown() -> Self {
        Self {
            branch: "unknown".to_string(),
            commit: None,
            dirty: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageStats {
    pub file_count: u64,
    pub chunk_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub file_count: u64,
    pub chunk_count: u64,
    pub symbol_count: u64,
    pub error_count: u64,
    pub language_stats: BTreeMap<String, LanguageStats>,
}

impl IndexStats {
    /// Recomputes every counter from the current file map. Called after
    /// every `update`/`full_refresh` so stats never drift from `files`.
    pub fn recompute(files: &BTreeMap<String, FileRecord>) -> Self {
        let mut stats = IndexStats::default();
        stats.file_count = files.len() as u64;
        for record in files.values() {
            stats.chunk_count += record.chunks().len() as u64;
            stats.symbol_count += record.symbols().len() as u64;
            stats.error_count += record.errors().len() as u64;
            let entry = stats
                .language_stats
                .entry(record.language_tag().as_str().to_string())
                .or_default();
            entry.file_count += 1;
            entry.chunk_count += record.chunks().len() as u64;
        }
        stats
    }
}

/// The full in-memory and on-disk index for one (project, branch) pair
/// (§3 "Project index", §6 snapshot layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectIndex {
    pub version: u32,
    pub name: String,
    pub root: String,
    pub git: GitInfo,
    pub created_at: i64,
    pub updated_at: i64,
    /// Monotonically increasing counter bumped on every mutating
    /// operation; used to detect stale readers/concurrent writers.
    pub generation: u64,
    /// Kept ordered so re-serializing an unchanged index after a rebuild
    /// produces byte-identical JSON (§6 "two successive no-op refreshes").
    pub files: BTreeMap<String, FileRecord>,
    /// file -> files it imports (relative imports only, resolved to paths).
    pub deps: BTreeMap<String, BTreeSet<String>>,
    /// file -> files that import it (the reverse of `deps`).
    pub dependents: BTreeMap<String, BTreeSet<String>>,
    pub stats: IndexStats,
}

impl ProjectIndex {
    pub fn new(name: impl Into<String>, root: impl Into<String>, git: GitInfo, now: i64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            name: name.into(),
            root: root.into(),
            git,
            created_at: now,
            updated_at: now,
            generation: 0,
            files: BTreeMap::new(),
            deps: BTreeMap::new(),
            dependents: BTreeMap::new(),
            stats: IndexStats::default(),
        }
    }

    pub fn touch(&mut self, now: i64) {
        self.updated_at = now;
        self.generation += 1;
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Recomputes `stats` from `files`. Callers that mutate `files`
    /// directly must call this before treating the index as consistent.
    pub fn refresh_stats(&mut self) {
        self.stats = IndexStats::recompute(&self.files);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Language;

    #[test]
    fn test_new_index_generation_starts_at_zero() {
        let idx = ProjectIndex::new("proj", "/tmp/proj", GitInfo::unknown(), 100);
        assert_eq!(idx.generation, 0);
        assert_eq!(idx.created_at, idx.updated_at);
    }

    #[test]
    fn test_touch_bumps_generation() {
        let mut idx = ProjectIndex::new("proj", "/tmp/proj", GitInfo::unknown(), 100);
        idx.touch(200);
        assert_eq!(idx.generation, 1);
        assert_eq!(idx.updated_at, 200);
    }

    #[test]
    fn test_refresh_stats_counts_files_and_languages() {
        let mut idx = ProjectIndex::new("proj", "/tmp/proj", GitInfo::unknown(), 0);
        idx.files.insert(
            "a.rs".to_string(),
            FileRecord::new("a.rs", "h1", 0, 10, Language::Rust),
        );
        idx.files.insert(
            "b.py".to_string(),
            FileRecord::new("b.py", "h2", 0, 10, Language::Python),
        );
        idx.refresh_stats();
        assert_eq!(idx.stats.file_count, 2);
        assert_eq!(idx.stats.language_stats.get("rust").unwrap().file_count, 1);
        assert_eq!(idx.stats.language_stats.get("python").unwrap().file_count, 1);
    }
}
