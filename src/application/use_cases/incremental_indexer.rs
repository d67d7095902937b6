use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::application::cancellation::CancellationToken;
use crate::application::interfaces::SourceParser;
use crate::application::use_cases::dependency_graph::DependencyGraph;
use crate::domain::{
    compute_file_hash, DomainError, FileRecord, GitInfo, Language, ProjectIndex,
};

/// Directory names never walked into, layered in ahead of any ignore file
/// (§4.1 "built-in defaults").
const BUILTIN_IGNORED_DIRS: &[&str] = &[
    ".git", ".uce", ".context", "node_modules", "target", "dist", "build", "vendor", ".venv",
];

const BUILTIN_IGNORED_GLOBS: &[&str] = &["*.lock", "*.min.js", "*.min.css"];

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub max_file_size: u64,
    pub worker_pool_size: usize,
    pub extra_ignore_patterns: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            worker_pool_size: 50,
            extra_ignore_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Added,
    Modified,
}

/// Orchestrates C1-C5 across full and partial refresh cycles (C6, §4.6).
pub struct IncrementalIndexer {
    root: PathBuf,
    parser: Arc<dyn SourceParser>,
    config: IndexerConfig,
}

impl IncrementalIndexer {
    pub fn new(root: impl Into<PathBuf>, parser: Arc<dyn SourceParser>, config: IndexerConfig) -> Self {
        Self {
            root: root.into(),
            parser,
            config,
        }
    }

    /// `discover(root)` (C1): walks the tree applying the layered ignore
    /// filter, admits files whose extension a known language claims, whose
    /// size is within `maxFileSize`, and emits project-relative,
    /// forward-slash paths.
    pub fn discover(&self) -> Result<Vec<String>, DomainError> {
        let mut overrides = OverrideBuilder::new(&self.root);
        for glob in BUILTIN_IGNORED_GLOBS {
            overrides
                .add(&format!("!{glob}"))
                .map_err(|e| DomainError::invalid_input(format!("bad ignore glob: {e}")))?;
        }
        for pattern in &self.config.extra_ignore_patterns {
            overrides
                .add(pattern)
                .map_err(|e| DomainError::invalid_input(format!("bad ignore pattern: {pattern}: {e}")))?;
        }
        let overrides = overrides
            .build()
            .map_err(|e| DomainError::internal(format!("failed to build overrides: {e}")))?;

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .overrides(overrides)
            .add_custom_ignore_filename(".contextignore")
            .add_custom_ignore_filename(".uceignore")
            .filter_entry(|entry| {
                if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    let name = entry.file_name().to_string_lossy();
                    return !BUILTIN_IGNORED_DIRS.contains(&name.as_ref());
                }
                true
            });

        let mut paths = Vec::new();
        for entry in builder.build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("error walking directory: {}", e);
                    continue;
                }
            };
            if !entry.path().is_file() {
                continue;
            }
            let language = Language::from_path(entry.path());
            if !language.is_known() {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.len() > self.config.max_file_size {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            paths.push(relative);
        }
        paths.sort();
        Ok(paths)
    }

    /// `full_refresh()` (§4.6): discover, diff against `files`, drop
    /// removed, reparse added/modified, extend with dependents, rebuild
    /// graph, update stats, bump generation.
    ///
    /// Everything runs against a working copy of `files` staged off of
    /// `index`; nothing is written back to `index` until a final
    /// cancellation check passes, so a cancelled refresh leaves `index`
    /// byte-for-byte as it was at entry (§4.6 "On cancellation").
    pub async fn full_refresh(
        &self,
        index: &mut ProjectIndex,
        cancel: &CancellationToken,
    ) -> Result<(), DomainError> {
        let start = Instant::now();
        let discovered = self.discover()?;
        let discovered_set: HashSet<String> = discovered.iter().cloned().collect();

        let mut added = Vec::new();
        let mut modified = Vec::new();
        for path in &discovered {
            match index.files.get(path) {
                None => added.push(path.clone()),
                Some(existing) => {
                    let content = tokio::fs::read(self.root.join(path))
                        .await
                        .unwrap_or_default();
                    if compute_file_hash(&content) != existing.hash() {
                        modified.push(path.clone());
                    }
                }
            }
        }

        let removed: Vec<String> = index
            .files
            .keys()
            .filter(|p| !discovered_set.contains(*p))
            .cloned()
            .collect();

        info!(
            "full refresh: {} added, {} modified, {} removed, {} cached",
            added.len(),
            modified.len(),
            removed.len(),
            discovered.len() - added.len() - modified.len()
        );

        let mut working = index.files.clone();
        for path in &removed {
            working.remove(path);
        }

        self.reparse_and_cascade(&mut working, added, modified, cancel).await?;
        self.commit(index, working, cancel)?;
        info!("full refresh completed in {:.2}s", start.elapsed().as_secs_f64());
        Ok(())
    }

    /// `update(paths)` (§4.6): targeted reparse of the given paths plus
    /// their dependents. Same staged-commit discipline as `full_refresh`.
    pub async fn update(
        &self,
        index: &mut ProjectIndex,
        paths: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<(), DomainError> {
        let (added, modified): (Vec<String>, Vec<String>) =
            paths.into_iter().partition(|p| !index.files.contains_key(p));
        let mut working = index.files.clone();
        self.reparse_and_cascade(&mut working, added, modified, cancel).await?;
        self.commit(index, working, cancel)?;
        Ok(())
    }

    /// Rebuilds the dependency graph over the staged `working` file map and
    /// commits it into `index` together with refreshed stats and a bumped
    /// generation - but only if `cancel` has not fired. On cancellation,
    /// `index` is returned untouched and `working` (with its partially
    /// merged records) is simply dropped.
    fn commit(
        &self,
        index: &mut ProjectIndex,
        working: BTreeMap<String, FileRecord>,
        cancel: &CancellationToken,
    ) -> Result<(), DomainError> {
        cancel.check()?;
        let graph = DependencyGraph::rebuild(&working);
        index.files = working;
        index.deps = graph.deps;
        index.dependents = graph.dependents;
        index.refresh_stats();
        index.touch(now());
        Ok(())
    }

    async fn reparse_and_cascade(
        &self,
        files: &mut BTreeMap<String, FileRecord>,
        added: Vec<String>,
        modified: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<(), DomainError> {
        let mut changed: HashSet<String> = HashSet::new();
        changed.extend(added.iter().cloned());
        changed.extend(modified.iter().cloned());

        let to_parse: Vec<(String, ChangeKind)> = added
            .into_iter()
            .map(|p| (p, ChangeKind::Added))
            .chain(modified.into_iter().map(|p| (p, ChangeKind::Modified)))
            .collect();

        // First pass parse, then expand with dependents of modified files
        // and reparse those too (§4.6 "extend with dependents of modified").
        self.parse_batch(files, &to_parse, cancel).await?;
        let graph = DependencyGraph::rebuild(files);
        let dependent_expansion = graph.invalidated(&changed);
        let extra: Vec<(String, ChangeKind)> = dependent_expansion
            .into_iter()
            .filter(|p| !changed.contains(p) && files.contains_key(p))
            .map(|p| (p, ChangeKind::Modified))
            .collect();

        if !extra.is_empty() {
            debug!("cascading reparse to {} dependent files", extra.len());
            self.parse_batch(files, &extra, cancel).await?;
        }

        Ok(())
    }

    /// Parses `batch` against a bounded worker pool and merges the results
    /// into `files`. Cancellation is checked before every spawn and, again,
    /// after every task has been awaited: a request that arrives while
    /// workers are in flight is caught before any of their output is
    /// merged, so no partially-merged record ever reaches `files`.
    async fn parse_batch(
        &self,
        files: &mut BTreeMap<String, FileRecord>,
        batch: &[(String, ChangeKind)],
        cancel: &CancellationToken,
    ) -> Result<usize, DomainError> {
        let progress = ProgressBar::new(batch.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {bar:40.green/dim} {pos}/{len} {msg:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━━─"),
        );

        let semaphore = Arc::new(Semaphore::new(self.config.worker_pool_size.max(1)));
        let mut handles = Vec::with_capacity(batch.len());

        for (path, _) in batch {
            cancel.check()?;
            let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                DomainError::internal(format!("worker pool semaphore closed: {e}"))
            })?;
            let parser = self.parser.clone();
            let full_path = self.root.join(path);
            let relative = path.clone();
            let language = Language::from_path(Path::new(path));

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = parse_one(&parser, &full_path, &relative, language).await;
                (relative, result)
            }));
        }

        let mut staged = Vec::with_capacity(handles.len());
        for handle in handles {
            progress.inc(1);
            let (relative, result) = handle
                .await
                .map_err(|e| DomainError::internal(format!("parse worker panicked: {e}")))?;
            match result {
                Ok(record) => staged.push((relative, record)),
                Err(e) => warn!("skipping {}: {}", relative, e),
            }
        }
        progress.finish_and_clear();

        cancel.check()?;
        let parsed_count = staged.len();
        for (relative, record) in staged {
            files.insert(relative, record);
        }
        Ok(parsed_count)
    }

    /// True when the git branch recorded in `index` no longer matches the
    /// working tree's current branch (§4.6 "Branch invalidation").
    pub fn branch_changed(index: &ProjectIndex, current: &GitInfo) -> bool {
        index.git.branch != current.branch
    }

    pub fn symbols_in<'a>(index: &'a ProjectIndex, path: &str) -> Option<&'a [crate::domain::Symbol]> {
        index.files.get(path).map(|r| r.symbols())
    }

    pub fn chunks_in<'a>(index: &'a ProjectIndex, path: &str) -> Option<&'a [crate::domain::Chunk]> {
        index.files.get(path).map(|r| r.chunks())
    }

    pub fn all_chunks(index: &ProjectIndex) -> HashMap<String, crate::domain::Chunk> {
        index
            .files
            .values()
            .flat_map(|record| record.chunks().iter().map(|c| (c.id().to_string(), c.clone())))
            .collect()
    }
}

async fn parse_one(
    parser: &Arc<dyn SourceParser>,
    full_path: &Path,
    relative_path: &str,
    language: Language,
) -> Result<FileRecord, DomainError> {
    let bytes = tokio::fs::read(full_path).await?;
    let metadata = tokio::fs::metadata(full_path).await?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let hash = compute_file_hash(&bytes);
    let content = String::from_utf8_lossy(&bytes).to_string();

    let parsed = parser.parse_file(&content, relative_path, language).await?;
    Ok(FileRecord::from_parse(
        relative_path,
        hash,
        mtime,
        bytes.len() as u64,
        language,
        parsed,
    ))
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ParseResult;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct StubParser {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SourceParser for StubParser {
        async fn parse_file(
            &self,
            _content: &str,
            file_path: &str,
            _language: Language,
        ) -> Result<ParseResult, DomainError> {
            self.calls.lock().unwrap().push(file_path.to_string());
            Ok(ParseResult::default())
        }

        fn supported_languages(&self) -> Vec<Language> {
            Language::all_supported()
        }
    }

    #[tokio::test]
    async fn test_full_refresh_discovers_and_parses_new_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        std::fs::write(dir.path().join("b.py"), "def b(): pass").unwrap();

        let parser = Arc::new(StubParser {
            calls: Mutex::new(Vec::new()),
        });
        let indexer = IncrementalIndexer::new(dir.path(), parser.clone(), IndexerConfig::default());
        let mut index = ProjectIndex::new("proj", dir.path().to_string_lossy(), GitInfo::unknown(), 0);

        indexer
            .full_refresh(&mut index, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(index.files.len(), 2);
        assert_eq!(index.generation, 1);
    }

    #[tokio::test]
    async fn test_full_refresh_skips_ignored_dirs() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/x.js"), "var x = 1;").unwrap();
        std::fs::write(dir.path().join("keep.js"), "var y = 2;").unwrap();

        let parser = Arc::new(StubParser {
            calls: Mutex::new(Vec::new()),
        });
        let indexer = IncrementalIndexer::new(dir.path(), parser, IndexerConfig::default());
        let discovered = indexer.discover().unwrap();

        assert_eq!(discovered, vec!["keep.js".to_string()]);
    }

    #[tokio::test]
    async fn test_removed_file_drops_from_index() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a.rs");
        std::fs::write(&file_path, "fn a() {}").unwrap();

        let parser = Arc::new(StubParser {
            calls: Mutex::new(Vec::new()),
        });
        let indexer = IncrementalIndexer::new(dir.path(), parser, IndexerConfig::default());
        let mut index = ProjectIndex::new("proj", dir.path().to_string_lossy(), GitInfo::unknown(), 0);
        indexer
            .full_refresh(&mut index, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(index.files.len(), 1);

        std::fs::remove_file(&file_path).unwrap();
        indexer
            .full_refresh(&mut index, &CancellationToken::new())
            .await
            .unwrap();
        assert!(index.files.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_refresh_leaves_index_untouched() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();

        let parser = Arc::new(StubParser {
            calls: Mutex::new(Vec::new()),
        });
        let indexer = IncrementalIndexer::new(dir.path(), parser, IndexerConfig::default());
        let mut index = ProjectIndex::new("proj", dir.path().to_string_lossy(), GitInfo::unknown(), 0);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = indexer.full_refresh(&mut index, &cancel).await;

        assert!(matches!(result, Err(DomainError::CancelRequested)));
        assert!(index.files.is_empty());
        assert_eq!(index.generation, 0);
    }
}
