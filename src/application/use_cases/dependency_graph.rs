use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::domain::{FileRecord, Language};

/// Resolves an import source against the set of currently known files
/// (§4.5). Returns the resolved project-relative path, if any.
pub fn resolve_import(
    importer_path: &str,
    source: &str,
    language: Language,
    known_files: &HashSet<String>,
) -> Option<String> {
    let base = if let Some(stripped) = source.strip_prefix('/') {
        stripped.to_string()
    } else {
        let importer_dir = importer_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        normalize_relative(importer_dir, source)
    };

    if known_files.contains(&base) {
        return Some(base);
    }
    for ext in language.extensions() {
        let candidate = format!("{base}.{ext}");
        if known_files.contains(&candidate) {
            return Some(candidate);
        }
    }
    for ext in language.extensions() {
        let candidate = format!("{base}/index.{ext}");
        if known_files.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn normalize_relative(base_dir: &str, rel: &str) -> String {
    let mut parts: Vec<&str> = if base_dir.is_empty() {
        Vec::new()
    } else {
        base_dir.split('/').collect()
    };
    for segment in rel.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Forward and reverse import graphs over a file set (§4.5, §3).
/// Deterministically ordered so assigning straight into `ProjectIndex`
/// fields keeps repeated snapshots of an unchanged graph byte-identical.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub deps: BTreeMap<String, BTreeSet<String>>,
    pub dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Rebuilds both indices from scratch over `files` (§4.5 "Rebuild").
    /// Cheap and linear in edges; called after every batch update.
    pub fn rebuild(files: &BTreeMap<String, FileRecord>) -> Self {
        let known: HashSet<String> = files.keys().cloned().collect();
        let mut deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (path, record) in files {
            let mut edges = BTreeSet::new();
            for source in record.relative_import_sources() {
                if let Some(target) = resolve_import(path, source, record.language_tag(), &known) {
                    if target != *path {
                        edges.insert(target.clone());
                        dependents.entry(target).or_default().insert(path.clone());
                    }
                }
            }
            deps.insert(path.clone(), edges);
        }

        for path in files.keys() {
            dependents.entry(path.clone()).or_default();
        }

        Self { deps, dependents }
    }

    /// Transitive closure of `dependents` over `changed`, via BFS with a
    /// visited set (§4.5 "Invalidation"). Cycle-safe: a file already
    /// visited is never requeued.
    pub fn invalidated(&self, changed: &HashSet<String>) -> HashSet<String> {
        let mut visited: HashSet<String> = changed.clone();
        let mut queue: VecDeque<String> = changed.iter().cloned().collect();

        while let Some(path) = queue.pop_front() {
            if let Some(dependents) = self.dependents.get(&path) {
                for dependent in dependents {
                    if visited.insert(dependent.clone()) {
                        queue.push_back(dependent.clone());
                    }
                }
            }
        }

        visited
    }

    pub fn deps_of(&self, path: &str) -> Option<&BTreeSet<String>> {
        self.deps.get(path)
    }

    pub fn dependents_of(&self, path: &str) -> Option<&BTreeSet<String>> {
        self.dependents.get(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ImportRef;

    fn record_with_import(path: &str, import_source: &str) -> FileRecord {
        let mut parsed = crate::domain::ParseResult::default();
        parsed.imports.push(ImportRef::classify(import_source));
        FileRecord::from_parse(path, "h", 0, 0, Language::Rust, parsed)
    }

    #[test]
    fn test_resolve_relative_import_with_extension() {
        let known: HashSet<String> = ["src/lib.rs".to_string(), "src/util.rs".to_string()]
            .into_iter()
            .collect();
        let resolved = resolve_import("src/lib.rs", "./util", Language::Rust, &known);
        assert_eq!(resolved, Some("src/util.rs".to_string()));
    }

    #[test]
    fn test_resolve_parent_relative_import() {
        let known: HashSet<String> = ["a/b.rs".to_string()].into_iter().collect();
        let resolved = resolve_import("a/sub/c.rs", "../b", Language::Rust, &known);
        assert_eq!(resolved, Some("a/b.rs".to_string()));
    }

    #[test]
    fn test_external_import_never_resolves() {
        let known: HashSet<String> = ["src/lib.rs".to_string()].into_iter().collect();
        let resolved = resolve_import("src/lib.rs", "serde", Language::Rust, &known);
        assert_eq!(resolved, None);
    }

    #[test]
    fn test_rebuild_produces_matching_forward_and_reverse_edges() {
        let mut files = BTreeMap::new();
        files.insert("a.rs".to_string(), record_with_import("a.rs", "./b"));
        files.insert(
            "b.rs".to_string(),
            FileRecord::new("b.rs", "h", 0, 0, Language::Rust),
        );
        let graph = DependencyGraph::rebuild(&files);
        assert!(graph.deps_of("a.rs").unwrap().contains("b.rs"));
        assert!(graph.dependents_of("b.rs").unwrap().contains("a.rs"));
    }

    #[test]
    fn test_invalidation_is_transitive_and_cycle_safe() {
        let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        dependents.insert("a".to_string(), ["b".to_string()].into_iter().collect());
        dependents.insert("b".to_string(), ["c".to_string()].into_iter().collect());
        dependents.insert("c".to_string(), ["a".to_string()].into_iter().collect());
        let graph = DependencyGraph {
            deps: BTreeMap::new(),
            dependents,
        };
        let changed: HashSet<String> = ["a".to_string()].into_iter().collect();
        let affected = graph.invalidated(&changed);
        assert_eq!(affected.len(), 3);
    }
}
