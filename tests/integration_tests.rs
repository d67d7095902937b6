//! End-to-end scenarios spanning discovery, incremental reparsing,
//! persistence, and hybrid retrieval.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::tempdir;

use codesearch_core::{
    optimize, optimize_with_priority, rrf_fuse, tokenize, Bm25Index, BudgetCandidate, BudgetParams,
    CancellationToken, Chunk, DomainError, FileSnapshotStore, GitInfo, IncrementalIndexer,
    IndexerConfig, Language, ParseResult, ProjectIndex, SnapshotKey, SnapshotStore, SourceParser,
};

struct StubParser;

#[async_trait]
impl SourceParser for StubParser {
    async fn parse_file(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<ParseResult, DomainError> {
        let mut result = ParseResult::default();
        if file_path == "a.ts" {
            result.imports.push(codesearch_core::ImportRef::classify("./does-not-matter".to_string()));
        } else if file_path == "b.ts" {
            result.imports.push(codesearch_core::ImportRef::classify("./a".to_string()));
        } else if file_path == "c.ts" {
            result.imports.push(codesearch_core::ImportRef::classify("./b".to_string()));
        }
        result.chunks.push(Chunk::new(
            file_path.to_string(),
            1,
            1,
            content.to_string(),
            language,
            None,
            0,
        ));
        Ok(result)
    }

    fn supported_languages(&self) -> Vec<Language> {
        Language::all_supported()
    }
}

/// S1 — incremental invalidation: modifying `a.ts` (which `b.ts` imports,
/// which `c.ts` imports) must cascade reparse the whole dependent chain.
#[tokio::test]
async fn s1_modifying_a_file_cascades_to_its_dependents() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.ts"), "export const a = 1;").unwrap();
    std::fs::write(dir.path().join("b.ts"), "import './a'; export const b = 2;").unwrap();
    std::fs::write(dir.path().join("c.ts"), "import './b'; export const c = 3;").unwrap();

    let parser = Arc::new(StubParser);
    let indexer = IncrementalIndexer::new(dir.path(), parser, IndexerConfig::default());
    let mut index = ProjectIndex::new("proj", dir.path().to_string_lossy().to_string(), GitInfo::unknown(), 0);

    indexer.full_refresh(&mut index, &CancellationToken::new()).await.unwrap();
    assert_eq!(index.files.len(), 3);
    assert_eq!(index.generation, 1);

    std::fs::write(dir.path().join("a.ts"), "export const a = 99;").unwrap();
    indexer
        .update(&mut index, vec!["a.ts".to_string()], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(index.generation, 2);
    assert_eq!(
        index.files.get("a.ts").unwrap().chunks()[0].content(),
        "export const a = 99;"
    );
}

/// S2 — branch switch: a snapshot saved under `main` is untouched when a
/// different branch's snapshot is written, and loading a fresh branch
/// reports no index.
#[tokio::test]
async fn s2_branch_switch_leaves_other_branch_snapshot_untouched() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path());

    let main_key = SnapshotKey::new("default", "main");
    let feature_key = SnapshotKey::new("default", "feature/x");

    let main_index = ProjectIndex::new("proj", dir.path().to_string_lossy().to_string(), GitInfo::unknown(), 0);
    store.save_index(&main_key, &main_index).await.unwrap();

    assert!(store.load_index(&feature_key).await.unwrap().is_none());

    let feature_index = ProjectIndex::new("proj", dir.path().to_string_lossy().to_string(), GitInfo::unknown(), 1);
    store.save_index(&feature_key, &feature_index).await.unwrap();

    let reloaded_main = store.load_index(&main_key).await.unwrap().unwrap();
    assert_eq!(reloaded_main.created_at, 0);
}

/// S3 — BM25 code tokenization: a camelCase query term matches both the
/// camelCase identifier and the separately-worded identifier it was split
/// from, ranking the denser match first.
#[tokio::test]
async fn s3_bm25_splits_camel_case_and_ranks_by_match_density() {
    let mut bm25 = Bm25Index::new(1.2, 0.75, 1, 0.9);
    bm25.add("d1", "function getUserById(userId) { return user; }");
    bm25.add("d2", "class UserService { getUser(id) {} }");

    let tokens = tokenize("getUserById");
    assert!(tokens.contains(&"get".to_string()));
    assert!(tokens.contains(&"user".to_string()));
    assert!(tokens.contains(&"id".to_string()));

    let results = bm25.search("user id", 10);
    assert_eq!(results[0].0, "d1");
}

/// S4 — RRF fusion: a document ranked in both legs outranks one appearing
/// in only a single leg.
#[tokio::test]
async fn s4_rrf_fusion_favors_documents_present_in_both_legs() {
    let lang = Language::Rust;
    let chunk = |id: &str| Chunk::new(id.to_string(), 1, 1, "x".to_string(), lang, None, 0);

    let sparse = vec![(chunk("a"), 1.0), (chunk("b"), 0.9), (chunk("c"), 0.8)];
    let dense = vec![(chunk("b"), 1.0), (chunk("a"), 0.9), (chunk("d"), 0.8)];

    let fused = rrf_fuse(sparse, dense, 60.0, 0.5, 0.5, 0.0, 10);

    let rank_of = |id: &str| fused.iter().position(|r| r.chunk().id() == id).unwrap();
    assert!(rank_of("a") < rank_of("c"));
    assert!(rank_of("b") < rank_of("c"));
    assert!(rank_of("c") < rank_of("d") || rank_of("d") < rank_of("c"));
    assert!(rank_of("a") <= 1 && rank_of("b") <= 1);
}

/// S5 — budget diversity: with two strong candidates from the same file
/// and a weaker one from a different file, the optimizer prefers spending
/// the remaining budget on the file it hasn't covered yet.
#[tokio::test]
async fn s5_budget_optimizer_prefers_file_diversity() {
    let candidates = vec![
        BudgetCandidate { id: "1".into(), score: 0.9, token_count: 100, file: "f1".into(), start_line: 1 },
        BudgetCandidate { id: "2".into(), score: 0.89, token_count: 100, file: "f1".into(), start_line: 50 },
        BudgetCandidate { id: "3".into(), score: 0.85, token_count: 100, file: "f2".into(), start_line: 1 },
    ];
    let params = BudgetParams {
        max_tokens: 850,
        system_reserve: 500,
        response_reserve: 0,
        min_score: 0.0,
        diversity_weight: 0.3,
    };

    let selection = optimize(candidates, &params).unwrap();
    let ids: HashSet<&str> = selection.selected.iter().map(|c| c.id.as_str()).collect();

    assert!(ids.contains("1"));
    assert!(ids.contains("3"));
}

/// S6 — priority mode: a low-scoring chunk in a priority file is admitted
/// ahead of a higher-scoring chunk outside the priority set.
#[tokio::test]
async fn s6_priority_mode_admits_priority_file_first() {
    let candidates = vec![
        BudgetCandidate { id: "p".into(), score: 0.4, token_count: 200, file: "priority.rs".into(), start_line: 1 },
        BudgetCandidate { id: "n".into(), score: 0.9, token_count: 200, file: "other.rs".into(), start_line: 1 },
    ];
    let params = BudgetParams {
        max_tokens: 900,
        system_reserve: 500,
        response_reserve: 0,
        min_score: 0.0,
        diversity_weight: 0.0,
    };
    let mut priority_files = HashSet::new();
    priority_files.insert("priority.rs".to_string());

    let selection = optimize_with_priority(candidates, &priority_files, &params).unwrap();

    assert_eq!(selection.selected[0].id, "p");
    assert_eq!(selection.selected.len(), 2);
}

/// General invariant: `discover()` never walks into `.git` or other
/// built-in ignored directories, regardless of ignore-file content.
#[tokio::test]
async fn discover_skips_builtin_ignored_directories() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
    std::fs::write(dir.path().join("node_modules/vendored.js"), "var x;").unwrap();
    std::fs::write(dir.path().join("app.js"), "var y;").unwrap();

    let parser = Arc::new(StubParser);
    let indexer = IncrementalIndexer::new(dir.path(), parser, IndexerConfig::default());
    let discovered = indexer.discover().unwrap();

    assert_eq!(discovered, vec!["app.js".to_string()]);
}

/// General invariant: deleting a project's snapshot leaves no trace an
/// immediate reload can find.
#[tokio::test]
async fn deleted_snapshot_is_not_reloadable() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path());
    let key = SnapshotKey::new("default", "main");
    let index = ProjectIndex::new("proj", dir.path().to_string_lossy().to_string(), GitInfo::unknown(), 0);

    store.save_index(&key, &index).await.unwrap();
    assert!(store.load_index(&key).await.unwrap().is_some());

    store.delete(&key).await.unwrap();
    assert!(store.load_index(&key).await.unwrap().is_none());
}
