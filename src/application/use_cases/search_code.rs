use std::collections::HashSet;
use std::time::Instant;

use tracing::info;

use crate::application::use_cases::bm25_index::Bm25Index;
use crate::application::use_cases::budget_optimizer::{
    optimize, optimize_with_priority, BudgetCandidate, BudgetParams, BudgetSelection,
};
use crate::application::use_cases::hybrid_retriever::HybridRetriever;
use crate::application::use_cases::incremental_indexer::IncrementalIndexer;
use crate::domain::{DomainError, ProjectIndex, SearchQuery, SearchResult};

pub struct SearchCodeUseCase {
    retriever: HybridRetriever,
    budget: BudgetParams,
}

impl SearchCodeUseCase {
    pub fn new(retriever: HybridRetriever, budget: BudgetParams) -> Self {
        Self { retriever, budget }
    }

    /// Runs the hybrid retriever, then caps the ranked output to the
    /// caller's token budget (§4.10 -> §4.11).
    pub async fn execute(
        &self,
        index: &ProjectIndex,
        bm25: &Bm25Index,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let start = Instant::now();
        let chunks = IncrementalIndexer::all_chunks(index);

        let mut results = self
            .retriever
            .search(query.query(), query.limit() * 4, bm25, &chunks, None)
            .await?;

        if let Some(langs) = query.languages() {
            let wanted: HashSet<&str> = langs.iter().map(|s| s.as_str()).collect();
            results.retain(|r| wanted.contains(r.chunk().language_tag().as_str()));
        }
        if let Some(min_score) = query.min_score() {
            results.retain(|r| r.score() >= min_score);
        }
        results.truncate(query.limit());

        info!(
            "search \"{}\" returned {} results in {:.3}s",
            query.query(),
            results.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(results)
    }

    /// Caps a ranked result set to a token budget, for callers assembling
    /// an LLM context window (C11).
    pub fn apply_budget(&self, results: &[SearchResult]) -> Result<BudgetSelection, DomainError> {
        let candidates: Vec<BudgetCandidate> = results
            .iter()
            .map(|r| BudgetCandidate {
                id: r.chunk().id().to_string(),
                score: r.score(),
                token_count: r.chunk().token_count(),
                file: r.chunk().file().to_string(),
                start_line: r.chunk().start_line(),
            })
            .collect();
        optimize(candidates, &self.budget)
    }

    pub fn apply_budget_with_priority(
        &self,
        results: &[SearchResult],
        priority_files: &HashSet<String>,
    ) -> Result<BudgetSelection, DomainError> {
        let candidates: Vec<BudgetCandidate> = results
            .iter()
            .map(|r| BudgetCandidate {
                id: r.chunk().id().to_string(),
                score: r.score(),
                token_count: r.chunk().token_count(),
                file: r.chunk().file().to_string(),
                start_line: r.chunk().start_line(),
            })
            .collect();
        optimize_with_priority(candidates, priority_files, &self.budget)
    }
}
