use serde::{Deserialize, Serialize};

use super::Chunk;

/// A single ranked hit from a search, carrying both the sparse (BM25) and
/// dense component scores that fed the RRF fusion, per §4.10's "both
/// component scores preserved" requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    chunk: Chunk,
    score: f32,
    sparse_score: Option<f32>,
    dense_score: Option<f32>,
    highlights: Option<Vec<String>>,
}

impl SearchResult {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            sparse_score: None,
            dense_score: None,
            highlights: None,
        }
    }

    pub fn with_component_scores(mut self, sparse: Option<f32>, dense: Option<f32>) -> Self {
        self.sparse_score = sparse;
        self.dense_score = dense;
        self
    }

    pub fn with_highlights(mut self, highlights: Vec<String>) -> Self {
        self.highlights = Some(highlights);
        self
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn sparse_score(&self) -> Option<f32> {
        self.sparse_score
    }

    pub fn dense_score(&self) -> Option<f32> {
        self.dense_score
    }

    pub fn highlights(&self) -> Option<&[String]> {
        self.highlights.as_deref()
    }

    pub fn is_relevant(&self, threshold: f32) -> bool {
        self.score >= threshold
    }

    pub fn has_highlights(&self) -> bool {
        self.highlights.as_ref().is_some_and(|h| !h.is_empty())
    }

    pub fn display_line(&self) -> String {
        format!("{} (score: {:.3})", self.chunk.location(), self.score)
    }
}

/// A caller-facing search request (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    query: String,
    limit: usize,
    min_score: Option<f32>,
    languages: Option<Vec<String>>,
    symbol_kinds: Option<Vec<String>>,
    hybrid: bool,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 10,
            min_score: None,
            languages: None,
            symbol_kinds: None,
            hybrid: true,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_min_score(mut self, score: f32) -> Self {
        self.min_score = Some(score);
        self
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = Some(languages);
        self
    }

    pub fn with_symbol_kinds(mut self, kinds: Vec<String>) -> Self {
        self.symbol_kinds = Some(kinds);
        self
    }

    pub fn with_hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn min_score(&self) -> Option<f32> {
        self.min_score
    }

    pub fn languages(&self) -> Option<&[String]> {
        self.languages.as_deref()
    }

    pub fn symbol_kinds(&self) -> Option<&[String]> {
        self.symbol_kinds.as_deref()
    }

    pub fn is_hybrid(&self) -> bool {
        self.hybrid
    }

    pub fn has_filters(&self) -> bool {
        self.languages.is_some() || self.symbol_kinds.is_some()
    }

    pub fn filters_by_language(&self, language: &str) -> bool {
        self.languages
            .as_ref()
            .is_some_and(|langs| langs.iter().any(|l| l == language))
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("query=\"{}\"", self.query)];
        parts.push(format!("limit={}", self.limit));

        if let Some(score) = self.min_score {
            parts.push(format!("min_score={:.2}", score));
        }
        if let Some(ref langs) = self.languages {
            parts.push(format!("languages={:?}", langs));
        }
        if let Some(ref kinds) = self.symbol_kinds {
            parts.push(format!("symbol_kinds={:?}", kinds));
        }

        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Language;

    fn sample_chunk() -> Chunk {
        Chunk::new(
            "test.rs".to_string(),
            1,
            1,
            "fn test() {}".to_string(),
            Language::Rust,
            Some("test".to_string()),
            0,
        )
    }

    #[test]
    fn test_search_result_creation() {
        let chunk = sample_chunk();
        let result = SearchResult::new(chunk, 0.95);

        assert_eq!(result.score(), 0.95);
        assert!(result.is_relevant(0.5));
        assert!(!result.is_relevant(0.99));
    }

    #[test]
    fn test_search_result_carries_component_scores() {
        let result = SearchResult::new(sample_chunk(), 0.8)
            .with_component_scores(Some(0.5), Some(0.9));
        assert_eq!(result.sparse_score(), Some(0.5));
        assert_eq!(result.dense_score(), Some(0.9));
    }

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new("find functions")
            .with_limit(20)
            .with_min_score(0.7)
            .with_languages(vec!["rust".to_string()]);

        assert_eq!(query.query(), "find functions");
        assert_eq!(query.limit(), 20);
        assert_eq!(query.min_score(), Some(0.7));
        assert!(query.has_filters());
    }

    #[test]
    fn test_query_filters() {
        let query =
            SearchQuery::new("test").with_languages(vec!["rust".to_string(), "python".to_string()]);

        assert!(query.filters_by_language("rust"));
        assert!(!query.filters_by_language("go"));
    }
}
