use std::collections::HashMap;

use crate::domain::{Chunk, SearchResult};

/// Smoothing constant for Reciprocal Rank Fusion (§4.10 default `K=60`).
pub const RRF_K: f32 = 60.0;
pub const DEFAULT_WEIGHT_SPARSE: f32 = 0.4;
pub const DEFAULT_WEIGHT_DENSE: f32 = 0.6;

struct Accum {
    chunk: Chunk,
    sparse_score: Option<f32>,
    dense_score: Option<f32>,
    rrf: f32,
    /// Position of first appearance across sparse (processed first) then
    /// dense, used to break rrf-score ties deterministically (§4.10: "tie
    /// broken by first-seen list, original rank").
    first_seen: usize,
}

/// Weighted Reciprocal Rank Fusion over two ranked legs (§4.10 step 3):
/// `rrf(d) = Σᵢ wᵢ / (K + rankᵢ(d) + 1)`, ranks 0-based. A chunk missing
/// from a leg contributes 0 for that leg. Component scores are preserved
/// on the returned `SearchResult` for callers that want to inspect them.
///
/// Accumulation preserves first-seen order explicitly (a `Vec` plus an
/// id→index map) rather than relying on `HashMap` iteration order, so
/// score ties resolve the same way on every call.
#[allow(clippy::too_many_arguments)]
pub fn rrf_fuse(
    sparse: Vec<(Chunk, f32)>,
    dense: Vec<(Chunk, f32)>,
    k: f32,
    weight_sparse: f32,
    weight_dense: f32,
    min_score: f32,
    limit: usize,
) -> Vec<SearchResult> {
    let mut accum: Vec<Accum> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();

    for (rank, (chunk, score)) in sparse.into_iter().enumerate() {
        let contribution = weight_sparse / (k + rank as f32 + 1.0);
        let id = chunk.id().to_string();
        if let Some(&idx) = index_of.get(&id) {
            let a = &mut accum[idx];
            a.sparse_score = Some(score);
            a.rrf += contribution;
        } else {
            let first_seen = accum.len();
            index_of.insert(id, first_seen);
            accum.push(Accum {
                chunk,
                sparse_score: Some(score),
                dense_score: None,
                rrf: contribution,
                first_seen,
            });
        }
    }

    for (rank, (chunk, score)) in dense.into_iter().enumerate() {
        let contribution = weight_dense / (k + rank as f32 + 1.0);
        let id = chunk.id().to_string();
        if let Some(&idx) = index_of.get(&id) {
            let a = &mut accum[idx];
            a.dense_score = Some(score);
            a.rrf += contribution;
        } else {
            let first_seen = accum.len();
            index_of.insert(id, first_seen);
            accum.push(Accum {
                chunk,
                sparse_score: None,
                dense_score: Some(score),
                rrf: contribution,
                first_seen,
            });
        }
    }

    let mut fused: Vec<Accum> = accum.into_iter().filter(|a| a.rrf >= min_score).collect();
    fused.sort_by(|a, b| {
        b.rrf
            .partial_cmp(&a.rrf)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    });

    fused
        .into_iter()
        .take(limit)
        .map(|a| {
            SearchResult::new(a.chunk, a.rrf).with_component_scores(a.sparse_score, a.dense_score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Language;

    fn chunk(id: &str) -> Chunk {
        Chunk::new(
            id.to_string(),
            1,
            1,
            "fn f() {}".to_string(),
            Language::Rust,
            None,
            0,
        )
    }

    #[test]
    fn test_fusion_combines_ranks_from_both_legs() {
        let sparse = vec![(chunk("a"), 5.0), (chunk("b"), 3.0)];
        let dense = vec![(chunk("b"), 0.9), (chunk("a"), 0.7)];
        let fused = rrf_fuse(
            sparse,
            dense,
            RRF_K,
            DEFAULT_WEIGHT_SPARSE,
            DEFAULT_WEIGHT_DENSE,
            0.0,
            10,
        );
        assert_eq!(fused.len(), 2);
        for r in &fused {
            assert!(r.sparse_score().is_some());
            assert!(r.dense_score().is_some());
        }
    }

    #[test]
    fn test_sparse_only_leg_degrades_gracefully() {
        let sparse = vec![(chunk("a"), 5.0)];
        let fused = rrf_fuse(
            sparse,
            Vec::new(),
            RRF_K,
            DEFAULT_WEIGHT_SPARSE,
            DEFAULT_WEIGHT_DENSE,
            0.0,
            10,
        );
        assert_eq!(fused.len(), 1);
        assert!(fused[0].dense_score().is_none());
    }

    #[test]
    fn test_min_score_filters_low_fusion_scores() {
        let sparse = vec![(chunk("a"), 1.0)];
        let fused = rrf_fuse(
            sparse,
            Vec::new(),
            RRF_K,
            DEFAULT_WEIGHT_SPARSE,
            DEFAULT_WEIGHT_DENSE,
            1.0,
            10,
        );
        assert!(fused.is_empty());
    }
}
