use std::collections::HashSet;

use crate::domain::DomainError;

/// A ranked candidate fed into the budget optimizer (§4.11 inputs).
#[derive(Debug, Clone)]
pub struct BudgetCandidate {
    pub id: String,
    pub score: f32,
    pub token_count: u32,
    pub file: String,
    pub start_line: u32,
}

#[derive(Debug, Clone)]
pub struct BudgetParams {
    pub max_tokens: u32,
    pub system_reserve: u32,
    pub response_reserve: u32,
    pub min_score: f32,
    pub diversity_weight: f32,
}

impl Default for BudgetParams {
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

#[derive(Debug, Clone)]
pub struct BudgetSelection {
    pub selected: Vec<BudgetCandidate>,
    pub total_tokens: u32,
    pub residual: u32,
    pub files_covered: Vec<String>,
    pub average_score: f32,
}

fn available_budget(params: &BudgetParams) -> Result<i64, DomainError> {
    let budget = params.max_tokens as i64 - params.system_reserve as i64 - params.response_reserve as i64;
    if budget <= 0 {
        return Err(DomainError::BudgetInfeasible(format!(
            "available budget {budget} <= 0"
        )));
    }
    Ok(budget)
}

fn adjusted_score(
    candidate: &BudgetCandidate,
    used_files: &HashSet<String>,
    diversity_weight: f32,
) -> f32 {
    let diversity_bonus = if used_files.contains(&candidate.file) {
        0.0
    } else {
        diversity_weight
    };
    let density_bonus = 0.1 * (candidate.score / candidate.token_count.max(1) as f32);
    candidate.score + diversity_bonus + density_bonus
}

/// Greedy diversity-aware selection under a hard token budget (§4.11).
/// `B ≤ 0` surfaces as `BudgetInfeasible`, which callers should treat as a
/// valid empty-selection outcome rather than an operation failure.
pub fn optimize(
    candidates: Vec<BudgetCandidate>,
    params: &BudgetParams,
) -> Result<BudgetSelection, DomainError> {
    let budget = available_budget(params)?;
    Ok(greedy_fill(candidates, params, budget as u32))
}

/// `optimize_with_priority` (§4.11): fills priority chunks first, in score
/// order, capped at `0.6 * B` tokens, then runs the greedy loop over the
/// remainder with whatever budget is left.
pub fn optimize_with_priority(
    candidates: Vec<BudgetCandidate>,
    priority_files: &HashSet<String>,
    params: &BudgetParams,
) -> Result<BudgetSelection, DomainError> {
    let budget = available_budget(params)? as u32;
    let priority_cap = (budget as f32 * 0.6) as u32;

    let (mut priority, rest): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| priority_files.contains(&c.file));
    priority.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut selected = Vec::new();
    let mut used_tokens = 0u32;
    let mut used_files = HashSet::new();
    for candidate in priority {
        if used_tokens + candidate.token_count > priority_cap {
            continue;
        }
        used_tokens += candidate.token_count;
        used_files.insert(candidate.file.clone());
        selected.push(candidate);
    }

    let remaining_budget = budget.saturating_sub(used_tokens);
    let mut rest_selection = greedy_fill_with_state(rest, params, remaining_budget, used_files);

    selected.append(&mut rest_selection.selected);
    Ok(finalize_selection(selected, budget))
}

fn greedy_fill(candidates: Vec<BudgetCandidate>, params: &BudgetParams, budget: u32) -> BudgetSelection {
    greedy_fill_with_state(candidates, params, budget, HashSet::new())
}

fn greedy_fill_with_state(
    candidates: Vec<BudgetCandidate>,
    params: &BudgetParams,
    budget: u32,
    mut used_files: HashSet<String>,
) -> BudgetSelection {
    let mut pool: Vec<(usize, BudgetCandidate)> = candidates
        .into_iter()
        .filter(|c| c.score >= params.min_score)
        .enumerate()
        .collect();

    let mut selected = Vec::new();
    let mut remaining = budget;

    loop {
        if pool.is_empty() {
            break;
        }
        pool.sort_by(|(ia, a), (ib, b)| {
            let sa = adjusted_score(a, &used_files, params.diversity_weight);
            let sb = adjusted_score(b, &used_files, params.diversity_weight);
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        });

        let pick_idx = pool.iter().position(|(_, c)| c.token_count <= remaining);
        let Some(pick_idx) = pick_idx else {
            break;
        };
        let (_, picked) = pool.remove(pick_idx);
        remaining = remaining.saturating_sub(picked.token_count);
        used_files.insert(picked.file.clone());
        selected.push(picked);
    }

    finalize_selection(selected, budget)
}

fn finalize_selection(mut selected: Vec<BudgetCandidate>, budget: u32) -> BudgetSelection {
    selected.sort_by(|a, b| a.file.cmp(&b.file).then(a.start_line.cmp(&b.start_line)));

    let total_tokens: u32 = selected.iter().map(|c| c.token_count).sum();
    let files_covered: Vec<String> = {
        let mut files: Vec<String> = selected.iter().map(|c| c.file.clone()).collect();
        files.dedup();
        files
    };
    let average_score = if selected.is_empty() {
        0.0
    } else {
        selected.iter().map(|c| c.score).sum::<f32>() / selected.len() as f32
    };

    BudgetSelection {
        residual: budget.saturating_sub(total_tokens),
        total_tokens,
        files_covered,
        average_score,
        selected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, score: f32, tokens: u32, file: &str, line: u32) -> BudgetCandidate {
        BudgetCandidate {
            id: id.to_string(),
            score,
            token_count: tokens,
            file: file.to_string(),
            start_line: line,
        }
    }

    #[test]
    fn test_infeasible_budget_is_not_an_error_path_consumers_should_hide() {
        let params = BudgetParams {
            max_tokens: 100,
            system_reserve: 500,
            response_reserve: 2000,
            ..Default::default()
        };
        let result = optimize(vec![candidate("a", 1.0, 10, "a.rs", 1)], &params);
        assert!(matches!(result, Err(DomainError::BudgetInfeasible(_))));
    }

    #[test]
    fn test_diversity_prefers_new_files() {
        let params = BudgetParams {
            max_tokens: 3000,
            system_reserve: 0,
            response_reserve: 0,
            min_score: 0.0,
            diversity_weight: 0.3,
        };
        let candidates = vec![
            candidate("a1", 0.9, 500, "a.rs", 1),
            candidate("a2", 0.85, 500, "a.rs", 50),
            candidate("b1", 0.8, 500, "b.rs", 1),
        ];
        let selection = optimize(candidates, &params).unwrap();
        assert!(selection.files_covered.contains(&"b.rs".to_string()));
    }

    #[test]
    fn test_output_ordering_is_file_then_start_line() {
        let params = BudgetParams {
            max_tokens: 5000,
            system_reserve: 0,
            response_reserve: 0,
            min_score: 0.0,
            diversity_weight: 0.0,
        };
        let candidates = vec![
            candidate("b1", 0.9, 100, "b.rs", 10),
            candidate("a2", 0.8, 100, "a.rs", 20),
            candidate("a1", 0.85, 100, "a.rs", 5),
        ];
        let selection = optimize(candidates, &params).unwrap();
        let order: Vec<&str> = selection.selected.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn test_priority_mode_caps_at_sixty_percent() {
        let params = BudgetParams {
            max_tokens: 1000,
            system_reserve: 0,
            response_reserve: 0,
            min_score: 0.0,
            diversity_weight: 0.0,
        };
        let priority: HashSet<String> = ["p.rs".to_string()].into_iter().collect();
        let candidates = vec![
            candidate("p1", 0.5, 400, "p.rs", 1),
            candidate("p2", 0.4, 400, "p.rs", 50),
            candidate("o1", 0.99, 100, "o.rs", 1),
        ];
        let selection = optimize_with_priority(candidates, &priority, &params).unwrap();
        assert!(selection.total_tokens <= 1000);
        assert!(selection.selected.iter().any(|c| c.id == "o1"));
    }
}
