//! Recall against exact ground truth.

use crate::types::QueryResult;
use std::collections::HashSet;

/// Recall@k: `|top-k result ids ∩ first-k ground-truth ids| / k`.
///
/// Always in `[0, 1]`. `k == 0` is defined as 0.
#[must_use]
pub fn recall_at_k(results: &[QueryResult], ground_truth: &[String], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let hits: HashSet<&str> = results.iter().take(k).map(|r| r.id.as_str()).collect();
    let matches = ground_truth
        .iter()
        .take(k)
        .filter(|id| hits.contains(id.as_str()))
        .count();
    matches as f64 / k as f64
}

/// Recall@k with ground truth restricted to currently-live ids.
///
/// Required whenever measuring recall after deletions: dead ground-truth
/// entries are unreachable by construction and would otherwise deflate
/// the score. The denominator is the filtered list length (at most `k`),
/// and an empty filtered list is defined as recall 0.
#[must_use]
pub fn live_filtered_recall(
    results: &[QueryResult],
    ground_truth: &[String],
    is_live: impl Fn(&str) -> bool,
    k: usize,
) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let filtered: Vec<&str> = ground_truth
        .iter()
        .map(String::as_str)
        .filter(|id| is_live(id))
        .take(k)
        .collect();
    if filtered.is_empty() {
        return 0.0;
    }

    let hits: HashSet<&str> = results.iter().take(k).map(|r| r.id.as_str()).collect();
    let matches = filtered.iter().filter(|id| hits.contains(*id)).count();
    matches as f64 / filtered.len() as f64
}

/// Mean recall@k across queries. Result lists and ground-truth lists are
/// parallel sequences.
#[must_use]
pub fn mean_recall(results: &[Vec<QueryResult>], ground_truths: &[Vec<String>], k: usize) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results
        .iter()
        .zip(ground_truths.iter())
        .map(|(r, gt)| recall_at_k(r, gt, k))
        .sum();
    total / results.len() as f64
}
