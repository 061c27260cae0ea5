//! Batch aggregation over an ordered list of texts.
//!
//! Texts are evaluated strictly sequentially; only facet calls within one
//! text's evaluation run concurrently. Progress is two-level: overall across
//! the batch plus within the current text.

use indexmap::IndexMap;

use crate::engine::{EvaluateError, EvaluateOptions, EvaluationEngine};
use crate::types::{BatchEvaluationResult, BatchSummary, EvaluationResult, FlaggedFacetCount};

impl EvaluationEngine {
    /// Evaluate each non-blank text in order. Blank entries are dropped up
    /// front and count toward nothing.
    ///
    /// `progress` receives `(overall %, current text, within-text %)` after
    /// every facet completion; overall progress is monotonically
    /// non-decreasing and exactly 100.0 after the last facet of the last text.
    pub async fn evaluate_batch<F>(
        &self,
        texts: &[String],
        options: EvaluateOptions,
        mut progress: F,
    ) -> Result<BatchEvaluationResult, EvaluateError>
    where
        F: FnMut(f64, &str, f64),
    {
        let texts: Vec<&str> = texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        let total = texts.len();

        let mut results = Vec::with_capacity(total);
        for (completed, text) in texts.iter().enumerate() {
            let result = self
                .evaluate_text_with_progress(text, options, |within| {
                    let overall = (completed as f64 * 100.0 + within) / total as f64;
                    progress(overall, text, within);
                })
                .await?;
            results.push(result);
        }

        let batch_summary = summarize_batch(&results);

        Ok(BatchEvaluationResult {
            total_turns: results.len(),
            completed_at: chrono::Utc::now(),
            batch_summary,
            results,
        })
    }
}

/// Fold per-text evaluations into a batch summary.
pub fn summarize_batch(results: &[EvaluationResult]) -> BatchSummary {
    // Mean of the per-text category averages, not re-weighted by facet count.
    let mut sums: IndexMap<String, (f64, usize)> = IndexMap::new();
    for result in results {
        for (category, average) in &result.category_averages {
            let entry = sums.entry(category.clone()).or_insert((0.0, 0));
            entry.0 += average;
            entry.1 += 1;
        }
    }
    let category_averages: IndexMap<String, f64> = sums
        .into_iter()
        .map(|(category, (sum, count))| (category, sum / count as f64))
        .collect();

    // Frequency of facets in the low-scoring lists, discovery order on ties.
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for result in results {
        for low in &result.low_scoring_facets {
            *counts.entry(low.facet.clone()).or_insert(0) += 1;
        }
    }
    let mut most_flagged_facets: Vec<FlaggedFacetCount> = counts
        .into_iter()
        .map(|(facet, count)| FlaggedFacetCount { facet, count })
        .collect();
    most_flagged_facets.sort_by_key(|f| std::cmp::Reverse(f.count));

    let flagged_percentage = if results.is_empty() {
        0.0
    } else {
        results.iter().filter(|r| r.flagged).count() as f64 / results.len() as f64 * 100.0
    };

    // Mean absolute drift across all recorded pairs, any text, any facet.
    let drift_deltas: Vec<f64> = results
        .iter()
        .filter_map(|r| r.drift_log.as_ref())
        .flat_map(|log| log.values())
        .map(|[first, second]| (*first as f64 - *second as f64).abs())
        .collect();
    let mean_drift = if drift_deltas.is_empty() {
        None
    } else {
        Some(drift_deltas.iter().sum::<f64>() / drift_deltas.len() as f64)
    };

    BatchSummary {
        category_averages,
        most_flagged_facets,
        flagged_percentage,
        mean_drift,
    }
}
