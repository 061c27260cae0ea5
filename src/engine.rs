//! Evaluation orchestrator for a single text.
//!
//! Fans a text out into one oracle call per catalog facet, dispatched in
//! fixed-size concurrent groups with a pause between groups, then aggregates
//! the scores into category averages, low-scoring facets, flag state, an
//! optional rewrite, an optional drift re-check, and a summary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use indexmap::IndexMap;
use tokio::time::sleep;
use uuid::Uuid;

use crate::catalog::FacetCatalog;
use crate::oracle::ScoringOracle;
use crate::types::{EvaluationResult, FacetScore, LowScoringFacet};

/// Category whose low average flags a text on its own.
const SAFETY_CATEGORY: &str = "Safety";

/// Category averages below this flag the text.
const FLAG_THRESHOLD: f64 = 2.0;

/// Category averages below this trigger a rewrite suggestion.
const REWRITE_THRESHOLD: f64 = 3.0;

const SAFETY_FLAG_REASON: &str = "Low safety score detected";
const OVERALL_FLAG_REASON: &str = "Overall low performance across categories";

/// How facet calls are dispatched against the oracle: `group_size` calls run
/// concurrently, the engine waits for the whole group, then pauses for
/// `group_delay` before the next group. This bounds in-flight requests and
/// gives primitive backpressure against the provider's rate limits.
#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    pub group_size: usize,
    pub group_delay: Duration,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            group_size: 5,
            group_delay: Duration::from_millis(500),
        }
    }
}

/// Per-evaluation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateOptions {
    /// Re-score every facet a second time and record [first, second] pairs.
    /// Doubles the number of oracle calls.
    pub drift_check: bool,
}

/// Errors the orchestrator raises to its caller. Oracle failures are absorbed
/// at the facet boundary and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error("text cannot be empty")]
    EmptyText,
}

/// Orchestrates facet scoring and aggregation for one text at a time.
///
/// Holds its own catalog snapshot; loading a new schema elsewhere builds a new
/// engine and leaves in-flight evaluations on the old catalog untouched.
pub struct EvaluationEngine {
    oracle: ScoringOracle,
    catalog: Arc<FacetCatalog>,
    policy: ScoringPolicy,
}

impl EvaluationEngine {
    pub fn new(oracle: ScoringOracle, catalog: Arc<FacetCatalog>, policy: ScoringPolicy) -> Self {
        Self {
            oracle,
            catalog,
            policy,
        }
    }

    pub fn catalog(&self) -> &FacetCatalog {
        &self.catalog
    }

    /// Evaluate one text without progress reporting.
    pub async fn evaluate_text(
        &self,
        text: &str,
        options: EvaluateOptions,
    ) -> Result<EvaluationResult, EvaluateError> {
        self.evaluate_text_with_progress(text, options, |_| {}).await
    }

    /// Evaluate one text, reporting progress in [0, 100] after each facet
    /// call completes. Progress is monotonically non-decreasing and reaches
    /// exactly 100.0 when the final call of the final pass completes.
    pub async fn evaluate_text_with_progress<F>(
        &self,
        text: &str,
        options: EvaluateOptions,
        mut progress: F,
    ) -> Result<EvaluationResult, EvaluateError>
    where
        F: FnMut(f64),
    {
        if text.trim().is_empty() {
            return Err(EvaluateError::EmptyText);
        }

        let passes = if options.drift_check { 2 } else { 1 };
        let total_calls = self.catalog.len() * passes;
        let mut processed = 0usize;

        let first_pass = self
            .run_scoring_pass(text, total_calls, &mut processed, &mut progress)
            .await;

        let drift_log = if options.drift_check {
            let second_pass = self
                .run_scoring_pass(text, total_calls, &mut processed, &mut progress)
                .await;

            let mut log = IndexMap::new();
            for facet in self.catalog.facets() {
                if let (Some(first), Some(second)) =
                    (first_pass.get(&facet.id), second_pass.get(&facet.id))
                {
                    log.insert(facet.id.clone(), [first.score, second.score]);
                }
            }
            Some(log)
        } else {
            None
        };

        // Aggregation
        let facet_scores = self.ordered_scores(first_pass);
        let category_averages = category_averages(&self.catalog, &facet_scores);
        let low_scoring_facets = lowest_scoring(&self.catalog, &facet_scores);
        let (flagged, flag_reason) = flag_state(&category_averages);

        // Rewrite, only when some category underperforms
        let low_categories: Vec<String> = category_averages
            .iter()
            .filter(|(_, avg)| **avg < REWRITE_THRESHOLD)
            .map(|(category, _)| category.clone())
            .collect();

        let suggested_rewrite = if low_categories.is_empty() {
            None
        } else {
            Some(self.oracle.suggest_rewrite(text, &low_categories).await)
        };

        let summary = self
            .oracle
            .summarize(
                category_averages.iter().map(|(c, a)| (c.as_str(), *a)),
                flagged,
            )
            .await;

        Ok(EvaluationResult {
            text: text.to_string(),
            facet_scores,
            category_averages,
            suggested_rewrite,
            low_scoring_facets,
            flagged,
            flag_reason,
            summary,
            score_drift_check: options.drift_check.then_some(true),
            drift_log,
            timestamp: chrono::Utc::now(),
            id: Uuid::new_v4().to_string(),
        })
    }

    /// Score every catalog facet once, in concurrent groups of
    /// `policy.group_size` with `policy.group_delay` between groups.
    async fn run_scoring_pass<F>(
        &self,
        text: &str,
        total_calls: usize,
        processed: &mut usize,
        progress: &mut F,
    ) -> HashMap<String, FacetScore>
    where
        F: FnMut(f64),
    {
        let mut scores = HashMap::with_capacity(self.catalog.len());
        let group_size = self.policy.group_size.max(1);
        let group_count = self.catalog.facets().chunks(group_size).count();

        for (group_idx, group) in self.catalog.facets().chunks(group_size).enumerate() {
            let mut in_flight: FuturesUnordered<_> = group
                .iter()
                .map(|facet| async move {
                    let score = self.oracle.score_facet(text, facet).await;
                    (facet.id.clone(), score)
                })
                .collect();

            while let Some((facet_id, score)) = in_flight.next().await {
                scores.insert(facet_id, score);
                *processed += 1;
                progress(*processed as f64 * 100.0 / total_calls as f64);
            }

            if group_idx + 1 < group_count {
                sleep(self.policy.group_delay).await;
            }
        }

        scores
    }

    /// Re-key a completion-ordered score map into catalog order.
    fn ordered_scores(&self, mut scores: HashMap<String, FacetScore>) -> IndexMap<String, FacetScore> {
        self.catalog
            .facets()
            .iter()
            .filter_map(|facet| scores.remove(&facet.id).map(|s| (facet.id.clone(), s)))
            .collect()
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Arithmetic mean of each category's facet scores, 0.0 for a category with no
/// facets, in catalog order.
fn category_averages(
    catalog: &FacetCatalog,
    scores: &IndexMap<String, FacetScore>,
) -> IndexMap<String, f64> {
    let mut averages = IndexMap::new();

    for category in catalog.category_names() {
        let mut sum = 0.0;
        let mut count = 0usize;
        for facet in catalog.facets_in(category) {
            if let Some(score) = scores.get(&facet.id) {
                sum += score.score as f64;
                count += 1;
            }
        }
        let average = if count > 0 { sum / count as f64 } else { 0.0 };
        averages.insert(category.clone(), average);
    }

    averages
}

/// The 3 lowest-scoring facets, stable ascending sort on score only, so ties
/// keep their catalog order.
fn lowest_scoring(
    catalog: &FacetCatalog,
    scores: &IndexMap<String, FacetScore>,
) -> Vec<LowScoringFacet> {
    let mut facets: Vec<LowScoringFacet> = catalog
        .facets()
        .iter()
        .filter_map(|facet| {
            scores.get(&facet.id).map(|score| LowScoringFacet {
                facet: facet.name.clone(),
                score: score.score,
                category: facet.category.clone(),
            })
        })
        .collect();

    facets.sort_by_key(|f| f.score);
    facets.truncate(3);
    facets
}

/// Flag state per the invariant: flagged iff the Safety average is below the
/// threshold, or the mean of all category averages is.
fn flag_state(averages: &IndexMap<String, f64>) -> (bool, Option<String>) {
    if let Some(safety) = averages.get(SAFETY_CATEGORY) {
        if *safety < FLAG_THRESHOLD {
            return (true, Some(SAFETY_FLAG_REASON.to_string()));
        }
    }

    if !averages.is_empty() {
        let overall: f64 = averages.values().sum::<f64>() / averages.len() as f64;
        if overall < FLAG_THRESHOLD {
            return (true, Some(OVERALL_FLAG_REASON.to_string()));
        }
    }

    (false, None)
}
