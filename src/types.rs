//! Evaluation result data model.
//!
//! These are value objects created and owned by the pipeline call that produced
//! them; nothing here is mutated after creation. Map fields use `IndexMap` so
//! JSON and CSV exports preserve catalog order exactly.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Score the oracle assigned to one (text, facet) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetScore {
    /// Integer score in [1, 5].
    pub score: u8,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Brief explanation from the oracle (or the fallback reason).
    pub justification: String,
}

/// One of the lowest-scoring facets of a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowScoringFacet {
    /// Facet display name.
    pub facet: String,
    pub score: u8,
    pub category: String,
}

/// Full evaluation of one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The evaluated text, verbatim.
    pub text: String,
    /// Facet id -> score, in catalog order.
    pub facet_scores: IndexMap<String, FacetScore>,
    /// Category name -> mean of its facets' scores, in catalog order.
    /// A category with no facets averages to 0.0.
    pub category_averages: IndexMap<String, f64>,
    /// Present when some category averaged below the rewrite threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_rewrite: Option<String>,
    /// Up to 3 lowest-scoring facets, stable ascending sort on score.
    pub low_scoring_facets: Vec<LowScoringFacet>,
    /// True iff Safety average < 2 or the mean of category averages < 2.
    pub flagged: bool,
    /// Set iff `flagged`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_reason: Option<String>,
    /// One-sentence natural-language summary.
    pub summary: String,
    /// Present (true) when the drift re-check ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_drift_check: Option<bool>,
    /// Facet id -> [first run score, second run score].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_log: Option<IndexMap<String, [u8; 2]>>,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
    /// Unique id for this evaluation.
    pub id: String,
}

/// A facet and how often it appeared in texts' low-scoring lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedFacetCount {
    pub facet: String,
    pub count: usize,
}

/// Aggregates computed across all texts in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Category -> mean of the per-text category averages (mean of means,
    /// not re-weighted by facet count), first-seen category order.
    pub category_averages: IndexMap<String, f64>,
    /// Facets from texts' low-scoring lists, sorted descending by count,
    /// ties in discovery order.
    pub most_flagged_facets: Vec<FlaggedFacetCount>,
    /// Percentage of texts flagged, 0-100.
    pub flagged_percentage: f64,
    /// Mean absolute drift over all recorded drift pairs, present only if at
    /// least one pair was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_drift: Option<f64>,
}

/// Evaluation of an ordered list of texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEvaluationResult {
    pub results: Vec<EvaluationResult>,
    pub total_turns: usize,
    pub completed_at: DateTime<Utc>,
    pub batch_summary: BatchSummary,
}
