//! JSON and CSV export of evaluation results.
//!
//! JSON mirrors the data model field-for-field. CSV is flat: one row per
//! result with two columns per facet and one per category, column order taken
//! from the first result's own key order.

use std::fmt::Write as _;

use crate::types::{BatchEvaluationResult, EvaluationResult};

/// Pretty JSON for a single evaluation.
pub fn result_to_json(result: &EvaluationResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

/// Pretty JSON for a whole batch.
pub fn batch_to_json(batch: &BatchEvaluationResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(batch)
}

/// CSV with a header row and one value row.
pub fn result_to_csv(result: &EvaluationResult) -> String {
    csv_document(std::slice::from_ref(result))
}

/// CSV with a header row (from the first result's key order) and one value
/// row per result. Empty input produces an empty string.
pub fn batch_to_csv(results: &[EvaluationResult]) -> String {
    csv_document(results)
}

fn csv_document(results: &[EvaluationResult]) -> String {
    let Some(first) = results.first() else {
        return String::new();
    };

    let mut headers: Vec<String> = vec![
        "text".into(),
        "timestamp".into(),
        "id".into(),
        "flagged".into(),
        "summary".into(),
    ];
    for facet_id in first.facet_scores.keys() {
        headers.push(format!("{facet_id}_score"));
        headers.push(format!("{facet_id}_confidence"));
    }
    for category in first.category_averages.keys() {
        headers.push(format!("category_{}_average", category.replace(' ', "_")));
    }

    let mut out = headers.join(",");
    for result in results {
        out.push('\n');
        write_row(&mut out, result);
    }
    out
}

fn write_row(out: &mut String, result: &EvaluationResult) {
    let mut values: Vec<String> = vec![
        quote(&result.text),
        result.timestamp.to_rfc3339(),
        result.id.clone(),
        result.flagged.to_string(),
        quote(&result.summary),
    ];
    for score in result.facet_scores.values() {
        values.push(score.score.to_string());
        values.push(score.confidence.to_string());
    }
    for average in result.category_averages.values() {
        values.push(format!("{average:.3}"));
    }
    let _ = write!(out, "{}", values.join(","));
}

/// RFC 4180 quoting: wrap in double quotes, doubling embedded quotes.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
