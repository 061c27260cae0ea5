use chrono::Utc;
use indexmap::IndexMap;

use facet_bench::export;
use facet_bench::{
    BatchEvaluationResult, BatchSummary, EvaluationResult, FacetScore, FlaggedFacetCount,
    LowScoringFacet,
};

fn full_result() -> EvaluationResult {
    EvaluationResult {
        text: "Line one\nwith a \"quoted\" bit".into(),
        facet_scores: IndexMap::from([
            (
                "harm_avoidance".to_string(),
                FacetScore {
                    score: 2,
                    confidence: 0.7,
                    justification: "Borderline phrasing.".into(),
                },
            ),
            (
                "politeness".to_string(),
                FacetScore {
                    score: 4,
                    confidence: 0.95,
                    justification: "Courteous.".into(),
                },
            ),
        ]),
        category_averages: IndexMap::from([
            ("Safety".to_string(), 2.0),
            ("Pragmatics".to_string(), 4.0),
        ]),
        suggested_rewrite: Some("A safer phrasing.".into()),
        low_scoring_facets: vec![
            LowScoringFacet {
                facet: "Harm Avoidance".into(),
                score: 2,
                category: "Safety".into(),
            },
            LowScoringFacet {
                facet: "Politeness".into(),
                score: 4,
                category: "Pragmatics".into(),
            },
        ],
        flagged: true,
        flag_reason: Some("Low safety score detected".into()),
        summary: "Mixed performance.".into(),
        score_drift_check: Some(true),
        drift_log: Some(IndexMap::from([
            ("harm_avoidance".to_string(), [2, 3]),
            ("politeness".to_string(), [4, 4]),
        ])),
        timestamp: Utc::now(),
        id: "4a1f".into(),
    }
}

fn minimal_result() -> EvaluationResult {
    EvaluationResult {
        text: "Fine.".into(),
        facet_scores: IndexMap::from([(
            "politeness".to_string(),
            FacetScore {
                score: 5,
                confidence: 0.9,
                justification: "Good.".into(),
            },
        )]),
        category_averages: IndexMap::from([("Pragmatics".to_string(), 5.0)]),
        suggested_rewrite: None,
        low_scoring_facets: vec![LowScoringFacet {
            facet: "Politeness".into(),
            score: 5,
            category: "Pragmatics".into(),
        }],
        flagged: false,
        flag_reason: None,
        summary: "Good.".into(),
        score_drift_check: None,
        drift_log: None,
        timestamp: Utc::now(),
        id: "9b2c".into(),
    }
}

#[test]
fn result_json_round_trips() {
    let original = full_result();
    let json = export::result_to_json(&original).unwrap();
    let back: EvaluationResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, original);
}

#[test]
fn optional_fields_are_omitted_when_absent() {
    let json = export::result_to_json(&minimal_result()).unwrap();
    assert!(!json.contains("suggested_rewrite"));
    assert!(!json.contains("flag_reason"));
    assert!(!json.contains("score_drift_check"));
    assert!(!json.contains("drift_log"));

    let json = export::result_to_json(&full_result()).unwrap();
    assert!(json.contains("suggested_rewrite"));
    assert!(json.contains("drift_log"));
}

#[test]
fn json_preserves_facet_and_category_order() {
    let json = export::result_to_json(&full_result()).unwrap();
    let harm = json.find("harm_avoidance").unwrap();
    let polite = json.find("politeness").unwrap();
    assert!(harm < polite);

    let safety = json.find("\"Safety\"").unwrap();
    let pragmatics = json.find("\"Pragmatics\"").unwrap();
    assert!(safety < pragmatics);
}

#[test]
fn batch_json_round_trips() {
    let results = vec![full_result(), minimal_result()];
    let original = BatchEvaluationResult {
        total_turns: results.len(),
        completed_at: Utc::now(),
        batch_summary: BatchSummary {
            category_averages: IndexMap::from([
                ("Safety".to_string(), 2.0),
                ("Pragmatics".to_string(), 4.5),
            ]),
            most_flagged_facets: vec![FlaggedFacetCount {
                facet: "Harm Avoidance".into(),
                count: 1,
            }],
            flagged_percentage: 50.0,
            mean_drift: Some(0.5),
        },
        results,
    };

    let json = export::batch_to_json(&original).unwrap();
    let back: BatchEvaluationResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, original);
}

#[test]
fn csv_columns_follow_first_result() {
    let mut first = full_result();
    first.text = "One line with a \"quoted\" bit".into();
    let csv = export::batch_to_csv(&[first, minimal_result()]);
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert_eq!(
        header,
        "text,timestamp,id,flagged,summary,\
         harm_avoidance_score,harm_avoidance_confidence,\
         politeness_score,politeness_confidence,\
         category_Safety_average,category_Pragmatics_average"
    );
    assert_eq!(lines.count(), 2);

    let row = csv.lines().nth(1).unwrap();
    assert!(row.starts_with(r#""One line"#));
    assert!(row.contains(r#"""quoted"""#));
}
