use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use facet_bench::gateway::{GroqAdapter, NoopUsageSink, ProviderGateway};
use facet_bench::{
    EvaluateOptions, EvaluationEngine, FacetCatalog, OracleConfig, ScoringOracle, ScoringPolicy,
};

fn user_content(request: &Request) -> String {
    let parsed: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
    parsed
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|msgs| {
            msgs.iter()
                .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
        })
        .and_then(|m| m.get("content").and_then(|c| c.as_str()))
        .unwrap_or("")
        .to_string()
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": { "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 10 }
    }))
}

/// Scores 1 for texts carrying the BAD marker, 5 otherwise.
struct MarkerOracle;

impl Respond for MarkerOracle {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let user = user_content(request);
        if user.contains("following JSON format") {
            let score = if user.contains("BAD") { 1 } else { 5 };
            chat_reply(&format!(
                r#"{{"score": {score}, "confidence": 0.9, "justification": "stub"}}"#
            ))
        } else if user.contains("improved version") {
            chat_reply("Improved text.")
        } else {
            chat_reply("Summary.")
        }
    }
}

/// Cycles scores per scoring call so drift passes disagree.
struct DriftingOracle {
    scores: Vec<u8>,
    calls: AtomicUsize,
}

impl Respond for DriftingOracle {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let user = user_content(request);
        if user.contains("following JSON format") {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            let score = self.scores[idx % self.scores.len()];
            chat_reply(&format!(
                r#"{{"score": {score}, "confidence": 0.8, "justification": "stub"}}"#
            ))
        } else {
            chat_reply("Summary.")
        }
    }
}

async fn engine_against(server: &MockServer, catalog_json: &str) -> EvaluationEngine {
    let adapter = GroqAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5)).unwrap();
    let gateway = Arc::new(ProviderGateway::with_adapter(adapter, Arc::new(NoopUsageSink)));
    let oracle = ScoringOracle::new(gateway, OracleConfig::default());
    let catalog = Arc::new(FacetCatalog::from_json(catalog_json).unwrap());
    EvaluationEngine::new(
        oracle,
        catalog,
        ScoringPolicy {
            group_size: 5,
            group_delay: Duration::ZERO,
        },
    )
}

const PRAGMATICS_CATALOG: &str = r#"{
    "categories": {
        "Pragmatics": {
            "description": "How well the text communicates.",
            "facets": ["politeness", "clarity"]
        }
    }
}"#;

const SAFETY_CATALOG: &str = r#"{
    "categories": {
        "Safety": {
            "description": "Avoids harm.",
            "facets": ["harm_avoidance"]
        },
        "Pragmatics": {
            "description": "Communicates well.",
            "facets": ["politeness"]
        }
    }
}"#;

#[tokio::test]
async fn batch_flags_one_of_three_texts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(MarkerOracle)
        .mount(&server)
        .await;

    let engine = engine_against(&server, PRAGMATICS_CATALOG).await;
    let texts = vec![
        "First turn, perfectly fine.".to_string(),
        "BAD second turn.".to_string(),
        "Third turn, also fine.".to_string(),
    ];

    let batch = engine
        .evaluate_batch(&texts, EvaluateOptions::default(), |_, _, _| {})
        .await
        .unwrap();

    assert_eq!(batch.total_turns, 3);
    assert!((batch.batch_summary.flagged_percentage - 100.0 / 3.0).abs() < 1e-9);

    // Without a Safety category, the bad text flags on the overall rule.
    let second = &batch.results[1];
    assert!(second.flagged);
    assert_eq!(
        second.flag_reason.as_deref(),
        Some("Overall low performance across categories")
    );
    assert_eq!(second.suggested_rewrite.as_deref(), Some("Improved text."));
    assert!(!batch.results[0].flagged);
    assert!(!batch.results[2].flagged);

    // Pooled averages are mean of means: (5 + 1 + 5) / 3.
    assert!((batch.batch_summary.category_averages["Pragmatics"] - 11.0 / 3.0).abs() < 1e-9);

    // Every text contributes its low-scoring facets; the bad text's facets
    // appear most often only when they genuinely repeat, so here all counts
    // reflect three texts' lists of two facets each.
    let total_count: usize = batch
        .batch_summary
        .most_flagged_facets
        .iter()
        .map(|f| f.count)
        .sum();
    assert_eq!(total_count, 6);
}

#[tokio::test]
async fn bad_safety_text_flags_on_safety_rule() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(MarkerOracle)
        .mount(&server)
        .await;

    let engine = engine_against(&server, SAFETY_CATALOG).await;
    let texts = vec![
        "Fine text.".to_string(),
        "BAD text.".to_string(),
        "Another fine text.".to_string(),
    ];

    let batch = engine
        .evaluate_batch(&texts, EvaluateOptions::default(), |_, _, _| {})
        .await
        .unwrap();

    let second = &batch.results[1];
    assert!(second.flagged);
    assert_eq!(second.flag_reason.as_deref(), Some("Low safety score detected"));
    assert!((batch.batch_summary.flagged_percentage - 100.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn batch_progress_is_monotone_and_ends_at_exactly_100() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(MarkerOracle)
        .mount(&server)
        .await;

    let engine = engine_against(&server, PRAGMATICS_CATALOG).await;
    let texts = vec![
        "One.".to_string(),
        "Two.".to_string(),
        "Three.".to_string(),
    ];

    let mut overall_updates = Vec::new();
    let mut within_updates = Vec::new();
    let batch = engine
        .evaluate_batch(&texts, EvaluateOptions::default(), |overall, _, within| {
            overall_updates.push(overall);
            within_updates.push(within);
        })
        .await
        .unwrap();

    assert_eq!(batch.results.len(), 3);
    // One event per facet call: 3 texts x 2 facets.
    assert_eq!(overall_updates.len(), 6);
    assert!(overall_updates.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*overall_updates.last().unwrap(), 100.0);
    assert_eq!(*within_updates.last().unwrap(), 100.0);
}

#[tokio::test]
async fn blank_entries_are_skipped_silently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(MarkerOracle)
        .mount(&server)
        .await;

    let engine = engine_against(&server, PRAGMATICS_CATALOG).await;
    let texts = vec![
        "Real text.".to_string(),
        "   ".to_string(),
        String::new(),
        "Another real text.".to_string(),
    ];

    let mut last_overall = 0.0;
    let batch = engine
        .evaluate_batch(&texts, EvaluateOptions::default(), |overall, _, _| {
            last_overall = overall;
        })
        .await
        .unwrap();

    assert_eq!(batch.total_turns, 2);
    assert_eq!(batch.results.len(), 2);
    // Blanks do not count toward the progress denominator either.
    assert_eq!(last_overall, 100.0);
    assert_eq!(batch.batch_summary.flagged_percentage, 0.0);
}

#[tokio::test]
async fn batch_mean_drift_pools_all_pairs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(DriftingOracle {
            scores: vec![5, 3],
            calls: AtomicUsize::new(0),
        })
        .mount(&server)
        .await;

    // Single facet so drift pairs are deterministic: each text scores 5 then 3.
    let engine = engine_against(
        &server,
        r#"{"categories": {"Pragmatics": {"description": "d", "facets": ["politeness"]}}}"#,
    )
    .await;
    let texts = vec!["One.".to_string(), "Two.".to_string()];

    let batch = engine
        .evaluate_batch(&texts, EvaluateOptions { drift_check: true }, |_, _, _| {})
        .await
        .unwrap();

    for result in &batch.results {
        assert_eq!(result.drift_log.as_ref().unwrap()["politeness"], [5, 3]);
    }
    assert!((batch.batch_summary.mean_drift.unwrap() - 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn empty_batch_completes_without_oracle_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(MarkerOracle)
        .mount(&server)
        .await;

    let engine = engine_against(&server, PRAGMATICS_CATALOG).await;
    let batch = engine
        .evaluate_batch(&["  ".to_string()], EvaluateOptions::default(), |_, _, _| {})
        .await
        .unwrap();

    assert_eq!(batch.total_turns, 0);
    assert!(batch.results.is_empty());
    assert_eq!(batch.batch_summary.flagged_percentage, 0.0);

    let received = server.received_requests().await.unwrap();
    assert!(received.is_empty());
}
