//! Scoring oracle client.
//!
//! Implements the contract between the LLM's free-form replies and the
//! structured scores the engine aggregates. Every operation here has a
//! fallback: a facet whose call fails scores a neutral 3 with confidence 0.5,
//! a failed rewrite echoes the original text, and a failed summary returns a
//! fixed string. An oracle error never propagates past this module.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::catalog::FacetDefinition;
use crate::gateway::{Attribution, ChatGateway, ChatRequest, Message, ProviderError};
use crate::prompts;
use crate::types::FacetScore;

/// Hard cap on generation for a single oracle call.
///
/// Keeps costs bounded; scoring replies are a small JSON object and rewrites
/// stay near the input length.
pub const ORACLE_MAX_OUTPUT_TOKENS: u32 = 1024;

pub const DEFAULT_ORACLE_MODEL: &str = "llama-3.1-8b-instant";

/// Neutral score used when a facet's oracle call fails.
const FALLBACK_SCORE: u8 = 3;
const FALLBACK_CONFIDENCE: f64 = 0.5;

const SUMMARY_FALLBACK: &str = "Unable to generate summary due to evaluation error.";

/// Errors from a single oracle operation. Callers inside this module convert
/// these into fallback values; the public scoring API never returns them.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Transport-level failure (non-2xx response, network error).
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// Malformed or out-of-range reply.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Oracle configuration. Temperature is pinned to 0.0 by construction for
/// reproducible scoring.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub model: String,
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_ORACLE_MODEL.to_string(),
            max_tokens: ORACLE_MAX_OUTPUT_TOKENS,
        }
    }
}

/// Client for the external scoring oracle.
pub struct ScoringOracle {
    gateway: Arc<dyn ChatGateway>,
    config: OracleConfig,
}

impl ScoringOracle {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: OracleConfig) -> Self {
        Self { gateway, config }
    }

    async fn request(&self, prompt: String, caller: &'static str) -> Result<String, OracleError> {
        let request = ChatRequest::new(
            &self.config.model,
            vec![Message::user(prompt)],
            Attribution::new(caller),
        )
        .max_tokens(self.config.max_tokens);

        let response = self.gateway.chat(request).await?;
        Ok(response.content)
    }

    /// Score one facet of a text.
    ///
    /// Never fails: any transport, parse, or validation error is logged and
    /// converted into the neutral fallback score so a single bad call cannot
    /// abort the surrounding evaluation.
    pub async fn score_facet(&self, text: &str, facet: &FacetDefinition) -> FacetScore {
        let prompt = prompts::facet_prompt(text, facet);

        let result = match self.request(prompt, "oracle::score_facet").await {
            Ok(raw) => parse_facet_reply(&raw),
            Err(e) => Err(e),
        };

        match result {
            Ok(score) => score,
            Err(e) => {
                warn!(facet = %facet.id, error = %e, "Facet scoring failed; using fallback score");
                FacetScore {
                    score: FALLBACK_SCORE,
                    confidence: FALLBACK_CONFIDENCE,
                    justification: format!("Evaluation failed for {}: {e}", facet.name),
                }
            }
        }
    }

    /// Ask for an improved version of the text, targeting low-scoring
    /// categories. Falls back to echoing the original text.
    pub async fn suggest_rewrite(&self, text: &str, low_categories: &[String]) -> String {
        let prompt = prompts::rewrite_prompt(text, low_categories);

        match self.request(prompt, "oracle::suggest_rewrite").await {
            Ok(raw) => strip_surrounding_quotes(raw.trim()).to_string(),
            Err(e) => {
                warn!(error = %e, "Rewrite generation failed; echoing original text");
                text.to_string()
            }
        }
    }

    /// Ask for a one-sentence summary of the aggregated scores.
    pub async fn summarize<'a>(
        &self,
        category_averages: impl Iterator<Item = (&'a str, f64)>,
        flagged: bool,
    ) -> String {
        let prompt = prompts::summary_prompt(category_averages, flagged);

        match self.request(prompt, "oracle::summarize").await {
            Ok(raw) => raw.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Summary generation failed; using fallback summary");
                SUMMARY_FALLBACK.to_string()
            }
        }
    }
}

// =============================================================================
// Reply parsing
// =============================================================================

/// Raw JSON structure expected inside the scoring reply.
#[derive(Debug, Deserialize)]
struct FacetReplyJson {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    justification: Option<String>,
}

/// Parse an oracle scoring reply into a [`FacetScore`].
///
/// Tolerates conversational wrapper text around the JSON object; validates
/// that `score` is a number in [1, 5] and `confidence` a number in [0, 1].
pub fn parse_facet_reply(raw: &str) -> Result<FacetScore, OracleError> {
    let json_str = extract_json(raw)
        .ok_or_else(|| OracleError::Validation("no JSON object found in response".into()))?;

    let parsed: FacetReplyJson = serde_json::from_str(json_str)
        .map_err(|e| OracleError::Validation(e.to_string()))?;

    let score = parsed
        .score
        .ok_or_else(|| OracleError::Validation("missing 'score'".into()))?;
    if !(1.0..=5.0).contains(&score) {
        return Err(OracleError::Validation(format!(
            "score out of allowed range [1,5]: {score}"
        )));
    }

    let confidence = parsed
        .confidence
        .ok_or_else(|| OracleError::Validation("missing 'confidence'".into()))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(OracleError::Validation(format!(
            "confidence out of allowed range [0,1]: {confidence}"
        )));
    }

    Ok(FacetScore {
        score: score.round() as u8,
        confidence,
        justification: parsed.justification.unwrap_or_default(),
    })
}

/// Extract the first balanced-brace JSON object from a reply (handles models
/// that add surrounding text).
fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let start = trimmed.find('{')?;
    let remainder = &trimmed[start..];

    let mut depth = 0;
    for (i, c) in remainder.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&remainder[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Strip one pair of surrounding quote characters, if present.
fn strip_surrounding_quotes(s: &str) -> &str {
    let s = s.strip_prefix('"').or_else(|| s.strip_prefix('\'')).unwrap_or(s);
    s.strip_suffix('"').or_else(|| s.strip_suffix('\'')).unwrap_or(s)
}
