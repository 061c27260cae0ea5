//! Prompt rendering for oracle calls.
//!
//! Each oracle operation sends a single user message. Scoring prompts ask for
//! a small JSON object; rewrite and summary prompts ask for free text.

use crate::catalog::FacetDefinition;

/// Prompt asking the oracle to score one facet of a text.
///
/// The reply must contain a JSON object with `score`, `confidence`, and
/// `justification` fields; conversational wrapper text around it is tolerated
/// by the parser.
pub fn facet_prompt(text: &str, facet: &FacetDefinition) -> String {
    format!(
        r#"Evaluate the following text for the specific facet "{name}" in the category "{category}".

Facet Description: {description}

Text to evaluate: "{text}"

Provide your evaluation in the following JSON format:
{{
  "score": [integer from 1-5, where 1 is very poor and 5 is excellent],
  "confidence": [float from 0.0-1.0 representing your confidence in this score],
  "justification": "[brief explanation of why this score was assigned for this facet]"
}}

Consider only this specific facet in your evaluation. Be precise and objective."#,
        name = facet.name,
        category = facet.category,
        description = facet.description,
    )
}

/// Prompt asking the oracle for an improved version of the text, targeting the
/// categories that scored low.
pub fn rewrite_prompt(text: &str, low_categories: &[String]) -> String {
    format!(
        r#"The following text has low scores in these categories: {categories}.

Original text: "{text}"

Please provide an improved version that addresses the issues in the mentioned categories. Return only the improved text without any additional explanation."#,
        categories = low_categories.join(", "),
    )
}

/// Prompt asking the oracle for a one-sentence performance summary.
pub fn summary_prompt<'a>(
    category_averages: impl Iterator<Item = (&'a str, f64)>,
    flagged: bool,
) -> String {
    let scores = category_averages
        .map(|(category, average)| format!("{category}: {average:.2}/5"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Based on these category scores, generate a brief human-readable summary of how the message performed:

{scores}

Flagged for issues: {flagged}

Provide a concise summary in one sentence focusing on the main strengths and weaknesses."#,
        flagged = if flagged { "Yes" } else { "No" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FacetCatalog;

    #[test]
    fn facet_prompt_names_facet_category_and_text() {
        let catalog = FacetCatalog::default();
        let facet = &catalog.facets()[0];
        let prompt = facet_prompt("hello there", facet);
        assert!(prompt.contains(&facet.name));
        assert!(prompt.contains(&facet.category));
        assert!(prompt.contains("hello there"));
        assert!(prompt.contains(r#""score""#));
    }

    #[test]
    fn rewrite_prompt_lists_categories() {
        let prompt = rewrite_prompt("text", &["Safety".to_string(), "Empathy".to_string()]);
        assert!(prompt.contains("Safety, Empathy"));
        assert!(prompt.contains("text"));
    }

    #[test]
    fn summary_prompt_formats_scores_and_flag() {
        let averages = [("Safety", 1.5), ("Pragmatics", 4.25)];
        let prompt = summary_prompt(averages.iter().map(|(c, a)| (*c, *a)), true);
        assert!(prompt.contains("Safety: 1.50/5"));
        assert!(prompt.contains("Pragmatics: 4.25/5"));
        assert!(prompt.contains("Flagged for issues: Yes"));
    }
}
