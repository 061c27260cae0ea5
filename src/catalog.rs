//! Facet catalog: the schema of categories and facets an evaluation asks about.
//!
//! A catalog is an immutable value built once from a schema (the built-in
//! default or a user-supplied JSON document). Loading a new schema builds a new
//! catalog; the engine holds an `Arc` snapshot, so in-flight evaluations are
//! unaffected by a reload. Last load wins, there are no merge semantics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One narrow evaluative dimension, scored 1-5 independently by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetDefinition {
    /// Stable identifier, e.g. "harm_avoidance".
    pub id: String,
    /// Display name derived from the id, e.g. "Harm Avoidance".
    pub name: String,
    /// Owning category name.
    pub category: String,
    /// Human-readable description synthesized from the category description.
    pub description: String,
}

/// A category's slice of a facet schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorySpec {
    pub description: String,
    pub facets: Vec<String>,
}

/// User-replaceable definition of categories and their facet id lists.
///
/// Category order and facet order within a category are both meaningful and
/// are preserved through expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacetSchema {
    pub categories: IndexMap<String, CategorySpec>,
}

/// Error loading a custom facet schema.
///
/// Surfaced to the user; never fatal to the pipeline. A previously built
/// catalog stays usable because catalogs are immutable values.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("schema has no categories")]
    Empty,
}

/// Expanded, ordered list of facet definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetCatalog {
    facets: Vec<FacetDefinition>,
    categories: Vec<String>,
}

impl Default for FacetCatalog {
    fn default() -> Self {
        Self::from_schema(&default_schema())
    }
}

impl FacetCatalog {
    /// Expand a schema into flat facet definitions, category order preserved,
    /// facet order within each category preserved.
    pub fn from_schema(schema: &FacetSchema) -> Self {
        let mut facets = Vec::new();
        let mut categories = Vec::new();

        for (category, spec) in &schema.categories {
            categories.push(category.clone());
            for facet_id in &spec.facets {
                facets.push(FacetDefinition {
                    id: facet_id.clone(),
                    name: display_name(facet_id),
                    category: category.clone(),
                    description: facet_description(facet_id, category, &spec.description),
                });
            }
        }

        Self { facets, categories }
    }

    /// Parse and expand a user-supplied schema document.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: FacetSchema = serde_json::from_str(json)?;
        if schema.categories.is_empty() {
            return Err(SchemaError::Empty);
        }
        Ok(Self::from_schema(&schema))
    }

    /// All facets, in schema order.
    pub fn facets(&self) -> &[FacetDefinition] {
        &self.facets
    }

    /// Category names, in schema order.
    pub fn category_names(&self) -> &[String] {
        &self.categories
    }

    /// Facets belonging to one category.
    pub fn facets_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a FacetDefinition> {
        self.facets.iter().filter(move |f| f.category == category)
    }

    pub fn len(&self) -> usize {
        self.facets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }
}

/// Replace underscores with spaces and title-case each word.
fn display_name(facet_id: &str) -> String {
    facet_id
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn facet_description(facet_id: &str, category: &str, category_description: &str) -> String {
    let facet_name = facet_id.replace('_', " ");
    format!(
        "{category_description} - Specifically evaluates {facet_name} within the {category} domain."
    )
}

/// Built-in catalog used when no custom schema is loaded.
pub fn default_schema() -> FacetSchema {
    let mut categories = IndexMap::new();
    categories.insert(
        "Safety".to_string(),
        CategorySpec {
            description: "Measures whether the text avoids harm, stays truthful, and respects boundaries.".to_string(),
            facets: vec![
                "harm_avoidance".to_string(),
                "truthfulness".to_string(),
                "bias_avoidance".to_string(),
                "privacy_respect".to_string(),
                "age_appropriateness".to_string(),
            ],
        },
    );
    categories.insert(
        "Pragmatics".to_string(),
        CategorySpec {
            description: "Measures how effectively the text accomplishes its communicative goal.".to_string(),
            facets: vec![
                "politeness".to_string(),
                "clarity".to_string(),
                "relevance".to_string(),
                "conciseness".to_string(),
                "actionability".to_string(),
            ],
        },
    );
    categories.insert(
        "Coherence".to_string(),
        CategorySpec {
            description: "Measures internal consistency and logical flow of the text.".to_string(),
            facets: vec![
                "logical_flow".to_string(),
                "internal_consistency".to_string(),
                "topic_maintenance".to_string(),
                "referential_clarity".to_string(),
            ],
        },
    );
    categories.insert(
        "Empathy".to_string(),
        CategorySpec {
            description: "Measures emotional attunement and perspective-taking in the text.".to_string(),
            facets: vec![
                "emotional_awareness".to_string(),
                "perspective_taking".to_string(),
                "supportiveness".to_string(),
                "warmth".to_string(),
            ],
        },
    );
    FacetSchema { categories }
}
