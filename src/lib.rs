#![forbid(unsafe_code)]

//! # facet-bench
//!
//! Facet-level text benchmarking over an LLM scoring oracle.
//!
//! A text is fanned out into one scoring call per facet (a narrow evaluative
//! dimension like "politeness", scored 1–5 with a confidence), grouped into
//! categories whose scores are averaged. The engine derives low-scoring facets,
//! a flag state for texts whose Safety or overall average falls below threshold,
//! an optional rewrite suggestion, an optional drift re-check, and a
//! natural-language summary. Batches of texts fold into a batch summary with
//! pooled category averages and most-flagged facets.
//!
//! Oracle calls are dispatched in fixed-size concurrent groups with a pause
//! between groups, so outbound request pressure stays bounded. A facet whose
//! oracle call fails is absorbed into a neutral fallback score; a single bad
//! call never aborts an evaluation.

pub mod batch;
pub mod catalog;
pub mod engine;
pub mod export;
pub mod gateway;
pub mod oracle;
pub mod prompts;
pub mod types;

pub use catalog::{FacetCatalog, FacetDefinition, FacetSchema, SchemaError};
pub use engine::{EvaluateError, EvaluateOptions, EvaluationEngine, ScoringPolicy};
pub use gateway::{
    Attribution, ChatGateway, GroqAdapter, NoopUsageSink, ProviderGateway, UsageSink,
};
pub use oracle::{OracleConfig, ScoringOracle};
pub use types::{
    BatchEvaluationResult, BatchSummary, EvaluationResult, FacetScore, FlaggedFacetCount,
    LowScoringFacet,
};
