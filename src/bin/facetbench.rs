#![forbid(unsafe_code)]

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use facet_bench::export;
use facet_bench::gateway::{ChatGateway, NoopUsageSink, ProviderGateway, StderrUsageSink};
use facet_bench::{
    EvaluateOptions, EvaluationEngine, FacetCatalog, OracleConfig, ScoringOracle, ScoringPolicy,
};

#[derive(Parser)]
#[command(name = "facetbench", version, about = "Facet-level text benchmarking CLI")]
struct Cli {
    /// Log per-call provider usage to stderr as JSON lines
    #[arg(long, global = true)]
    log_usage: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single text across all catalog facets
    Eval {
        /// Text to evaluate
        #[arg(long, group = "input")]
        text: Option<String>,

        /// Read the text from a file
        #[arg(long, group = "input")]
        file: Option<PathBuf>,

        /// Re-score every facet a second time and record drift
        #[arg(long)]
        drift: bool,

        /// Custom facet schema JSON (replaces the built-in catalog)
        #[arg(long)]
        schema: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output path (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Evaluate a batch of texts, one per line
    Batch {
        /// File with one text per line; blank lines are skipped
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        drift: bool,

        #[arg(long)]
        schema: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the active facet catalog
    Facets {
        #[arg(long)]
        schema: Option<PathBuf>,
    },
}

fn load_catalog(schema: Option<PathBuf>) -> Result<FacetCatalog, Box<dyn std::error::Error>> {
    match schema {
        Some(path) => {
            let json = fs::read_to_string(&path)?;
            Ok(FacetCatalog::from_json(&json)?)
        }
        None => Ok(FacetCatalog::default()),
    }
}

fn build_engine(
    catalog: FacetCatalog,
    log_usage: bool,
) -> Result<EvaluationEngine, Box<dyn std::error::Error>> {
    let gateway: Arc<dyn ChatGateway> = if log_usage {
        Arc::new(ProviderGateway::from_env(Arc::new(StderrUsageSink))?)
    } else {
        Arc::new(ProviderGateway::from_env(Arc::new(NoopUsageSink))?)
    };
    let oracle = ScoringOracle::new(gateway, OracleConfig::default());
    Ok(EvaluationEngine::new(
        oracle,
        Arc::new(catalog),
        ScoringPolicy::default(),
    ))
}

fn emit(content: String, out: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    match out {
        Some(path) => {
            let mut file = fs::File::create(path)?;
            writeln!(file, "{content}")?;
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let mut p: String = text.chars().take(40).collect();
    if text.chars().count() > 40 {
        p.push('…');
    }
    p
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Eval {
            text,
            file,
            drift,
            schema,
            format,
            out,
        } => {
            let text = match (text, file) {
                (Some(t), _) => t,
                (None, Some(path)) => fs::read_to_string(path)?,
                (None, None) => return Err("eval requires --text or --file".into()),
            };

            let engine = build_engine(load_catalog(schema)?, cli.log_usage)?;
            let options = EvaluateOptions { drift_check: drift };

            let result = engine
                .evaluate_text_with_progress(&text, options, |within| {
                    eprint!("\rscoring: {within:5.1}%");
                })
                .await?;
            eprintln!();

            let content = match format {
                OutputFormat::Json => export::result_to_json(&result)?,
                OutputFormat::Csv => export::result_to_csv(&result),
            };
            emit(content, out)?;
        }
        Commands::Batch {
            file,
            drift,
            schema,
            format,
            out,
        } => {
            let texts: Vec<String> = fs::read_to_string(&file)?
                .lines()
                .map(|l| l.to_string())
                .collect();

            let engine = build_engine(load_catalog(schema)?, cli.log_usage)?;
            let options = EvaluateOptions { drift_check: drift };

            let batch = engine
                .evaluate_batch(&texts, options, |overall, current, within| {
                    eprint!(
                        "\roverall: {overall:5.1}%  [{} {within:5.1}%]",
                        preview(current)
                    );
                })
                .await?;
            eprintln!();

            let content = match format {
                OutputFormat::Json => export::batch_to_json(&batch)?,
                OutputFormat::Csv => export::batch_to_csv(&batch.results),
            };
            emit(content, out)?;
        }
        Commands::Facets { schema } => {
            let catalog = load_catalog(schema)?;
            for facet in catalog.facets() {
                println!("{} / {} — {}", facet.category, facet.id, facet.name);
            }
            eprintln!(
                "{} facets across {} categories",
                catalog.len(),
                catalog.category_names().len()
            );
        }
    }

    Ok(())
}
