//! lithos - planetary-science literature parser and indexer
//!
//! Usage:
//!   lithos extract --in-file abstract.pdf --out-file docs.jsonl
//!   lithos extract --in-list files.txt --out-file docs.jsonl \
//!       --link-method closest_container_closest_containee
//!   lithos index --in-file docs.jsonl --index-url http://localhost:8983/solr/docs

mod pipeline;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lithos_core::AppConfig;

#[derive(Parser)]
#[command(name = "lithos")]
#[command(about = "Entity and relation extraction pipeline for planetary-science literature")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Duplicate log output into this file
    #[arg(short = 'l', long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities and relations from source files into JSON-lines
    Extract(ExtractArgs),
    /// Flatten processed documents and post them to the search index
    Index(IndexArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to a single input file
    #[arg(short = 'i', long)]
    in_file: Option<PathBuf>,

    /// Path to a newline-delimited list of input files
    #[arg(long)]
    in_list: Option<PathBuf>,

    /// Path to the JSON-lines output file
    #[arg(short = 'o', long)]
    out_file: PathBuf,

    /// Document-conversion service URL
    #[arg(long)]
    conversion_url: Option<String>,

    /// Annotation service URL
    #[arg(long)]
    annotation_url: Option<String>,

    /// Path to the domain NER model
    #[arg(short = 'n', long)]
    ner_model: Option<PathBuf>,

    /// Relation linking method: closest_containee, closest_container,
    /// closest_component, closest_target,
    /// closest_container_closest_containee,
    /// closest_target_closest_component, or pairwise
    #[arg(short = 'm', long)]
    link_method: Option<String>,

    /// Trained container-role model
    #[arg(long)]
    container_model: Option<PathBuf>,

    /// Trained containee-role model
    #[arg(long)]
    containee_model: Option<PathBuf>,

    /// Trained pairwise relation model
    #[arg(long)]
    pairwise_model: Option<PathBuf>,
}

#[derive(Args)]
struct IndexArgs {
    /// Path to a JSON-lines dump produced by `lithos extract`
    #[arg(short = 'i', long)]
    in_file: Option<PathBuf>,

    /// Path to a newline-delimited list of JSON-lines dumps
    #[arg(long)]
    in_list: Option<PathBuf>,

    /// Search index core URL
    #[arg(short = 's', long)]
    index_url: Option<String>,

    /// Records per batch post
    #[arg(long)]
    batch_size: Option<usize>,

    /// Skip the commit after each batch
    #[arg(long)]
    no_commit: bool,

    /// Merge with already-indexed records instead of overwriting children
    #[arg(long)]
    update: bool,
}

/// Resolve the mutually exclusive input flags into a file list. Exactly one
/// of `in_file` and `in_list` must be given.
fn resolve_inputs(
    in_file: Option<&Path>,
    in_list: Option<&Path>,
) -> anyhow::Result<Vec<PathBuf>> {
    match (in_file, in_list) {
        (Some(_), Some(_)) => {
            anyhow::bail!("in_file and in_list cannot be provided simultaneously")
        }
        (None, None) => anyhow::bail!("one of in_file or in_list is required"),
        (Some(file), None) => Ok(vec![file.to_path_buf()]),
        (None, Some(list)) => {
            let content = std::fs::read_to_string(list)?;
            Ok(content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(PathBuf::from)
                .collect())
        }
    }
}

fn init_logging(level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    }
    .with_env_override()?;

    init_logging(&config.logging.level, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Extract(args) => {
            let files = resolve_inputs(args.in_file.as_deref(), args.in_list.as_deref())?;
            pipeline::run_extract(config, args, files).await
        }
        Commands::Index(args) => {
            let files = resolve_inputs(args.in_file.as_deref(), args.in_list.as_deref())?;
            pipeline::run_index(config, args, files).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("[ERROR] {e:#}");
        std::process::exit(1);
    }
}
