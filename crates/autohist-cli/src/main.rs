//! `autohist`: labeled histograms over the entities of a record table.

mod display;
mod models;
mod pipeline;

use std::path::PathBuf;

use anyhow::Context;
use autohist_store::{ArtifactDir, read_records};
use clap::{Parser, Subcommand};

use models::ModelArgs;

#[derive(Parser)]
#[command(name = "autohist", version, about = "Automatic labeled histograms over free-text records")]
struct Cli {
    /// JSON file overriding clustering, labeling and cache tunables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build histograms from a Parquet table of per-record entity lists
    Run {
        /// Parquet file, one row per record
        records: PathBuf,

        /// List<Utf8> column holding each record's entities
        #[arg(long, default_value = "entities")]
        column: String,

        /// Output directory (replaced)
        #[arg(long, short)]
        out: PathBuf,

        #[command(flatten)]
        models: ModelArgs,
    },

    /// Print the histograms of an output directory
    Show {
        artifact: PathBuf,

        /// Print histograms.json instead of the text summary
        #[arg(long)]
        json: bool,
    },

    /// Find histogram labels close to a query
    Search {
        artifact: PathBuf,

        query: String,

        #[command(flatten)]
        models: ModelArgs,
    },

    /// Build a histogram for a new category without reclustering
    Classify {
        artifact: PathBuf,

        category: String,

        /// Strictness in (0, 1]; overrides entity_label_confidence
        #[arg(long)]
        confidence: Option<f32>,

        #[command(flatten)]
        models: ModelArgs,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = pipeline::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            records,
            column,
            out,
            models,
        } => {
            let rows = read_records(&records, &column)
                .with_context(|| format!("reading records from {}", records.display()))?;
            eprintln!("  Read {} records from {}", rows.len(), records.display());

            let mut llm = models.language_model(&config)?;
            let stats = pipeline::run_pipeline(
                &rows,
                models.embedder()?,
                &mut llm,
                &models.cache_file(),
                &ArtifactDir::new(&out),
                &config,
            )?;
            eprintln!(
                "Wrote {} histograms over {} entities to {} in {:.1}s ({} cached embeddings)",
                stats.histograms,
                stats.entities,
                out.display(),
                stats.elapsed_secs,
                stats.cached
            );
        }

        Command::Show { artifact, json } => {
            let artifact = ArtifactDir::new(&artifact)
                .read_artifact()
                .context("reading histograms")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&artifact)?);
            } else {
                display::print_histograms(&artifact);
            }
        }

        Command::Search {
            artifact,
            query,
            models,
        } => {
            let cache_file = models.cache_file();
            let mut provider = pipeline::open_provider(models.embedder()?, &cache_file, &config)?;
            let hits = pipeline::search_descriptions(
                &ArtifactDir::new(&artifact),
                &query,
                &mut provider,
                &config,
            )?;
            pipeline::finish_query(&provider, &cache_file)?;
            display::print_search_hits(&query, &hits);
        }

        Command::Classify {
            artifact,
            category,
            confidence,
            models,
        } => {
            if let Some(c) = confidence {
                config.entity_label_confidence = c;
                config.validate()?;
            }
            let cache_file = models.cache_file();
            let mut provider = pipeline::open_provider(models.embedder()?, &cache_file, &config)?;
            let mut llm = models.language_model(&config)?;
            let (classification, ids) = pipeline::classify_category(
                &ArtifactDir::new(&artifact),
                &category,
                &mut provider,
                &mut llm,
                &config,
            )?;
            pipeline::finish_query(&provider, &cache_file)?;
            display::print_classification(&classification, &ids);
        }
    }

    Ok(())
}
