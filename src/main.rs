//! # ragflow CLI
//!
//! Ingests a directory of documents into a vector index and answers
//! questions grounded in the retrieved chunks.
//!
//! ## Usage
//!
//! ```bash
//! ragflow --config ./config/ragflow.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragflow ingest` | Load, chunk, embed and index everything in `[data].dir` |
//! | `ragflow query "<question>"` | Answer a question from the index |
//! | `ragflow chunk <file>` | Show the chunk windows for one file |
//! | `ragflow status` | Show the collection entry count |
//! | `ragflow serve` | Ingest at startup, then serve the HTTP API |
//!
//! Without `--config`, `./config/ragflow.toml` is used when present and the
//! built-in defaults otherwise.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use ragflow::chunk::chunk_document;
use ragflow::config::{self, Config};
use ragflow::loader::{load_documents, load_file, LoadOutcome};
use ragflow::observability::init_logging;
use ragflow::pipeline::Pipeline;
use ragflow::server;

const DEFAULT_CONFIG: &str = "./config/ragflow.toml";

/// ragflow: document ingestion and retrieval-augmented question answering.
#[derive(Parser)]
#[command(name = "ragflow", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-ingest every supported file in the data directory.
    Ingest {
        /// Show document and chunk counts without touching the index.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question from the indexed documents.
    Query {
        /// The question to answer.
        question: String,
    },

    /// Print the chunk windows produced for a single file.
    Chunk {
        /// File to load and chunk.
        file: PathBuf,
    },

    /// Show the collection and its entry count.
    Status,

    /// Run startup ingestion, then serve the HTTP API on `[server].bind`.
    Serve,
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => config::load_config(p),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            config::load_config(Path::new(DEFAULT_CONFIG))
        }
        None => {
            info!("No config file found, using defaults");
            Ok(Config::minimal())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { dry_run: true } => {
            let docs = load_documents(&cfg.data.dir)?;
            let chunks: usize = docs
                .iter()
                .map(|d| chunk_document(d, &cfg.chunking).len())
                .sum();
            println!("ingest (dry-run)");
            println!("  documents: {}", docs.len());
            println!("  chunks: {}", chunks);
        }
        Commands::Ingest { dry_run: false } => {
            let pipeline = Pipeline::from_config(cfg, false)?;
            let report = pipeline.ingest_directory().await?;
            println!("ingest");
            println!("  collection: {}", report.collection.name);
            println!("  documents: {}", report.documents);
            println!("  chunks: {}", report.chunks);
            println!("ok");
        }
        Commands::Query { question } => {
            let pipeline = Pipeline::from_config(cfg, true)?;
            let response = pipeline.query(&question).await?;
            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &response.sources {
                    println!("  - {}", source.source);
                }
            }
        }
        Commands::Chunk { file } => match load_file(&file) {
            LoadOutcome::Loaded(doc) => {
                let chunks = chunk_document(&doc, &cfg.chunking);
                println!("{} ({} chunks)", doc.id, chunks.len());
                for chunk in &chunks {
                    println!(
                        "  {}  [{}, {})  {} chars",
                        chunk.id,
                        chunk.offset_start,
                        chunk.offset_end,
                        chunk.offset_end - chunk.offset_start
                    );
                }
            }
            LoadOutcome::Unsupported => bail!("Unsupported file type: {}", file.display()),
            LoadOutcome::Empty => bail!("No readable text in {}", file.display()),
        },
        Commands::Status => {
            let pipeline = Pipeline::from_config(cfg, false)?;
            let status = pipeline.status().await?;
            println!("collection: {}", status.collection);
            println!("entries: {}", status.entries);
        }
        Commands::Serve => {
            let pipeline = Arc::new(Pipeline::from_config(cfg, true)?);
            let report = pipeline.startup().await?;
            println!(
                "Indexed {} documents ({} chunks) into '{}'",
                report.documents, report.chunks, report.collection.name
            );
            server::run_server(pipeline).await?;
        }
    }

    Ok(())
}
