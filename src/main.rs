//! # WedExpense receipt CLI (`wedx`)
//!
//! ```bash
//! wedx --config ./config/wedx.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wedx serve` | Start the HTTP API |
//! | `wedx scan <file>` | Run the full scan pipeline on a local file |
//! | `wedx extract <text-file>` | Extract fields and a category from plain text (`-` for stdin) |
//! | `wedx categorize "<text>"` | Categorize a free-text description |
//! | `wedx taxonomy` | List categories and their trigger terms |
//!
//! Logs go to stderr (filter with `RUST_LOG`); command output goes to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wedexpense::config::{self, Config};
use wedexpense::ingest::Ingestor;
use wedexpense::server;
use wedexpense_core::categorize::categorize_text;
use wedexpense_core::extract::extract_fields;
use wedexpense_core::models::{ExtractionResult, UploadedPart, DEFAULT_MEDIA_TYPE};

/// Receipt and vendor-quote ingestion for the WedExpense budget tracker.
#[derive(Parser)]
#[command(name = "wedx", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wedx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Store, recognize and extract a local receipt file; prints JSON.
    Scan {
        file: PathBuf,

        /// Media type of the file. Guessed from the extension when omitted.
        #[arg(long)]
        media_type: Option<String>,
    },

    /// Extract vendor, amount, date and category from recognized text.
    ///
    /// Reads a UTF-8 text file, or stdin when the path is `-`. No external
    /// service is called.
    Extract { file: PathBuf },

    /// Print the category for a free-text expense description.
    Categorize { text: String },

    /// List categories and trigger terms in evaluation order.
    Taxonomy,
}

#[derive(Serialize)]
struct ExtractOutput {
    #[serde(flatten)]
    fields: ExtractionResult,
    category: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let cfg = config::load_config(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::Scan { file, media_type } => {
            let cfg = config::load_config(&cli.config)?;
            let ingestor = Ingestor::from_config(&cfg)?;
            let content = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let part = UploadedPart {
                name: "file".to_string(),
                file_name: file.file_name().map(|n| n.to_string_lossy().into_owned()),
                media_type: media_type.unwrap_or_else(|| guess_media_type(&file).to_string()),
                content,
            };
            let response = ingestor.scan_part(part).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Extract { file } => {
            let cfg = load_or_minimal(&cli.config)?;
            let text = read_text(&file)?;
            let taxonomy = cfg.taxonomy.build();
            let output = ExtractOutput {
                fields: extract_fields(&text),
                category: categorize_text(&taxonomy, &text).category,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Categorize { text } => {
            let cfg = load_or_minimal(&cli.config)?;
            let ingestor = Ingestor::from_config(&cfg)?;
            println!("{}", ingestor.categorize_description(&text).await.category);
        }
        Commands::Taxonomy => {
            let cfg = load_or_minimal(&cli.config)?;
            let taxonomy = cfg.taxonomy.build();
            for category in taxonomy.categories() {
                println!("{}: {}", category.name, category.terms.join(", "));
            }
            println!("(default: {})", taxonomy.default_category());
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wedx=info,wedexpense=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Offline commands run without a config file, but a file that exists must
/// load and validate.
fn load_or_minimal(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::minimal());
    }
    config::load_config(path)
}

fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn guess_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => DEFAULT_MEDIA_TYPE,
    }
}
