//! zipserver CLI
//!
//! Runs extraction jobs against the storage named in the config file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use zipserver::analyzer::{AnalyzeError, AnalyzerKind};
use zipserver::config::Config;
use zipserver::ExtractLimits;

#[derive(Parser)]
#[command(name = "zipserver")]
#[command(version)]
#[command(about = "Extract zip uploads into an object store, with limits and rollback")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (storage, bucket, default limits, rules)
    #[arg(short, long, global = true, env = "ZIPSERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines, one object per event
    #[arg(long, global = true)]
    log_json: bool,
}

/// Per-job overrides of the configured limits
#[derive(Args)]
struct LimitArgs {
    /// Maximum uncompressed size of one file, in bytes
    #[arg(long)]
    max_file_size: Option<u64>,

    /// Maximum uncompressed size of the whole archive, in bytes
    #[arg(long)]
    max_total_size: Option<u64>,

    /// Maximum number of entries
    #[arg(long)]
    max_num_files: Option<usize>,

    /// Maximum path length, in characters
    #[arg(long)]
    max_file_name_length: Option<usize>,

    /// Concurrent extraction workers
    #[arg(short, long)]
    threads: Option<usize>,
}

impl LimitArgs {
    fn apply(&self, mut limits: ExtractLimits) -> ExtractLimits {
        if let Some(v) = self.max_file_size {
            limits.max_file_size = v;
        }
        if let Some(v) = self.max_total_size {
            limits.max_total_size = v;
        }
        if let Some(v) = self.max_num_files {
            limits.max_num_files = v;
        }
        if let Some(v) = self.max_file_name_length {
            limits.max_file_name_length = v;
        }
        if let Some(v) = self.threads {
            limits.extraction_threads = v;
        }
        limits
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract an archive from the bucket into a prefix
    Extract {
        /// Key of the zip archive in the bucket
        archive: String,

        /// Destination prefix for extracted files
        prefix: String,

        #[command(flatten)]
        limits: LimitArgs,

        /// Override the configured analyzer
        #[arg(long, value_enum)]
        analyzer: Option<AnalyzerKind>,

        /// Print the extracted resources as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the entries of an archive in the bucket
    List {
        /// Key of the zip archive in the bucket
        archive: String,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run an analyzer on a local file
    Analyze {
        /// File to analyze
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = AnalyzerKind::Game)]
        analyzer: AnalyzerKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only initialize logging if asked for or RUST_LOG is set
    if cli.verbose || cli.log_json || std::env::var("RUST_LOG").is_ok() {
        let filter = EnvFilter::from_default_env()
            .add_directive(if cli.verbose { "zipserver=debug".parse()? } else { "zipserver=warn".parse()? });

        if cli.log_json {
            tracing_subscriber::fmt().json().with_env_filter(filter).init();
        } else {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    let mut config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract {
            archive,
            prefix,
            limits,
            analyzer,
            json,
        } => {
            if let Some(kind) = analyzer {
                config.analyzer = kind;
            }
            let limits = limits.apply(config.limits());
            let archiver = config.build_archiver()?;

            let resources = archiver
                .extract_zip(&archive, &prefix, &limits)
                .await
                .with_context(|| format!("Failed to extract {}/{}", archiver.bucket(), archive))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&resources)?);
            } else {
                for resource in &resources {
                    println!("{}", resource);
                }
                eprintln!("\nExtracted {} files to {}", resources.len(), prefix);
            }
        }

        Commands::List { archive, json } => {
            let archiver = config.build_archiver()?;
            let entries = archiver.list_zip(&archive).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{:>12}  {:>12}  {}", entry.size, entry.compressed_size, entry.name);
                }
                eprintln!("\nTotal: {} entries", entries.len());
            }
        }

        Commands::Analyze { file, analyzer } => {
            let key = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let mut reader = std::fs::File::open(&file).with_context(|| format!("Failed to open {:?}", file))?;

            match analyzer.build().analyze(&mut reader, &key) {
                Ok(res) => {
                    println!("Key:              {}", res.key);
                    println!("Content-Type:     {}", res.content_type);
                    if let Some(encoding) = &res.content_encoding {
                        println!("Content-Encoding: {}", encoding);
                    }
                    if let Some(metadata) = &res.metadata {
                        println!("Metadata:         {}", serde_json::to_string_pretty(metadata)?);
                    }
                }
                Err(AnalyzeError::Skipped(reason)) => {
                    println!("Skipped by {} analyzer: {}", analyzer, reason);
                }
                Err(e) => return Err(e).with_context(|| format!("Failed to analyze {:?}", file)),
            }
        }
    }

    Ok(())
}
