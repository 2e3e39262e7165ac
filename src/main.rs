mod build;
#[cfg(feature = "serve")]
mod cache;
#[cfg(feature = "serve")]
mod chart;
mod config;
mod dataset;
mod extract;
mod inspect;
mod query;
#[cfg(feature = "serve")]
mod serve;
mod shorten;

use clap::{Parser, Subcommand};
use config::MetricsConfig;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Normalize per-run federated-learning metrics (WER, BLEU) into one dataset,
/// shorten its run identifiers, and answer fixed questions over it.
#[derive(Parser, Debug)]
#[command(name = "flmetrics", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "flmetrics.toml", global = true)]
    config: PathBuf,

    /// Dataset file (overrides config)
    #[arg(short, long, global = true)]
    dataset: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the dataset from the raw metric files
    Build {
        /// Directory of raw metric files (overrides config)
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Where to write the dataset (overrides --dataset and config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Raw file extension (overrides config)
        #[arg(long)]
        extension: Option<String>,
    },
    /// Truncate run_id hash suffixes and rewrite the dataset in place
    Shorten {
        /// Hash characters to keep, 6 to 8 (overrides config)
        #[arg(long)]
        hash_length: Option<usize>,

        /// Print the new run_ids without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Ask about the best model, worst model, or the WER-BLEU tradeoff
    Query {
        text: String,

        /// Restrict the question to these runs (repeatable)
        #[arg(long = "run-id", value_name = "RUN_ID")]
        run_ids: Vec<String>,
    },
    /// Print the dataset
    Inspect {
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Serve the dataset API for the dashboard
    #[cfg(feature = "serve")]
    Serve {
        /// Port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    tracing::debug!(?cli, "parsed CLI arguments");

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "flmetrics=debug"
    } else if quiet {
        "flmetrics=warn"
    } else {
        "flmetrics=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = MetricsConfig::load(&cli.config)?;
    let dataset_path = cli
        .dataset
        .clone()
        .unwrap_or_else(|| config.paths.dataset.clone());

    match cli.command {
        Command::Build {
            raw_dir,
            output,
            extension,
        } => {
            let raw_dir = raw_dir.unwrap_or_else(|| config.paths.raw_dir.clone());
            let extension = extension.unwrap_or_else(|| config.paths.extension.clone());
            let output = output.unwrap_or(dataset_path);
            let report = build::build_dataset(&raw_dir, &extension, &output)?;
            for source in &report.sources {
                tracing::debug!(file = %source.display(), "included");
            }
            println!(
                "Processed {} record(s) into {}",
                report.dataset.len(),
                report.output.display()
            );
        }
        Command::Shorten {
            hash_length,
            dry_run,
        } => {
            let hash_length = hash_length.unwrap_or(config.shorten.hash_length);
            config::validate_hash_length(hash_length)?;

            let original = dataset::load_dataset(&dataset_path)?;
            let shortened = shorten::shorten_run_ids(&original, hash_length)?;
            if dry_run {
                for (before, after) in original.iter().zip(shortened.iter()) {
                    println!("{} -> {}", before.run_id, after.run_id);
                }
                return Ok(());
            }
            dataset::save_dataset(&shortened, &dataset_path)?;
            tracing::info!(
                hash_length,
                records = shortened.len(),
                path = %dataset_path.display(),
                "shortened run_ids"
            );
            println!(
                "Shortened run_id hashes saved to {}",
                dataset_path.display()
            );
        }
        Command::Query { text, run_ids } => {
            let dataset = dataset::load_dataset(&dataset_path)?;
            let view = if run_ids.is_empty() {
                dataset
            } else {
                let ids: HashSet<String> = run_ids.into_iter().collect();
                dataset.filter(&ids)
            };
            println!("{}", query::respond(&text, &view));
        }
        Command::Inspect { json } => {
            let dataset = dataset::load_dataset(&dataset_path)?;
            if json {
                let bytes = dataset::to_json_bytes(&dataset)?;
                print!("{}", String::from_utf8_lossy(&bytes));
            } else {
                let modified = std::fs::metadata(&dataset_path)
                    .and_then(|m| m.modified())
                    .ok();
                println!(
                    "{}",
                    inspect::summary_line(&dataset_path, &dataset, modified)
                );
                print!("{}", inspect::render_table(&dataset));
            }
        }
        #[cfg(feature = "serve")]
        Command::Serve { port, bind } => {
            let mut serve_config = config.serve.clone();
            if let Some(port) = port {
                serve_config.port = port;
            }
            if let Some(bind) = bind {
                serve_config.bind = bind;
            }
            let cache = cache::DatasetCache::new(dataset_path);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve::run(&serve_config, cache))?;
        }
    }

    Ok(())
}
