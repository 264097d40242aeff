use anyhow::Result;
use clap::Parser;
use codeact_eval::annotation::Variant;
use codeact_eval::batch::{self, Corpus};
use codeact_eval::config::Config;
use codeact_eval::output;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "codeact",
    about = "Score LLM vulnerability detectors against CodeAct line annotations"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "codeact.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Score every detector on every annotated sample and write results
    Batch {
        /// Only score these detectors (repeatable)
        #[arg(long)]
        detector: Vec<String>,

        /// Only score these variants (repeatable)
        #[arg(long, value_enum)]
        variant: Vec<Variant>,

        /// Only score these sample ids (repeatable)
        #[arg(long)]
        sample: Vec<String>,

        /// Output directory (overrides [output].dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip per-sample result files
        #[arg(long)]
        summary_only: bool,
    },

    /// Score a single detector on a single sample and print the result
    Sample {
        #[arg(long)]
        detector: String,

        #[arg(long, value_enum)]
        variant: Variant,

        #[arg(long)]
        sample: String,
    },

    /// Print the line index built from one annotation file
    Index {
        #[arg(long, value_enum)]
        variant: Variant,

        #[arg(long)]
        sample: String,
    },
}

/// A missing config file is fine; defaults describe the standard layout.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Ok(Config::load(path)?)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("codeact_eval=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;

    match cli.command {
        Command::Batch {
            detector,
            variant,
            sample,
            output,
            summary_only,
        } => {
            if !detector.is_empty() {
                config.evaluation.detectors = detector;
            }
            if !variant.is_empty() {
                config.corpus.variants = variant;
            }
            if !sample.is_empty() {
                config.corpus.samples = sample;
            }
            if let Some(dir) = output {
                config.output.dir = dir;
            }
            if summary_only {
                config.output.write_samples = false;
            }

            let report = batch::run_batch(&config).await?;
            let summary =
                output::write_batch(&config.output.dir, &report, config.output.write_samples)?;
            print!("{}", output::render_leaderboard(&report));
            println!("Summary written: {}", summary.display());
            Ok(())
        }
        Command::Sample {
            detector,
            variant,
            sample,
        } => {
            let corpus = Corpus::from_config(&config);
            let analysis = corpus.analyze(variant, &sample, &detector)?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(())
        }
        Command::Index { variant, sample } => {
            let corpus = Corpus::from_config(&config);
            let index = corpus.annotations.load(variant, &sample)?;
            println!("{}", serde_json::to_string_pretty(&index)?);
            Ok(())
        }
    }
}
