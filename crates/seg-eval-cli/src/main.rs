//! seg-eval CLI - segmentation evaluation for challenge submissions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;

use commands::evaluate::EvaluateArgs;
use commands::predict::PredictArgs;

/// Score segmentation submissions against ground truth.
///
/// Without a subcommand, runs `evaluate` with the container defaults.
#[derive(Parser)]
#[command(name = "seg-eval")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    evaluate: EvaluateArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every job in predictions.json and write metrics.json
    Evaluate(EvaluateArgs),

    /// Run the threshold segmentation algorithm on one input
    Predict(PredictArgs),

    /// Show statistics for a written metrics report
    Stats {
        /// metrics.json file
        #[arg(short, long, default_value = "/output/metrics.json")]
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Some(Commands::Evaluate(args)) => commands::evaluate::run(args),
        Some(Commands::Predict(args)) => commands::predict::run(args),
        Some(Commands::Stats { input }) => commands::stats::run(input),
        None => commands::evaluate::run(cli.evaluate),
    }
}
