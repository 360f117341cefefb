//! Evaluation command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use seg_eval::eval::list_input_files;
use seg_eval::{EvalConfig, EvalSession, FailurePolicy, GroundTruthTable, MetricConfig};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory holding predictions.json and the job outputs
    #[arg(long, env = "SEG_EVAL_INPUT_DIR", default_value = "/input")]
    pub input_dir: PathBuf,

    /// Directory metrics.json is written to
    #[arg(long, env = "SEG_EVAL_OUTPUT_DIR", default_value = "/output")]
    pub output_dir: PathBuf,

    /// Directory holding the ground-truth images
    #[arg(long, env = "SEG_EVAL_GROUND_TRUTH_DIR", default_value = "ground_truth")]
    pub ground_truth_dir: PathBuf,

    /// JSON object mapping input image names to ground-truth files
    /// (defaults to the retinal vessel table)
    #[arg(long, env = "SEG_EVAL_GROUND_TRUTH_MAP")]
    pub ground_truth_map: Option<PathBuf>,

    /// Output interface holding the predicted mask
    #[arg(long, default_value = "binary-vessel-segmentation")]
    pub prediction_slug: String,

    /// Input interface whose image name selects the ground truth
    #[arg(long, default_value = "oct-image")]
    pub input_slug: String,

    /// Metrics to compute (dice, jaccard)
    #[arg(long, default_value = "dice")]
    pub metric: Vec<String>,

    /// Worker threads (0 = available parallelism)
    #[arg(long, env = "SEG_EVAL_WORKERS", default_value_t = 0)]
    pub workers: usize,

    /// What to do when a job fails: fail-fast or isolate
    #[arg(long, env = "SEG_EVAL_FAILURE_POLICY", default_value = "fail-fast")]
    pub failure_policy: String,

    /// Also write metrics.csv
    #[arg(long)]
    pub csv: bool,
}

impl EvaluateArgs {
    fn to_config(&self) -> Result<EvalConfig> {
        let ground_truth = match &self.ground_truth_map {
            Some(map) => GroundTruthTable::from_json_file(&self.ground_truth_dir, map)?,
            None => GroundTruthTable::retinal_vessel(&self.ground_truth_dir),
        };
        let policy: FailurePolicy = self.failure_policy.parse()?;

        Ok(EvalConfig::builder()
            .input_dir(&self.input_dir)
            .output_dir(&self.output_dir)
            .ground_truth(ground_truth)
            .prediction_slug(&self.prediction_slug)
            .input_slug(&self.input_slug)
            .metrics(MetricConfig::from_names(self.metric.as_slice())?)
            .workers(self.workers)
            .failure_policy(policy)
            .csv_summary(self.csv)
            .build())
    }
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let config = args.to_config()?;

    match list_input_files(&config.input_dir) {
        Ok(files) => {
            info!(count = files.len(), "input files");
            for file in &files {
                info!("  {}", file.display());
            }
        }
        Err(e) => warn!(dir = %config.input_dir.display(), error = %e, "cannot list input files"),
    }

    let report = EvalSession::new(config)
        .run()
        .context("Evaluation failed")?;

    println!("Jobs scored: {}", report.results.len());
    if !report.failures.is_empty() {
        println!("Jobs failed: {}", report.failures.len());
    }
    for (name, value) in &report.aggregates {
        println!("{}: {:.6}", name, value);
    }
    Ok(())
}
