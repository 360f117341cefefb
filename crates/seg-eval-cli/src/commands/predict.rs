//! Threshold algorithm command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use seg_eval::algorithm::THRESHOLD;
use seg_eval::{AlgorithmConfig, run_algorithm};

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Algorithm input directory
    #[arg(long, env = "SEG_EVAL_INPUT_DIR", default_value = "/input")]
    pub input_dir: PathBuf,

    /// Algorithm output directory
    #[arg(long, env = "SEG_EVAL_OUTPUT_DIR", default_value = "/output")]
    pub output_dir: PathBuf,

    /// Input interface holding the image (under images/)
    #[arg(long, default_value = "color-fundus")]
    pub image_slug: String,

    /// Output interface receiving the mask (under images/)
    #[arg(long, default_value = "binary-vessel-segmentation")]
    pub output_slug: String,

    /// JSON inputs that must be present, relative to the input directory
    #[arg(long, default_value = "age-in-months.json")]
    pub metadata: Vec<PathBuf>,

    /// Lower bound of the foreground intensity range
    #[arg(long, default_value_t = THRESHOLD)]
    pub threshold: f32,
}

pub fn run(args: PredictArgs) -> Result<()> {
    let config = AlgorithmConfig {
        input_dir: args.input_dir,
        output_dir: args.output_dir,
        image_slug: args.image_slug,
        output_slug: args.output_slug,
        metadata_files: args.metadata,
        threshold: args.threshold,
    };

    let path = run_algorithm(&config).context("Algorithm failed")?;
    println!("Saved to: {}", path.display());
    Ok(())
}
