//! # seg-eval
//!
//! Batch evaluation of segmentation submissions for challenge platforms.
//!
//! An evaluation run reads a predictions manifest listing the algorithm jobs
//! of one submission, loads each job's predicted mask together with the
//! matching ground truth, scores every pair (Dice by default), and writes a
//! metrics report holding the per-job scores and their means.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seg_eval::{EvalConfig, EvalSession, GroundTruthTable};
//!
//! let config = EvalConfig::builder()
//!     .input_dir("/input")
//!     .output_dir("/output")
//!     .ground_truth(GroundTruthTable::retinal_vessel("ground_truth"))
//!     .build();
//!
//! let report = EvalSession::new(config).run()?;
//! println!("Dice: {}", report.aggregates["Dice"]);
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`manifest`]: Predictions manifest and interface resolution
//! - [`ground_truth`]: Image name to ground-truth file table
//! - [`volume`]: TIFF and MetaImage loading
//! - [`metrics`]: Overlap metrics (Dice, Jaccard)
//! - [`eval`]: Evaluation session and report generation
//! - [`stats`]: Descriptive statistics over scores
//! - [`algorithm`]: Threshold segmentation algorithm

pub mod algorithm;
pub mod error;
pub mod eval;
pub mod ground_truth;
pub mod manifest;
pub mod metrics;
pub mod stats;
pub mod volume;

// Re-export commonly used types
pub use algorithm::{AlgorithmConfig, run_algorithm};
pub use error::{Error, Result};
pub use eval::{
    report::{JobFailure, JobResult, MetricsReport},
    session::{EvalConfig, EvalSession, FailurePolicy},
};
pub use ground_truth::GroundTruthTable;
pub use manifest::{Job, read_predictions};
pub use metrics::{Metric, MetricConfig, dice};
pub use stats::Summary;
pub use volume::Volume;
