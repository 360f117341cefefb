//! Evaluation session over a batch of algorithm jobs.
//!
//! This module provides [`EvalSession`], the main entry point for evaluation.
//! The session reads the predictions manifest, scores every job on a bounded
//! worker pool, aggregates the scores and writes the metrics report.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::eval::report::{JobFailure, JobResult, MetricsReport};
use crate::ground_truth::GroundTruthTable;
use crate::manifest::{Job, read_predictions};
use crate::metrics::{self, MetricConfig};
use crate::volume;

/// What to do when a single job cannot be scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole run on the first failing job; no report is written.
    #[default]
    FailFast,
    /// Record the failure, leave the job out of the results and keep going.
    Isolate,
}

impl std::str::FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" | "abort" => Ok(Self::FailFast),
            "isolate" | "continue" => Ok(Self::Isolate),
            other => Err(Error::Config(format!("unknown failure policy {other:?}"))),
        }
    }
}

/// Configuration for an evaluation session.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Directory holding `predictions.json` and the per-job outputs.
    pub input_dir: PathBuf,

    /// Directory the metrics report is written to.
    pub output_dir: PathBuf,

    /// Image name to ground-truth file table.
    pub ground_truth: GroundTruthTable,

    /// Output interface holding the predicted mask.
    pub prediction_slug: String,

    /// Input interface whose image name selects the ground truth.
    pub input_slug: String,

    /// Which metrics to calculate.
    pub metrics: MetricConfig,

    /// Worker threads; `None` uses the available parallelism.
    pub workers: Option<usize>,

    /// Behavior on job failure.
    pub failure_policy: FailurePolicy,

    /// Also write `metrics.csv` next to `metrics.json`.
    pub csv_summary: bool,
}

impl EvalConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EvalConfigBuilder {
        EvalConfigBuilder::default()
    }

    /// Location of the predictions manifest.
    #[must_use]
    pub fn predictions_path(&self) -> PathBuf {
        self.input_dir.join("predictions.json")
    }

    /// Location of the metrics report.
    #[must_use]
    pub fn metrics_path(&self) -> PathBuf {
        self.output_dir.join("metrics.json")
    }
}

/// Builder for [`EvalConfig`].
///
/// Unset fields fall back to the container conventions: `/input`, `/output`,
/// the retinal vessel ground truth under `ground_truth/`, the
/// `binary-vessel-segmentation` output and the `oct-image` input.
#[derive(Debug, Default)]
pub struct EvalConfigBuilder {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    ground_truth: Option<GroundTruthTable>,
    prediction_slug: Option<String>,
    input_slug: Option<String>,
    metrics: Option<MetricConfig>,
    workers: Option<usize>,
    failure_policy: Option<FailurePolicy>,
    csv_summary: bool,
}

impl EvalConfigBuilder {
    /// Set the input directory.
    #[must_use]
    pub fn input_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(path.into());
        self
    }

    /// Set the output directory.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the ground-truth table.
    #[must_use]
    pub fn ground_truth(mut self, table: GroundTruthTable) -> Self {
        self.ground_truth = Some(table);
        self
    }

    /// Set the output interface holding predictions.
    #[must_use]
    pub fn prediction_slug(mut self, slug: impl Into<String>) -> Self {
        self.prediction_slug = Some(slug.into());
        self
    }

    /// Set the input interface used for the ground-truth lookup.
    #[must_use]
    pub fn input_slug(mut self, slug: impl Into<String>) -> Self {
        self.input_slug = Some(slug.into());
        self
    }

    /// Set which metrics to calculate.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricConfig) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the failure policy.
    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    /// Enable or disable the CSV summary.
    #[must_use]
    pub fn csv_summary(mut self, enabled: bool) -> Self {
        self.csv_summary = enabled;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> EvalConfig {
        EvalConfig {
            input_dir: self.input_dir.unwrap_or_else(|| PathBuf::from("/input")),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("/output")),
            ground_truth: self
                .ground_truth
                .unwrap_or_else(|| GroundTruthTable::retinal_vessel("ground_truth")),
            prediction_slug: self
                .prediction_slug
                .unwrap_or_else(|| "binary-vessel-segmentation".to_string()),
            input_slug: self.input_slug.unwrap_or_else(|| "oct-image".to_string()),
            metrics: self.metrics.unwrap_or_default(),
            workers: self.workers.filter(|&n| n > 0),
            failure_policy: self.failure_policy.unwrap_or_default(),
            csv_summary: self.csv_summary,
        }
    }
}

/// Evaluation session.
///
/// # Example
///
/// ```rust,ignore
/// use seg_eval::{EvalConfig, EvalSession};
///
/// let config = EvalConfig::builder()
///     .input_dir("./test/input")
///     .output_dir("./test/output")
///     .build();
///
/// let report = EvalSession::new(config).run()?;
/// println!("{:?}", report.aggregates);
/// ```
pub struct EvalSession {
    config: EvalConfig,
}

impl EvalSession {
    /// Create a new evaluation session.
    #[must_use]
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Read the manifest, score every job and write the report.
    pub fn run(&self) -> Result<MetricsReport> {
        let jobs = read_predictions(&self.config.predictions_path())?;
        info!(jobs = jobs.len(), "loaded predictions");

        let report = self.evaluate(&jobs)?;
        self.write_report(&report)?;
        Ok(report)
    }

    /// Score all jobs on the worker pool and aggregate the results.
    ///
    /// Jobs are independent; results keep manifest order regardless of which
    /// worker finishes first.
    pub fn evaluate(&self, jobs: &[Job]) -> Result<MetricsReport> {
        if jobs.is_empty() {
            return Err(Error::EmptyJobSet);
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(workers) = self.config.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to start worker pool: {e}")))?;

        let (scored, failures) = score_jobs(&pool, jobs, self.config.failure_policy, |job| {
            self.process_job(job)
        })?;

        let report = MetricsReport::from_results(scored, failures)?;
        for (name, value) in &report.aggregates {
            info!(metric = %name, mean = value, "aggregate");
        }
        Ok(report)
    }

    /// Score a single job.
    ///
    /// Errors are wrapped in [`Error::Job`] naming the job and the step that
    /// failed.
    pub fn process_job(&self, job: &Job) -> Result<JobResult> {
        debug!(pk = %job.pk, inputs = job.inputs.len(), outputs = job.outputs.len(), "processing job");
        let pk = job.pk.as_str();

        let location = job
            .output_location(&self.config.input_dir, &self.config.prediction_slug)
            .map_err(|e| e.in_job(pk, "locate output"))?;

        let prediction =
            volume::load_image_file(&location).map_err(|e| e.in_job(pk, "load prediction"))?;

        let image_name = job
            .input_image_name(&self.config.input_slug)
            .map_err(|e| e.in_job(pk, "locate input"))?;

        let ground_truth_path = self
            .config
            .ground_truth
            .resolve(image_name)
            .map_err(|e| e.in_job(pk, "resolve ground truth"))?;

        let ground_truth = volume::load_as_array(&ground_truth_path)
            .map_err(|e| e.in_job(pk, "load ground truth"))?;

        let result = metrics::calculate(&self.config.metrics, &ground_truth, &prediction)
            .map_err(|e| e.in_job(pk, "compute metrics"))?;

        info!(pk, image = image_name, scores = ?result, "scored job");
        Ok(result)
    }

    /// Write the report (and CSV summary, if enabled) to the output directory.
    pub fn write_report(&self, report: &MetricsReport) -> Result<()> {
        let path = self.config.metrics_path();
        report.write_json(&path)?;
        info!(path = %path.display(), "wrote metrics");

        if self.config.csv_summary {
            let csv_path = self.config.output_dir.join("metrics.csv");
            report.write_csv(&csv_path)?;
            info!(path = %csv_path.display(), "wrote csv summary");
        }
        Ok(())
    }
}

/// Run `score` over every job on `pool`, keeping manifest order.
///
/// Under [`FailurePolicy::FailFast`] no further jobs are started once one has
/// failed, and that error is returned. Under [`FailurePolicy::Isolate`] every
/// job runs and failures are returned alongside the scored jobs.
fn score_jobs<F>(
    pool: &rayon::ThreadPool,
    jobs: &[Job],
    policy: FailurePolicy,
    score: F,
) -> Result<(Vec<(String, JobResult)>, Vec<JobFailure>)>
where
    F: Fn(&Job) -> Result<JobResult> + Sync,
{
    match policy {
        FailurePolicy::FailFast => {
            let results = pool.install(|| jobs.par_iter().map(&score).collect::<Result<Vec<_>>>())?;
            let scored = jobs.iter().map(|job| job.pk.clone()).zip(results).collect();
            Ok((scored, Vec::new()))
        }
        FailurePolicy::Isolate => {
            let outcomes: Vec<Result<JobResult>> =
                pool.install(|| jobs.par_iter().map(&score).collect());

            let mut scored = Vec::with_capacity(jobs.len());
            let mut failures = Vec::new();
            for (job, outcome) in jobs.iter().zip(outcomes) {
                match outcome {
                    Ok(result) => scored.push((job.pk.clone(), result)),
                    Err(e) => {
                        let error = e.display_chain();
                        warn!(pk = %job.pk, %error, "job failed, excluded from aggregates");
                        failures.push(JobFailure {
                            pk: job.pk.clone(),
                            error,
                        });
                    }
                }
            }
            Ok((scored, failures))
        }
    }
}

/// Every regular file below `root`, sorted.
pub fn list_input_files(root: &Path) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                walk(&path, files)?;
            } else if path.is_file() {
                files.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(root, &mut files)?;
    files.sort();
    Ok(files)
}
