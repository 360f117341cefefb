//! Descriptive statistics over per-job scores.
//!
//! The leaderboard only consumes the mean; the spread of per-job scores is
//! useful when inspecting a submission locally (`seg-eval stats`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::eval::report::JobResult;

/// Descriptive statistics for a set of scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of values.
    pub count: usize,
    /// Mean value.
    pub mean: f64,
    /// Median value.
    pub median: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// 25th percentile.
    pub p25: f64,
    /// 75th percentile.
    pub p75: f64,
}

impl Summary {
    /// Compute summary statistics for a slice of values.
    ///
    /// Returns `None` if the slice is empty.
    #[must_use]
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let sorted = sorted(values);
        Some(Self {
            count: sorted.len(),
            mean: mean(&sorted),
            median: percentile_sorted(&sorted, 0.5),
            std_dev: std_dev(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p25: percentile_sorted(&sorted, 0.25),
            p75: percentile_sorted(&sorted, 0.75),
        })
    }
}

/// Summary per metric name across job results.
///
/// Jobs missing a metric do not contribute to that metric's summary.
#[must_use]
pub fn summarize_results(results: &[JobResult]) -> BTreeMap<String, Summary> {
    let mut by_metric: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for result in results {
        for (name, value) in result {
            by_metric.entry(name.clone()).or_default().push(*value);
        }
    }

    by_metric
        .into_iter()
        .filter_map(|(name, values)| Summary::compute(&values).map(|s| (name, s)))
        .collect()
}

/// Compute arithmetic mean.
///
/// # Example
///
/// ```
/// use seg_eval::stats::mean;
///
/// assert!((mean(&[1.0, 2.0, 3.0, 4.0, 5.0]) - 3.0).abs() < 0.001);
/// ```
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compute median of a slice.
///
/// For even-length slices, returns the average of the two middle values.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    percentile(values, 0.5)
}

/// Compute sample standard deviation (N-1 denominator).
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Compute percentile using linear interpolation (R-7 method).
///
/// `p` is in the range 0.0 to 1.0.
///
/// # Example
///
/// ```
/// use seg_eval::stats::percentile;
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert!((percentile(&values, 0.25) - 2.0).abs() < 0.001);
/// ```
#[must_use]
pub fn percentile(values: &[f64], p: f64) -> f64 {
    percentile_sorted(&sorted(values), p)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let idx = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
            let lower = idx.floor() as usize;
            let upper = idx.ceil() as usize;
            let frac = idx - lower as f64;
            sorted[lower] * (1.0 - frac) + sorted[upper] * frac
        }
    }
}
