//! Report types for evaluation results.
//!
//! The metrics report is the document the leaderboard reads. It has two keys,
//! in this order:
//!
//! ```json
//! {
//!     "results": [{"Dice": 0.91}, {"Dice": 0.87}],
//!     "aggregates": {"Dice": 0.89}
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Metric scores of a single job, keyed by metric name.
pub type JobResult = BTreeMap<String, f64>;

/// A job that could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Primary key of the job.
    pub pk: String,
    /// Diagnostic message.
    pub error: String,
}

/// Final evaluation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Per-job scores, in manifest order.
    pub results: Vec<JobResult>,

    /// Mean of every metric present in all results.
    pub aggregates: BTreeMap<String, f64>,

    /// Jobs excluded from the results (isolated failures only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<JobFailure>,

    /// Job keys matching `results`, used for the CSV summary.
    #[serde(skip)]
    pub job_keys: Vec<String>,
}

impl MetricsReport {
    /// Build a report from scored jobs, computing the aggregates.
    pub fn from_results(scored: Vec<(String, JobResult)>, failures: Vec<JobFailure>) -> Result<Self> {
        let (job_keys, results): (Vec<String>, Vec<JobResult>) = scored.into_iter().unzip();
        let aggregates = aggregate(&results)?;
        Ok(Self {
            results,
            aggregates,
            failures,
            job_keys,
        })
    }

    /// Serialize to JSON with four-space indentation.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(|e| Error::Report(e.to_string()))
    }

    /// Write the report as JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Write one CSV row per scored job: `pk` followed by each aggregated metric.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if self.job_keys.len() != self.results.len() {
            return Err(Error::Report(
                "job keys are not available for this report".to_string(),
            ));
        }

        let mut wtr = csv::Writer::from_path(path)?;
        let metrics: Vec<&String> = self.aggregates.keys().collect();

        let mut header = vec!["pk".to_string()];
        header.extend(metrics.iter().map(|m| (*m).clone()));
        wtr.write_record(&header)?;

        for (pk, result) in self.job_keys.iter().zip(&self.results) {
            let mut row = vec![pk.clone()];
            row.extend(
                metrics
                    .iter()
                    .map(|m| result.get(*m).map_or(String::new(), |v| format!("{:.6}", v))),
            );
            wtr.write_record(&row)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Read a previously written report.
    pub fn read_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Mean of every metric present in all results.
///
/// An empty result set has no mean and is rejected with [`Error::EmptyJobSet`].
pub fn aggregate(results: &[JobResult]) -> Result<BTreeMap<String, f64>> {
    let Some(first) = results.first() else {
        return Err(Error::EmptyJobSet);
    };

    Ok(first
        .keys()
        .filter(|name| results.iter().all(|r| r.contains_key(*name)))
        .map(|name| (name.clone(), running_mean(results.iter().map(|r| r[name]))))
        .collect())
}

// Incremental mean; N identical values average to exactly that value.
fn running_mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut mean = 0.0;
    for (k, x) in values.enumerate() {
        mean += (x - mean) / (k + 1) as f64;
    }
    mean
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(pairs: &[(&str, f64)]) -> JobResult {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_aggregate_identical_values() {
        let results = vec![result(&[("Dice", 0.7)]); 5];
        assert_eq!(aggregate(&results).unwrap()["Dice"], 0.7);
    }

    #[test]
    fn test_aggregate_identical_values_is_exact() {
        for (v, n) in [(0.1, 10), (0.9, 7), (1.0 / 3.0, 11)] {
            let results = vec![result(&[("Dice", v)]); n];
            assert_eq!(aggregate(&results).unwrap()["Dice"], v, "v={v} n={n}");
        }
    }

    #[test]
    fn test_aggregate_mean() {
        let results = vec![
            result(&[("Dice", 1.0)]),
            result(&[("Dice", 0.0)]),
            result(&[("Dice", 0.5)]),
        ];
        assert_eq!(aggregate(&results).unwrap()["Dice"], 0.5);
    }

    #[test]
    fn test_aggregate_skips_partial_metrics() {
        let results = vec![
            result(&[("Dice", 1.0), ("Jaccard", 1.0)]),
            result(&[("Dice", 0.5)]),
        ];
        let aggregates = aggregate(&results).unwrap();
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates["Dice"], 0.75);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(matches!(aggregate(&[]), Err(Error::EmptyJobSet)));
    }

    #[test]
    fn test_json_key_order() {
        let report = MetricsReport::from_results(
            vec![("a".to_string(), result(&[("Dice", 1.0)]))],
            Vec::new(),
        )
        .unwrap();
        let json = report.to_json().unwrap();

        let results_at = json.find("\"results\"").unwrap();
        let aggregates_at = json.find("\"aggregates\"").unwrap();
        assert!(results_at < aggregates_at);
        assert!(!json.contains("failures"));
        assert!(json.contains("\n    \"results\""));
    }

    #[test]
    fn test_failures_serialized_when_present() {
        let report = MetricsReport::from_results(
            vec![("a".to_string(), result(&[("Dice", 1.0)]))],
            vec![JobFailure {
                pk: "b".to_string(),
                error: "boom".to_string(),
            }],
        )
        .unwrap();
        let json = report.to_json().unwrap();
        assert!(json.find("\"aggregates\"").unwrap() < json.find("\"failures\"").unwrap());
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        let report = MetricsReport::from_results(
            vec![
                ("a".to_string(), result(&[("Dice", 1.0)])),
                ("b".to_string(), result(&[("Dice", 0.25)])),
            ],
            Vec::new(),
        )
        .unwrap();

        report.write_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "pk,Dice\na,1.000000\nb,0.250000\n");
    }

    #[test]
    fn test_json_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("metrics.json");
        let report = MetricsReport::from_results(
            vec![("a".to_string(), result(&[("Dice", 0.5)]))],
            Vec::new(),
        )
        .unwrap();

        report.write_json(&path).unwrap();
        let read = MetricsReport::read_json(&path).unwrap();
        assert_eq!(read.results, report.results);
        assert_eq!(read.aggregates, report.aggregates);
    }
}
