//! Statistics command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use seg_eval::MetricsReport;
use seg_eval::stats::summarize_results;

pub fn run(input: PathBuf) -> Result<()> {
    let report = MetricsReport::read_json(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    println!("Jobs: {}", report.results.len());
    if !report.failures.is_empty() {
        println!("Failed jobs: {}", report.failures.len());
        for failure in &report.failures {
            println!("  {}: {}", failure.pk, failure.error);
        }
    }
    println!();

    println!(
        "{:<10} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Metric", "Count", "Mean", "Median", "StdDev", "Min", "Max"
    );
    println!("{:-<74}", "");

    for (name, summary) in summarize_results(&report.results) {
        println!(
            "{:<10} {:>8} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            name,
            summary.count,
            summary.mean,
            summary.median,
            summary.std_dev,
            summary.min,
            summary.max
        );
    }

    println!();
    println!("Aggregates: {}", serde_json::to_string(&report.aggregates)?);
    Ok(())
}
