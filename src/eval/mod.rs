//! Evaluation session and report generation.
//!
//! This module provides the core evaluation infrastructure:
//!
//! - [`session::EvalSession`]: Scores a batch of jobs and writes the report
//! - [`session::EvalConfig`]: Configuration for evaluation
//! - [`report`]: Report types and aggregation

pub mod report;
pub mod session;

pub use report::{JobFailure, JobResult, MetricsReport, aggregate};
pub use session::{EvalConfig, EvalConfigBuilder, EvalSession, FailurePolicy, list_input_files};
