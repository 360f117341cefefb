//! Error types for seg-eval operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for seg-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of a job an interface lookup was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Values the algorithm received.
    Input,
    /// Values the algorithm produced.
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The predictions manifest is missing or malformed.
    #[error("Manifest error: {path}: {reason}")]
    Manifest {
        /// Path of the manifest.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// No interface with the requested slug exists in a job.
    #[error("{direction} interface {slug:?} not found")]
    InterfaceNotFound {
        /// Interface slug that was looked up.
        slug: String,
        /// Whether inputs or outputs were searched.
        direction: Direction,
    },

    /// The ground-truth table has no entry for an input image.
    #[error("No ground truth mapping for image {0:?}")]
    NoGroundTruthMapping(String),

    /// Zero or several candidate images were found where exactly one was expected.
    #[error(
        "Could not load a single image from {location}: found {found} candidates \
         (expected exactly one .tif, .tiff or .mha file)"
    )]
    AmbiguousInput {
        /// Directory that was searched.
        location: PathBuf,
        /// Number of candidate files found.
        found: usize,
    },

    /// Failed to load an image file.
    #[error("Image load failed: {path}: {reason}")]
    ImageLoad {
        /// Path to the image that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Unsupported image format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Prediction and ground truth do not have the same shape.
    #[error("Shape mismatch: ground truth {expected:?}, prediction {actual:?}")]
    ShapeMismatch {
        /// Ground-truth shape.
        expected: Vec<usize>,
        /// Prediction shape.
        actual: Vec<usize>,
    },

    /// There are no job results to aggregate.
    #[error("No job results to aggregate")]
    EmptyJobSet,

    /// A step of a single job failed.
    #[error("Job {pk}: {step} failed")]
    Job {
        /// Primary key of the job.
        pk: String,
        /// Processing step that failed.
        step: &'static str,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error writing report files.
    #[error("Report error: {0}")]
    Report(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from the `image` decoder or encoder.
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Attach a job key and processing step to an error.
    pub(crate) fn in_job(self, pk: &str, step: &'static str) -> Self {
        Self::Job {
            pk: pk.to_string(),
            step,
            source: Box::new(self),
        }
    }

    /// This error followed by each of its causes, separated by `": "`.
    #[must_use]
    pub fn display_chain(&self) -> String {
        let mut msg = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            msg.push_str(": ");
            msg.push_str(&cause.to_string());
            source = cause.source();
        }
        msg
    }

    /// Whether this error (or the error it wraps) is a shape mismatch.
    #[must_use]
    pub fn is_shape_mismatch(&self) -> bool {
        match self {
            Self::ShapeMismatch { .. } => true,
            Self::Job { source, .. } => source.is_shape_mismatch(),
            _ => false,
        }
    }
}
