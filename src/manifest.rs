//! Prediction manifest (`predictions.json`) parsing and interface resolution.
//!
//! The manifest is an ordered list of algorithm jobs. Each job lists the
//! values it received (`inputs`) and produced (`outputs`), keyed by interface
//! slug. Records are first deserialized loosely and then validated into
//! [`Job`] values, so a missing required field fails the whole manifest with
//! an error naming the job and the field.
//!
//! ## Example
//!
//! ```rust,ignore
//! use seg_eval::manifest::read_predictions;
//!
//! let jobs = read_predictions("/input/predictions.json".as_ref())?;
//! let location = jobs[0].output_location("/input".as_ref(), "binary-vessel-segmentation")?;
//! let name = jobs[0].input_image_name("oct-image")?;
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Direction, Error, Result};

/// One algorithm job from the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    /// Unique job identifier.
    pub pk: String,
    /// Values the algorithm received, in manifest order.
    pub inputs: Vec<InterfaceValue>,
    /// Values the algorithm produced, in manifest order.
    pub outputs: Vec<InterfaceValue>,
}

/// A value bound to a named interface slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceValue {
    /// The interface this value is bound to.
    pub interface: Interface,
    /// Image attached to the value, if any.
    pub image: Option<ImageRef>,
}

/// A named interface slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interface {
    /// Stable identifier, e.g. `binary-vessel-segmentation`.
    pub slug: String,
    /// Location of the value relative to the job's input or output directory.
    pub relative_path: PathBuf,
}

/// Image attached to an interface value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRef {
    /// User-provided display name of the image.
    pub name: String,
}

impl Job {
    /// Find the value bound to `slug` on the given side of the job.
    fn value(&self, direction: Direction, slug: &str) -> Result<&InterfaceValue> {
        let values = match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        };
        values
            .iter()
            .find(|v| v.interface.slug == slug)
            .ok_or_else(|| Error::InterfaceNotFound {
                slug: slug.to_string(),
                direction,
            })
    }

    /// Relative path of the interface bound to `slug`.
    pub fn relative_path(&self, direction: Direction, slug: &str) -> Result<&Path> {
        Ok(&self.value(direction, slug)?.interface.relative_path)
    }

    /// Where this job's output for `slug` lives inside the evaluation input directory.
    ///
    /// The layout is `<input_root>/<pk>/output/<relative_path>`.
    pub fn output_location(&self, input_root: &Path, slug: &str) -> Result<PathBuf> {
        let relative = self.relative_path(Direction::Output, slug)?;
        Ok(input_root.join(&self.pk).join("output").join(relative))
    }

    /// Display name of the input image bound to `slug`.
    pub fn input_image_name(&self, slug: &str) -> Result<&str> {
        self.value(Direction::Input, slug)?
            .image
            .as_ref()
            .map(|image| image.name.as_str())
            .ok_or_else(|| Error::InterfaceNotFound {
                slug: slug.to_string(),
                direction: Direction::Input,
            })
    }
}

/// Read and validate a predictions manifest.
pub fn read_predictions(path: &Path) -> Result<Vec<Job>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Manifest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let jobs = parse_predictions(&content).map_err(|e| match e {
        Error::Manifest { reason, .. } => Error::Manifest {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })?;
    debug!(path = %path.display(), jobs = jobs.len(), "read predictions manifest");
    Ok(jobs)
}

/// Parse and validate manifest content.
pub fn parse_predictions(content: &str) -> Result<Vec<Job>> {
    let raw: Vec<RawJob> = serde_json::from_str(content).map_err(|e| Error::Manifest {
        path: PathBuf::new(),
        reason: e.to_string(),
    })?;

    raw.into_iter()
        .enumerate()
        .map(|(index, job)| Job::from_raw(index, job))
        .collect()
}

// Loosely typed mirror of the manifest; every field the evaluator needs is
// optional here and checked in `Job::from_raw`.
#[derive(Debug, Deserialize)]
struct RawJob {
    pk: Option<serde_json::Value>,
    inputs: Option<Vec<RawValue>>,
    outputs: Option<Vec<RawValue>>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    interface: Option<RawInterface>,
    image: Option<RawImage>,
}

#[derive(Debug, Deserialize)]
struct RawInterface {
    slug: Option<String>,
    relative_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    name: Option<String>,
}

fn missing(index: usize, field: &str) -> Error {
    Error::Manifest {
        path: PathBuf::new(),
        reason: format!("job {index}: missing required field `{field}`"),
    }
}

impl Job {
    fn from_raw(index: usize, raw: RawJob) -> Result<Self> {
        // Primary keys are UUID strings on the platform, numbers are accepted too.
        let pk = match raw.pk {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(missing(index, "pk")),
        };

        let convert = |values: Option<Vec<RawValue>>, side: &str| -> Result<Vec<InterfaceValue>> {
            values
                .ok_or_else(|| missing(index, side))?
                .into_iter()
                .map(|value| {
                    let interface = value
                        .interface
                        .ok_or_else(|| missing(index, &format!("{side}[].interface")))?;
                    let slug = interface
                        .slug
                        .ok_or_else(|| missing(index, &format!("{side}[].interface.slug")))?;
                    let relative_path = interface.relative_path.ok_or_else(|| {
                        missing(index, &format!("{side}[].interface.relative_path"))
                    })?;
                    Ok(InterfaceValue {
                        interface: Interface {
                            slug,
                            relative_path: PathBuf::from(relative_path),
                        },
                        image: value
                            .image
                            .and_then(|image| image.name)
                            .map(|name| ImageRef { name }),
                    })
                })
                .collect()
        };

        Ok(Self {
            inputs: convert(raw.inputs, "inputs")?,
            outputs: convert(raw.outputs, "outputs")?,
            pk,
        })
    }
}
