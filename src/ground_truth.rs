//! Mapping from input image names to ground-truth files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Immutable table from input image display name to ground-truth file name.
///
/// Every image named in a job's inputs must have an entry; a missing entry
/// means the manifest and the ground truth disagree and is reported as
/// [`Error::NoGroundTruthMapping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruthTable {
    root: PathBuf,
    entries: BTreeMap<String, String>,
}

impl GroundTruthTable {
    /// Create a table rooted at `root`.
    pub fn new<I, K, V>(root: impl Into<PathBuf>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            root: root.into(),
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Table for the retinal vessel segmentation example challenge.
    pub fn retinal_vessel(root: impl Into<PathBuf>) -> Self {
        Self::new(
            root,
            [
                ("11_oct_image.tif", "01_vessel_segmentation.mha"),
                ("12_oct_image.tif", "05_vessel_segmentation.mha"),
                ("13_oct_image.tif", "08_vessel_segmentation.mha"),
            ],
        )
    }

    /// Load a table from a JSON object of `"image name": "ground truth file"` pairs.
    pub fn from_json_file(root: impl Into<PathBuf>, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read ground truth map {}: {}", path.display(), e))
        })?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid ground truth map {}: {}", path.display(), e))
        })?;
        Ok(Self::new(root, entries))
    }

    /// Directory holding the ground-truth files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the ground truth for `image_name`.
    pub fn resolve(&self, image_name: &str) -> Result<PathBuf> {
        self.entries
            .get(image_name)
            .map(|file| self.root.join(file))
            .ok_or_else(|| Error::NoGroundTruthMapping(image_name.to_string()))
    }
}
