//! Threshold segmentation algorithm.
//!
//! The reference algorithm for the example challenge: average the color
//! channels to a grayscale image and binarize it with a fixed threshold. It
//! reads one image from `<input>/images/<slug>/`, reads (and ignores) the
//! JSON metadata inputs, and writes one mask to
//! `<output>/images/<output slug>/<uuid>.mha`.

use std::path::{Path, PathBuf};

use ndarray::{ArrayD, Axis};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::volume::{self, Volume};

/// Default lower bound of the foreground intensity range.
pub const THRESHOLD: f32 = 128.0;

/// Value written for foreground voxels.
pub const INSIDE_VALUE: u8 = 255;

/// Value written for background voxels.
pub const OUTSIDE_VALUE: u8 = 0;

/// Configuration for [`run_algorithm`].
#[derive(Debug, Clone)]
pub struct AlgorithmConfig {
    /// Root of the algorithm inputs.
    pub input_dir: PathBuf,
    /// Root of the algorithm outputs.
    pub output_dir: PathBuf,
    /// Input interface holding the image, under `images/`.
    pub image_slug: String,
    /// Output interface receiving the mask, under `images/`.
    pub output_slug: String,
    /// JSON inputs relative to `input_dir` that must be present.
    pub metadata_files: Vec<PathBuf>,
    /// Lower bound of the foreground intensity range (inclusive).
    pub threshold: f32,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("/input"),
            output_dir: PathBuf::from("/output"),
            image_slug: "color-fundus".to_string(),
            output_slug: "binary-vessel-segmentation".to_string(),
            metadata_files: vec![PathBuf::from("age-in-months.json")],
            threshold: THRESHOLD,
        }
    }
}

/// Run the algorithm once, returning the path of the written mask.
pub fn run_algorithm(config: &AlgorithmConfig) -> Result<PathBuf> {
    let image_dir = config.input_dir.join("images").join(&config.image_slug);
    let image = load_single_image(&image_dir)?;

    for file in &config.metadata_files {
        let value = load_json_file(&config.input_dir.join(file))?;
        debug!(file = %file.display(), value = %value, "metadata input (unused)");
    }

    let mask = convert_to_binary_mask(&image, config.threshold);
    let foreground = mask.iter().filter(|&&v| v == INSIDE_VALUE).count();

    let location = config.output_dir.join("images").join(&config.output_slug);
    let path = write_mask(&location, &mask)?;
    info!(
        path = %path.display(),
        shape = ?mask.shape(),
        foreground,
        "wrote segmentation"
    );
    Ok(path)
}

/// Load the single image in `location`.
pub fn load_single_image(location: &Path) -> Result<Volume> {
    volume::load_image_file(location)
}

/// Read a JSON input.
pub fn load_json_file(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Number of color channels on the trailing axis, or 1 for scalar images.
///
/// Scalar images are rank 2 or rank 3 volumes; a rank-3 array whose last
/// axis has 3 or 4 entries is treated as RGB(A).
#[must_use]
pub fn channel_count(image: &Volume) -> usize {
    match image.shape() {
        [_, _, c] if *c == 3 || *c == 4 => *c,
        [_, _, _, c] => *c,
        _ => 1,
    }
}

/// Average the channels and binarize with `threshold <= value <= 255`.
#[must_use]
pub fn convert_to_binary_mask(image: &Volume, threshold: f32) -> ArrayD<u8> {
    let channels = channel_count(image);
    let gray = if channels > 1 {
        let last = Axis(image.ndim() - 1);
        image.sum_axis(last) / channels as f32
    } else {
        image.clone()
    };

    gray.mapv(|v| {
        if (threshold..=255.0).contains(&v) {
            INSIDE_VALUE
        } else {
            OUTSIDE_VALUE
        }
    })
}

/// Write `mask` into `location` under a random file name.
pub fn write_mask(location: &Path, mask: &ArrayD<u8>) -> Result<PathBuf> {
    std::fs::create_dir_all(location)?;
    let path = location.join(format!("{}.mha", Uuid::new_v4()));
    volume::write_mha(&path, mask, true)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{IxDyn, array};

    #[test]
    fn test_gray_threshold_is_inclusive() {
        let image = array![[127.0_f32, 128.0], [255.0, 256.0]].into_dyn();
        let mask = convert_to_binary_mask(&image, THRESHOLD);
        assert_eq!(mask, array![[0u8, 255], [255, 0]].into_dyn());
    }

    #[test]
    fn test_rgb_channels_are_averaged() {
        // (100 + 200 + 90) / 3 = 130 -> inside; (100 + 100 + 100) / 3 = 100 -> outside
        let image = ArrayD::from_shape_vec(IxDyn(&[1, 2, 3]), vec![100.0, 200.0, 90.0, 100.0, 100.0, 100.0])
            .unwrap();
        let mask = convert_to_binary_mask(&image, THRESHOLD);
        assert_eq!(mask.shape(), &[1, 2]);
        assert_eq!(mask.iter().copied().collect::<Vec<_>>(), vec![255, 0]);
    }

    #[test]
    fn test_channel_count() {
        assert_eq!(channel_count(&ArrayD::zeros(IxDyn(&[4, 4]))), 1);
        assert_eq!(channel_count(&ArrayD::zeros(IxDyn(&[4, 4, 3]))), 3);
        assert_eq!(channel_count(&ArrayD::zeros(IxDyn(&[4, 4, 16]))), 1);
    }

    #[test]
    fn test_run_algorithm() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let image_dir = input.path().join("images/color-fundus");
        std::fs::create_dir_all(&image_dir).unwrap();
        let pixels = ArrayD::from_shape_fn(IxDyn(&[3, 3]), |ix| if ix[0] == 1 { 200u8 } else { 10 });
        volume::write_mha(&image_dir.join("fundus.mha"), &pixels, false).unwrap();
        std::fs::write(input.path().join("age-in-months.json"), "42").unwrap();

        let config = AlgorithmConfig {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            ..AlgorithmConfig::default()
        };
        let path = run_algorithm(&config).unwrap();

        assert!(path.starts_with(output.path().join("images/binary-vessel-segmentation")));
        let mask = volume::load_as_array(&path).unwrap();
        assert_eq!(mask.iter().filter(|&&v| v == 255.0).count(), 3);
    }

    #[test]
    fn test_run_algorithm_requires_metadata() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let image_dir = input.path().join("images/color-fundus");
        volume::write_mha(&image_dir.join("fundus.mha"), &ArrayD::zeros(IxDyn(&[2, 2])), false)
            .unwrap();

        let config = AlgorithmConfig {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            ..AlgorithmConfig::default()
        };
        assert!(run_algorithm(&config).is_err());
    }
}
