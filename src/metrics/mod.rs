//! Overlap metrics for binary segmentation masks.
//!
//! Both arrays are coerced to boolean masks (nonzero = foreground) before
//! comparison. Supported metrics:
//!
//! - **Dice**: `2|A∩B| / (|A| + |B|)` (higher is better, 1 = identical)
//! - **Jaccard**: `|A∩B| / |A∪B|` (higher is better, 1 = identical)
//!
//! ## Empty masks
//!
//! When both masks are empty the ratios are `0/0`. Both metrics return `1.0`
//! in that case: the prediction agrees with the ground truth that nothing is
//! present.

use std::collections::BTreeMap;

use ndarray::{ArrayBase, Data, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Score reported when both masks are empty.
pub const EMPTY_MASK_SCORE: f64 = 1.0;

/// A metric that can appear in a job result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Sørensen-Dice coefficient.
    Dice,
    /// Jaccard index (intersection over union).
    Jaccard,
}

impl Metric {
    /// Name used as the key in reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Dice => "Dice",
            Self::Jaccard => "Jaccard",
        }
    }

    /// Parse a metric name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dice" => Some(Self::Dice),
            "jaccard" | "iou" => Some(Self::Jaccard),
            _ => None,
        }
    }

    /// Score for the given overlap counts.
    #[must_use]
    pub fn score(self, overlap: &Overlap) -> f64 {
        match self {
            Self::Dice => overlap.dice(),
            Self::Jaccard => overlap.jaccard(),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for which metrics to calculate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Calculate the Dice coefficient.
    pub dice: bool,
    /// Calculate the Jaccard index.
    pub jaccard: bool,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self::dice_only()
    }
}

impl MetricConfig {
    /// Calculate all available metrics.
    #[must_use]
    pub fn all() -> Self {
        Self {
            dice: true,
            jaccard: true,
        }
    }

    /// Dice only, the leaderboard default.
    #[must_use]
    pub fn dice_only() -> Self {
        Self {
            dice: true,
            jaccard: false,
        }
    }

    /// Build a configuration from metric names such as `["Dice", "Jaccard"]`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut config = Self {
            dice: false,
            jaccard: false,
        };
        for name in names {
            match Metric::from_name(name.as_ref()) {
                Some(Metric::Dice) => config.dice = true,
                Some(Metric::Jaccard) => config.jaccard = true,
                None => {
                    return Err(Error::Config(format!("unknown metric {:?}", name.as_ref())));
                }
            }
        }
        if config.enabled().is_empty() {
            return Err(Error::Config("no metrics selected".to_string()));
        }
        Ok(config)
    }

    /// Enabled metrics in report order.
    #[must_use]
    pub fn enabled(&self) -> Vec<Metric> {
        let mut metrics = Vec::new();
        if self.dice {
            metrics.push(Metric::Dice);
        }
        if self.jaccard {
            metrics.push(Metric::Jaccard);
        }
        metrics
    }
}

/// Foreground counts of two masks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overlap {
    /// Voxels that are foreground in both masks.
    pub intersection: u64,
    /// Foreground voxels in the ground truth.
    pub ground_truth: u64,
    /// Foreground voxels in the prediction.
    pub prediction: u64,
}

impl Overlap {
    /// Count foreground overlap between two arrays of the same shape.
    pub fn count<S1, S2, D>(
        ground_truth: &ArrayBase<S1, D>,
        prediction: &ArrayBase<S2, D>,
    ) -> Result<Self>
    where
        S1: Data<Elem = f32>,
        S2: Data<Elem = f32>,
        D: Dimension,
    {
        if ground_truth.shape() != prediction.shape() {
            return Err(Error::ShapeMismatch {
                expected: ground_truth.shape().to_vec(),
                actual: prediction.shape().to_vec(),
            });
        }

        let mut overlap = Self::default();
        for (&g, &p) in ground_truth.iter().zip(prediction.iter()) {
            let g = g != 0.0;
            let p = p != 0.0;
            overlap.ground_truth += u64::from(g);
            overlap.prediction += u64::from(p);
            overlap.intersection += u64::from(g && p);
        }
        Ok(overlap)
    }

    /// Dice coefficient, [`EMPTY_MASK_SCORE`] when both masks are empty.
    #[must_use]
    pub fn dice(&self) -> f64 {
        let total = self.ground_truth + self.prediction;
        if total == 0 {
            return EMPTY_MASK_SCORE;
        }
        (2.0 * self.intersection as f64) / total as f64
    }

    /// Jaccard index, [`EMPTY_MASK_SCORE`] when both masks are empty.
    #[must_use]
    pub fn jaccard(&self) -> f64 {
        let union = self.ground_truth + self.prediction - self.intersection;
        if union == 0 {
            return EMPTY_MASK_SCORE;
        }
        self.intersection as f64 / union as f64
    }
}

/// Dice coefficient between a ground truth and a prediction.
///
/// Returns a value in `[0, 1]`. Arrays of different shapes are rejected with
/// [`Error::ShapeMismatch`].
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use seg_eval::metrics::dice;
///
/// let gt = array![[1.0_f32, 1.0], [0.0, 0.0]];
/// let pred = array![[1.0_f32, 0.0], [0.0, 0.0]];
/// assert!((dice(&gt, &pred).unwrap() - 2.0 / 3.0).abs() < 1e-12);
/// ```
pub fn dice<S1, S2, D>(ground_truth: &ArrayBase<S1, D>, prediction: &ArrayBase<S2, D>) -> Result<f64>
where
    S1: Data<Elem = f32>,
    S2: Data<Elem = f32>,
    D: Dimension,
{
    Ok(Overlap::count(ground_truth, prediction)?.dice())
}

/// Jaccard index between a ground truth and a prediction.
pub fn jaccard<S1, S2, D>(
    ground_truth: &ArrayBase<S1, D>,
    prediction: &ArrayBase<S2, D>,
) -> Result<f64>
where
    S1: Data<Elem = f32>,
    S2: Data<Elem = f32>,
    D: Dimension,
{
    Ok(Overlap::count(ground_truth, prediction)?.jaccard())
}

/// Calculate every enabled metric, keyed by report name.
pub fn calculate<S1, S2, D>(
    config: &MetricConfig,
    ground_truth: &ArrayBase<S1, D>,
    prediction: &ArrayBase<S2, D>,
) -> Result<BTreeMap<String, f64>>
where
    S1: Data<Elem = f32>,
    S2: Data<Elem = f32>,
    D: Dimension,
{
    let overlap = Overlap::count(ground_truth, prediction)?;
    Ok(config
        .enabled()
        .into_iter()
        .map(|metric| (metric.name().to_string(), metric.score(&overlap)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn checkerboard(n: usize, parity: usize) -> Array2<f32> {
        Array2::from_shape_fn((n, n), |(i, j)| if (i + j) % 2 == parity { 1.0 } else { 0.0 })
    }

    #[test]
    fn test_dice_identical() {
        let mask = checkerboard(8, 0);
        assert_eq!(dice(&mask, &mask).unwrap(), 1.0);
    }

    #[test]
    fn test_dice_disjoint() {
        let a = checkerboard(8, 0);
        let b = checkerboard(8, 1);
        assert_eq!(dice(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_dice_symmetric() {
        let a = array![[1.0_f32, 1.0, 1.0], [0.0, 0.0, 1.0]];
        let b = array![[0.0_f32, 1.0, 0.0], [0.0, 1.0, 1.0]];
        assert_eq!(dice(&a, &b).unwrap(), dice(&b, &a).unwrap());
        // I = 2, |A| = 4, |B| = 3
        assert!((dice(&a, &b).unwrap() - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_nonzero_values_are_foreground() {
        let a = array![[255.0_f32, 0.0], [-3.0, 0.5]];
        let b = array![[1.0_f32, 0.0], [1.0, 1.0]];
        assert_eq!(dice(&a, &b).unwrap(), 1.0);
    }

    #[test]
    fn test_empty_masks_score_one() {
        let a = Array2::<f32>::zeros((4, 4));
        assert_eq!(dice(&a, &a).unwrap(), EMPTY_MASK_SCORE);
        assert_eq!(jaccard(&a, &a).unwrap(), EMPTY_MASK_SCORE);
    }

    #[test]
    fn test_one_empty_mask_scores_zero() {
        let empty = Array2::<f32>::zeros((4, 4));
        let full = Array2::<f32>::ones((4, 4));
        assert_eq!(dice(&empty, &full).unwrap(), 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array2::<f32>::ones((4, 4));
        let b = Array2::<f32>::ones((4, 5));
        let err = dice(&a, &b).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_jaccard() {
        let a = array![[1.0_f32, 1.0, 1.0], [0.0, 0.0, 1.0]];
        let b = array![[0.0_f32, 1.0, 0.0], [0.0, 1.0, 1.0]];
        // I = 2, union = 5
        assert!((jaccard(&a, &b).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_calculate_respects_config() {
        let mask = checkerboard(4, 0);
        let result = calculate(&MetricConfig::default(), &mask, &mask).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result["Dice"], 1.0);

        let result = calculate(&MetricConfig::all(), &mask, &mask).unwrap();
        assert_eq!(result.keys().collect::<Vec<_>>(), ["Dice", "Jaccard"]);
    }

    #[test]
    fn test_metric_config_from_names() {
        let config = MetricConfig::from_names(&["dice", "IoU"]).unwrap();
        assert!(config.dice);
        assert!(config.jaccard);
        assert!(MetricConfig::from_names(&["psnr"]).is_err());
        assert!(MetricConfig::from_names::<&str>(&[]).is_err());
    }
}
