//! Local background estimation around a source region.
//!
//! Statistics come from the exterior set: pixels inside the region's bounding
//! box whose quadratic form puts them strictly outside the region. Interior
//! and boundary pixels never contribute, so the estimate is taken entirely
//! from untouched sky around the source.

use ndarray::ArrayView2;
use thiserror::Error;

use crate::geometry::{Aabb, PixelClass, PixelRegion};

/// Errors from background estimation.
#[derive(Error, Debug)]
pub enum BackgroundError {
    #[error("no exterior pixels available for background estimation")]
    EmptyAnnulus,
    #[error("background statistics are not finite (mean = {mean}, std = {std})")]
    NonFinite { mean: f64, std: f64 },
}

/// Sample mean and standard deviation of the local background.
///
/// Computed fresh per region and frozen for that region's infill; never
/// cached or reused across regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundStats {
    pub mean: f64,
    /// Population standard deviation (divisor `n`, not `n - 1`).
    pub std: f64,
    /// Number of exterior pixels that entered the estimate.
    pub n_samples: usize,
}

/// Estimate the background around `region` from the exterior pixels of
/// `bbox`.
///
/// NaN pixels are excluded from the sample; a frame full of unpatched NaN
/// defects would otherwise poison every statistic. Fails with
/// [`BackgroundError::EmptyAnnulus`] when zero pixels qualify, which happens
/// for degenerate regions or regions larger than their clipped bounding box.
pub fn estimate(
    data: &ArrayView2<f64>,
    region: &PixelRegion,
    bbox: &Aabb,
) -> Result<BackgroundStats, BackgroundError> {
    let mut samples = Vec::with_capacity(bbox.area());
    for row in bbox.rows() {
        for col in bbox.cols() {
            if region.classify(col, row) == PixelClass::Exterior {
                let value = data[[row, col]];
                if value.is_finite() {
                    samples.push(value);
                }
            }
        }
    }

    if samples.is_empty() {
        return Err(BackgroundError::EmptyAnnulus);
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    if !mean.is_finite() || !std.is_finite() {
        return Err(BackgroundError::NonFinite { mean, std });
    }

    Ok(BackgroundStats {
        mean,
        std,
        n_samples: samples.len(),
    })
}
