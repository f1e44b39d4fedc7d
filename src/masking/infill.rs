//! Gaussian infill of region interiors.
//!
//! Overwrites each interior pixel with an independent draw from
//! `Normal(mean, std)` using the frozen background statistics for that
//! region. The overwrite is destructive and irreversible; callers that need
//! the original data must persist it before patching.

use ndarray::ArrayViewMut2;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};
use thiserror::Error;

use crate::geometry::{Aabb, PixelClass, PixelRegion};
use crate::masking::background::BackgroundStats;

/// Errors from the infill stage.
#[derive(Error, Debug)]
pub enum InfillError {
    #[error("cannot build infill distribution: {0}")]
    Distribution(#[from] rand_distr::NormalError),
}

/// Which interior pixels the infill overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfillPolicy {
    /// Every interior pixel (the star/galaxy masking path).
    All,
    /// Only NaN-valued interior pixels; finite pixels stay bit-for-bit
    /// unchanged. This is the point-fix path and must never be merged with
    /// [`InfillPolicy::All`].
    NanOnly,
}

/// Build the generator used for infill draws.
///
/// A supplied seed gives reproducible output; otherwise the generator is
/// seeded from entropy. Every public patching entry point threads an
/// `Option<u64>` seed down to here.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(|| rand::rng().next_u64());
    StdRng::seed_from_u64(seed)
}

/// Overwrite interior pixels of `region` within `bbox` with Gaussian draws.
///
/// Returns the number of pixels overwritten. Statistics must come from the
/// untouched buffer; run estimation for a region strictly before its infill.
pub fn apply<R: Rng>(
    mut data: ArrayViewMut2<'_, f64>,
    region: &PixelRegion,
    bbox: &Aabb,
    stats: &BackgroundStats,
    policy: InfillPolicy,
    rng: &mut R,
) -> Result<usize, InfillError> {
    let normal = Normal::new(stats.mean, stats.std)?;
    let mut overwritten = 0;

    for row in bbox.rows() {
        for col in bbox.cols() {
            if region.classify(col, row) != PixelClass::Interior {
                continue;
            }
            if policy == InfillPolicy::NanOnly && !data[[row, col]].is_nan() {
                continue;
            }
            data[[row, col]] = normal.sample(rng);
            overwritten += 1;
        }
    }

    Ok(overwritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn stats(mean: f64, std: f64) -> BackgroundStats {
        BackgroundStats {
            mean,
            std,
            n_samples: 100,
        }
    }

    #[test]
    fn test_interior_overwritten_exterior_untouched() {
        let mut data = Array2::from_elem((60, 60), 42.0);
        let region = PixelRegion::circle(30.0, 30.0, 5.0);
        let bbox = region.bounding_box(data.dim()).unwrap();
        let mut rng = seeded_rng(Some(1));

        let count = apply(
            data.view_mut(),
            &region,
            &bbox,
            &stats(0.0, 1.0),
            InfillPolicy::All,
            &mut rng,
        )
        .unwrap();
        assert!(count > 0);

        for ((row, col), &v) in data.indexed_iter() {
            match region.classify(col, row) {
                PixelClass::Interior if bbox.contains_point(row, col) => {
                    assert_ne!(v, 42.0, "interior pixel ({row},{col}) not redrawn")
                }
                _ => assert_eq!(v, 42.0, "pixel ({row},{col}) modified outside interior"),
            }
        }
    }

    #[test]
    fn test_seeded_runs_reproducible() {
        let region = PixelRegion::circle(20.0, 20.0, 4.0);
        let make = |seed| {
            let mut data = Array2::zeros((40, 40));
            let bbox = region.bounding_box(data.dim()).unwrap();
            let mut rng = seeded_rng(Some(seed));
            apply(
                data.view_mut(),
                &region,
                &bbox,
                &stats(5.0, 2.0),
                InfillPolicy::All,
                &mut rng,
            )
            .unwrap();
            data
        };
        assert_eq!(make(9), make(9));
        assert_ne!(make(9), make(10));
    }

    #[test]
    fn test_redraw_matches_distribution_not_values() {
        // Re-running infill gives a different realization with statistically
        // matching moments.
        let region = PixelRegion::circle(50.0, 50.0, 20.0);
        let mut data = Array2::zeros((101, 101));
        let bbox = region.bounding_box(data.dim()).unwrap();
        let s = stats(10.0, 1.0);

        let mut rng = seeded_rng(Some(3));
        apply(
            data.view_mut(),
            &region,
            &bbox,
            &s,
            InfillPolicy::All,
            &mut rng,
        )
        .unwrap();
        let first = data.clone();
        let mut rng = seeded_rng(Some(4));
        apply(
            data.view_mut(),
            &region,
            &bbox,
            &s,
            InfillPolicy::All,
            &mut rng,
        )
        .unwrap();

        assert_ne!(first, data);
        let interior: Vec<f64> = data
            .indexed_iter()
            .filter(|((row, col), _)| region.classify(*col, *row) == PixelClass::Interior)
            .map(|(_, &v)| v)
            .collect();
        let n = interior.len() as f64;
        let mean = interior.iter().sum::<f64>() / n;
        // ~1250 interior draws; the sample mean converges as sigma/sqrt(n).
        assert_relative_eq!(mean, 10.0, epsilon = 3.0 / n.sqrt());
    }

    #[test]
    fn test_nan_only_leaves_finite_pixels_bit_exact() {
        let mut data = Array2::from_elem((40, 40), 1.25);
        data[[20, 20]] = f64::NAN;
        data[[21, 19]] = f64::NAN;
        data[[2, 2]] = f64::NAN; // outside the region, must stay NaN

        let region = PixelRegion::circle(20.0, 20.0, 4.0);
        let bbox = region.bounding_box(data.dim()).unwrap();
        let mut rng = seeded_rng(Some(7));
        let count = apply(
            data.view_mut(),
            &region,
            &bbox,
            &stats(1.25, 0.1),
            InfillPolicy::NanOnly,
            &mut rng,
        )
        .unwrap();

        assert_eq!(count, 2);
        assert!(data[[20, 20]].is_finite());
        assert!(data[[21, 19]].is_finite());
        assert!(data[[2, 2]].is_nan());
        for ((row, col), &v) in data.indexed_iter() {
            if (row, col) != (20, 20) && (row, col) != (21, 19) && (row, col) != (2, 2) {
                assert_eq!(v.to_bits(), 1.25f64.to_bits());
            }
        }
    }

    #[test]
    fn test_negative_std_rejected() {
        let mut data = Array2::zeros((20, 20));
        let region = PixelRegion::circle(10.0, 10.0, 3.0);
        let bbox = region.bounding_box(data.dim()).unwrap();
        let mut rng = seeded_rng(Some(0));
        let result = apply(
            data.view_mut(),
            &region,
            &bbox,
            &stats(0.0, -1.0),
            InfillPolicy::All,
            &mut rng,
        );
        assert!(matches!(result, Err(InfillError::Distribution(_))));
    }

    #[test]
    fn test_unseeded_rng_still_works() {
        let mut a = seeded_rng(None);
        let mut b = seeded_rng(None);
        // Entropy-seeded generators should essentially never collide.
        assert_ne!(a.next_u64(), b.next_u64());
    }
}
