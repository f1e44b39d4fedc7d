//! Region masking pipeline.
//!
//! Drives the full correction for one frame: convert each region to pixel
//! units with that frame's own projection, clip its bounding box, estimate
//! the local background from exterior pixels, then overwrite the interior
//! with Gaussian noise. Regions are processed strictly in input order and
//! the buffer mutates cumulatively, so a later region legitimately redraws
//! pixels an earlier one already touched. That ordering is a design choice:
//! stars run before galaxies, and a star embedded in a galaxy ends up with
//! the galaxy's infill.

pub mod background;
pub mod infill;

pub use background::{BackgroundError, BackgroundStats};
pub use infill::{InfillError, InfillPolicy};

use log::{debug, warn};

use crate::frame::ScienceFrame;
use crate::geometry::{PixelRegion, SkyRegion};
use crate::wcs::{TanWcs, WcsError};
use thiserror::Error;

/// Errors that abort the correction of one frame.
#[derive(Error, Debug)]
pub enum MaskingError {
    #[error("projection failed: {0}")]
    Wcs(#[from] WcsError),
    #[error("background estimation failed for region {index}: {source}")]
    Background {
        index: usize,
        #[source]
        source: BackgroundError,
    },
    #[error("infill failed for region {index}: {source}")]
    Infill {
        index: usize,
        #[source]
        source: InfillError,
    },
}

/// Summary of one frame's correction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Regions whose interiors were redrawn.
    pub regions_patched: usize,
    /// Regions skipped because their bounding box fell entirely off-image.
    pub regions_skipped: usize,
    /// Total pixels overwritten across all regions.
    pub pixels_overwritten: usize,
}

/// Patch every region of `frame`, in order, mutating the buffer in place.
///
/// `regions` must already be ordered stars-then-galaxies by the caller. The
/// frame should be calibrated first; background statistics computed in raw
/// detector units would not match the output units. Pixel centers are
/// truncated to integers, not rounded.
///
/// Any failure aborts the pass immediately and surfaces the error; partial
/// corrections are reported, never silently dropped.
pub fn patch_regions(
    frame: &mut ScienceFrame,
    wcs: &TanWcs,
    regions: &[SkyRegion],
    seed: Option<u64>,
) -> Result<PatchReport, MaskingError> {
    let mut rng = infill::seeded_rng(seed);
    let mut report = PatchReport::default();
    let shape = frame.shape();

    for (index, sky_region) in regions.iter().enumerate() {
        let region = sky_region.to_pixel(wcs)?;
        let Some(bbox) = region.bounding_box(shape) else {
            warn!(
                "region {index} at ({:.1}, {:.1}) px lies outside the {shape:?} image, skipping",
                region.cx, region.cy
            );
            report.regions_skipped += 1;
            continue;
        };

        // Estimation strictly precedes infill: statistics must come from
        // pixels this region has not yet overwritten.
        let stats = background::estimate(&frame.data.view(), &region, &bbox)
            .map_err(|source| MaskingError::Background { index, source })?;
        let overwritten = infill::apply(
            frame.data.view_mut(),
            &region,
            &bbox,
            &stats,
            InfillPolicy::All,
            &mut rng,
        )
        .map_err(|source| MaskingError::Infill { index, source })?;

        debug!(
            "region {index}: redrew {overwritten} px with mean {:.4}, std {:.4} ({} bg samples)",
            stats.mean, stats.std, stats.n_samples
        );
        report.regions_patched += 1;
        report.pixels_overwritten += overwritten;
    }

    Ok(report)
}

/// Point-fix entry: redraw only NaN pixels within a circle around a pixel
/// coordinate.
///
/// `(x, y)` are zero-based pixel coordinates (column, row) of the defect
/// center, matching the buffer indexing convention. Finite pixels
/// are left bit-for-bit unchanged even when geometrically interior; this is
/// a distinct policy from [`patch_regions`], not a variant of it.
pub fn patch_nan(
    frame: &mut ScienceFrame,
    x: f64,
    y: f64,
    radius_px: f64,
    seed: Option<u64>,
) -> Result<PatchReport, MaskingError> {
    let mut rng = infill::seeded_rng(seed);
    let region = PixelRegion::circle(x.trunc(), y.trunc(), radius_px);
    let mut report = PatchReport::default();

    let Some(bbox) = region.bounding_box(frame.shape()) else {
        warn!(
            "NaN patch at ({x:.1}, {y:.1}) px lies outside the {:?} image, skipping",
            frame.shape()
        );
        report.regions_skipped = 1;
        return Ok(report);
    };

    let stats = background::estimate(&frame.data.view(), &region, &bbox)
        .map_err(|source| MaskingError::Background { index: 0, source })?;
    let overwritten = infill::apply(
        frame.data.view_mut(),
        &region,
        &bbox,
        &stats,
        InfillPolicy::NanOnly,
        &mut rng,
    )
    .map_err(|source| MaskingError::Infill { index: 0, source })?;

    debug!(
        "NaN patch at ({x:.1}, {y:.1}): redrew {overwritten} px with mean {:.4}, std {:.4}",
        stats.mean, stats.std
    );
    report.regions_patched = 1;
    report.pixels_overwritten = overwritten;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameHeader, InstrumentFamily};
    use crate::geometry::PixelClass;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use rand::Rng;

    /// 0.04 arcsec/px WCS with the reference point at the frame center.
    fn test_wcs(crpix: (f64, f64)) -> TanWcs {
        let scale = 0.04 / 3600.0;
        TanWcs::new((41.0, -30.0), crpix, [[-scale, 0.0], [0.0, scale]]).unwrap()
    }

    fn test_frame(shape: (usize, usize), fill: f64) -> ScienceFrame {
        ScienceFrame::new(
            Array2::from_elem(shape, fill),
            FrameHeader::new(),
            InstrumentFamily::Hst,
        )
    }

    /// Noisy uniform background around `mean` with spread `std`.
    fn noisy_frame(shape: (usize, usize), mean: f64, std: f64, seed: u64) -> ScienceFrame {
        let mut rng = infill::seeded_rng(Some(seed));
        let data = Array2::from_shape_fn(shape, |_| {
            mean + std * (rng.random::<f64>() - 0.5) * 12f64.sqrt()
        });
        ScienceFrame::new(data, FrameHeader::new(), InstrumentFamily::Hst)
    }

    #[test]
    fn test_end_to_end_star_patch() {
        // 100x100 uniform-ish background, mean 10, std 1; one star region of
        // radius 5 at the center. Everything outside the circle is untouched
        // and the redrawn interior mean lands within 3 sigma of 10.
        let mut frame = noisy_frame((100, 100), 10.0, 1.0, 11);
        let original = frame.data.clone();
        let wcs = test_wcs((51.0, 51.0));
        let star = SkyRegion::Circle {
            ra_deg: 41.0,
            dec_deg: -30.0,
            radius_px: 5.0,
        };

        let report = patch_regions(&mut frame, &wcs, &[star], Some(2)).unwrap();
        assert_eq!(report.regions_patched, 1);
        assert_eq!(report.regions_skipped, 0);

        let region = PixelRegion::circle(50.0, 50.0, 5.0);
        let mut interior = Vec::new();
        for ((row, col), &v) in frame.data.indexed_iter() {
            if region.classify(col, row) == PixelClass::Interior {
                interior.push(v);
            } else {
                assert_eq!(v, original[[row, col]]);
            }
        }
        assert_eq!(interior.len(), report.pixels_overwritten);
        let mean = interior.iter().sum::<f64>() / interior.len() as f64;
        assert_relative_eq!(mean, 10.0, epsilon = 3.0 / (interior.len() as f64).sqrt());
    }

    #[test]
    fn test_overlapping_regions_later_wins() {
        // Concentric regions A then B: the overlap must end up with B's
        // realization, so every interior pixel of A is redrawn again by B.
        let mut frame = noisy_frame((80, 80), 5.0, 0.4, 17);
        let wcs = test_wcs((41.0, 41.0));
        let a = SkyRegion::Circle {
            ra_deg: 41.0,
            dec_deg: -30.0,
            radius_px: 4.0,
        };
        let b = SkyRegion::Circle {
            ra_deg: 41.0,
            dec_deg: -30.0,
            radius_px: 8.0,
        };

        patch_regions(&mut frame, &wcs, &[a], Some(5)).unwrap();
        let after_a = frame.data.clone();
        patch_regions(&mut frame, &wcs, &[b], Some(6)).unwrap();

        let inner = PixelRegion::circle(40.0, 40.0, 4.0);
        for ((row, col), &v) in frame.data.indexed_iter() {
            if inner.classify(col, row) == PixelClass::Interior {
                assert_ne!(
                    v,
                    after_a[[row, col]],
                    "overlap pixel ({row},{col}) kept A's value"
                );
            }
        }
    }

    #[test]
    fn test_stars_then_galaxies_single_pass() {
        let mut frame = noisy_frame((120, 120), 4.0, 0.5, 21);
        let wcs = test_wcs((61.0, 61.0));
        let scale = 0.04 / 3600.0;
        let regions = vec![
            SkyRegion::Circle {
                ra_deg: 41.0,
                dec_deg: -30.0,
                radius_px: 6.0,
            },
            SkyRegion::Ellipse {
                ra_deg: 41.0,
                dec_deg: -30.0 + 20.0 * scale,
                semi_major_deg: 8.0 * scale,
                semi_minor_deg: 4.0 * scale,
                theta_deg: 30.0,
            },
        ];
        let report = patch_regions(&mut frame, &wcs, &regions, Some(1)).unwrap();
        assert_eq!(report.regions_patched, 2);
        assert!(report.pixels_overwritten > 0);
    }

    #[test]
    fn test_off_image_region_skipped() {
        let mut frame = test_frame((50, 50), 1.0);
        let wcs = test_wcs((25.0, 25.0));
        // ~1000 px east of the frame.
        let region = SkyRegion::Circle {
            ra_deg: 41.0 - 1000.0 * 0.04 / 3600.0,
            dec_deg: -30.0,
            radius_px: 5.0,
        };
        let report = patch_regions(&mut frame, &wcs, &[region], Some(0)).unwrap();
        assert_eq!(report.regions_patched, 0);
        assert_eq!(report.regions_skipped, 1);
        assert!(frame.data.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_empty_annulus_aborts_with_image_unmodified() {
        let mut frame = test_frame((20, 20), 3.0);
        let wcs = test_wcs((11.0, 11.0));
        // Region larger than the whole image: clipped bbox has no exterior.
        let region = SkyRegion::Circle {
            ra_deg: 41.0,
            dec_deg: -30.0,
            radius_px: 100.0,
        };
        let err = patch_regions(&mut frame, &wcs, &[region], Some(0)).unwrap_err();
        assert!(matches!(
            err,
            MaskingError::Background {
                index: 0,
                source: BackgroundError::EmptyAnnulus
            }
        ));
        assert!(frame.data.iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_patch_nan_only_replaces_nans() {
        let mut frame = test_frame((60, 60), 2.5);
        frame.data[[30, 30]] = f64::NAN;
        frame.data[[31, 29]] = f64::NAN;
        let original = frame.data.clone();

        let report = patch_nan(&mut frame, 31.0, 31.0, 6.0, Some(4)).unwrap();
        assert_eq!(report.pixels_overwritten, 2);

        for ((row, col), &v) in frame.data.indexed_iter() {
            if original[[row, col]].is_nan() {
                assert!(v.is_finite());
            } else {
                assert_eq!(v.to_bits(), original[[row, col]].to_bits());
            }
        }
    }

    #[test]
    fn test_patch_nan_off_image_is_skipped() {
        let mut frame = test_frame((30, 30), 1.0);
        let report = patch_nan(&mut frame, 500.0, 500.0, 3.0, None).unwrap();
        assert_eq!(report.regions_patched, 0);
        assert_eq!(report.regions_skipped, 1);
    }

    #[test]
    fn test_seeded_patch_reproducible() {
        let wcs = test_wcs((26.0, 26.0));
        let region = SkyRegion::Circle {
            ra_deg: 41.0,
            dec_deg: -30.0,
            radius_px: 4.0,
        };
        let run = |seed| {
            let mut frame = noisy_frame((50, 50), 1.0, 0.2, 99);
            patch_regions(&mut frame, &wcs, &[region.clone()], Some(seed)).unwrap();
            frame.data
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42), run(43));
    }
}
