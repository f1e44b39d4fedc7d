//! Source region geometry: sky-space region definitions, conversion to pixel
//! space, and the interior/exterior pixel predicate.
//!
//! Both shapes reduce to a single rotated-ellipse quadratic-form test; a
//! circle is the degenerate ellipse with equal axes and zero rotation, so
//! there is exactly one membership predicate in the pipeline.
//!
//! The inequalities are open on both sides: a pixel with quadratic form
//! exactly 1 is on the boundary, which is neither overwritten by infill nor
//! sampled for background statistics.

pub mod aabb;

pub use aabb::Aabb;

use crate::wcs::{TanWcs, WcsError};

/// Bounding boxes extend to three times the region semi-axis on each side,
/// an empirical margin that leaves enough exterior pixels for background
/// statistics.
const BBOX_MARGIN: f64 = 3.0;

/// A source region defined in sky coordinates, immutable once built.
///
/// Star radii are fixed in pixels (the point sources all get the same mask
/// size regardless of plate scale); galaxy axes are angular and converted
/// per image, since each exposure has its own pixel scale.
#[derive(Debug, Clone, PartialEq)]
pub enum SkyRegion {
    Circle {
        ra_deg: f64,
        dec_deg: f64,
        radius_px: f64,
    },
    Ellipse {
        ra_deg: f64,
        dec_deg: f64,
        semi_major_deg: f64,
        semi_minor_deg: f64,
        theta_deg: f64,
    },
}

impl SkyRegion {
    /// Convert to pixel units using one specific image's projection.
    ///
    /// The center is truncated to whole pixels (truncation, not rounding).
    /// Angular axes divide by that image's own plate scale.
    pub fn to_pixel(&self, wcs: &TanWcs) -> Result<PixelRegion, WcsError> {
        match *self {
            SkyRegion::Circle {
                ra_deg,
                dec_deg,
                radius_px,
            } => {
                let (x, y) = wcs.world_to_pixel(ra_deg, dec_deg)?;
                Ok(PixelRegion::circle(x.trunc(), y.trunc(), radius_px))
            }
            SkyRegion::Ellipse {
                ra_deg,
                dec_deg,
                semi_major_deg,
                semi_minor_deg,
                theta_deg,
            } => {
                let (x, y) = wcs.world_to_pixel(ra_deg, dec_deg)?;
                let scale = wcs.pixel_scale_deg();
                Ok(PixelRegion {
                    cx: x.trunc(),
                    cy: y.trunc(),
                    semi_major_px: semi_major_deg / scale,
                    semi_minor_px: semi_minor_deg / scale,
                    theta_rad: theta_deg.to_radians(),
                })
            }
        }
    }
}

/// Classification of one pixel against a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    /// Strictly inside; overwritten by infill.
    Interior,
    /// Quadratic form exactly 1; never touched.
    Boundary,
    /// Strictly outside; sampled for background statistics.
    Exterior,
}

/// A region converted to pixel units for one image.
///
/// `semi_major_px` lies along the region's own x axis before rotation by
/// `theta_rad` (counterclockwise, matching the position angle convention of
/// the operator's ellipse table).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRegion {
    pub cx: f64,
    pub cy: f64,
    pub semi_major_px: f64,
    pub semi_minor_px: f64,
    pub theta_rad: f64,
}

impl PixelRegion {
    /// A circle is the degenerate rotated ellipse with equal axes.
    pub fn circle(cx: f64, cy: f64, radius_px: f64) -> Self {
        Self {
            cx,
            cy,
            semi_major_px: radius_px,
            semi_minor_px: radius_px,
            theta_rad: 0.0,
        }
    }

    /// Classify the pixel at column `x`, row `y`.
    ///
    /// Rotates the offset from the center into the ellipse frame and tests
    /// the normalized sum of squares against 1 with open inequalities.
    pub fn classify(&self, x: usize, y: usize) -> PixelClass {
        let dx = self.cx - x as f64;
        let dy = self.cy - y as f64;
        let cos_t = self.theta_rad.cos();
        let sin_t = self.theta_rad.sin();

        let u = cos_t * dx + sin_t * dy;
        let v = sin_t * dx - cos_t * dy;

        let q = (u * u) / (self.semi_major_px * self.semi_major_px)
            + (v * v) / (self.semi_minor_px * self.semi_minor_px);

        if q < 1.0 {
            PixelClass::Interior
        } else if q > 1.0 {
            PixelClass::Exterior
        } else {
            PixelClass::Boundary
        }
    }

    /// Bounding box of three semi-axes per dimension, clipped to the image.
    ///
    /// `None` means the box lies entirely outside the image and the region
    /// cannot be processed.
    pub fn bounding_box(&self, shape: (usize, usize)) -> Option<Aabb> {
        Aabb::around_center(
            self.cx,
            self.cy,
            BBOX_MARGIN * self.semi_major_px,
            BBOX_MARGIN * self.semi_minor_px,
            shape,
        )
    }
}
