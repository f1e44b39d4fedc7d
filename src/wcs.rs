//! World coordinate system support for science frames.
//!
//! Implements the forward gnomonic (TAN) projection used by both HST and JWST
//! imaging headers: sky coordinates are projected onto the tangent plane at
//! the reference point (`CRVAL1`, `CRVAL2`), then mapped to pixel offsets from
//! (`CRPIX1`, `CRPIX2`) through the inverse of the CD matrix.
//!
//! Reference: Calabretta & Greisen (2002), FITS WCS Paper II, §5.1.1.
//!
//! # Axis convention
//!
//! `world_to_pixel` returns `(x, y)` where `x` is the column (`NAXIS1` axis)
//! and `y` the row (`NAXIS2` axis), zero-based so the truncated result
//! indexes the buffer directly as `data[[y, x]]`. The 1-based `CRPIX` header
//! convention is absorbed here. The same convention applies to star and
//! galaxy positions alike.

use thiserror::Error;

use crate::frame::FrameHeader;

/// Errors that can occur while building or applying a projection.
#[derive(Error, Debug)]
pub enum WcsError {
    #[error("header card {0} required for the projection is missing")]
    MissingCard(&'static str),
    #[error("CD matrix is singular (det = {0:e})")]
    SingularMatrix(f64),
    #[error("sky position ({0:.4}°, {1:.4}°) is on or behind the tangent plane")]
    BehindTangentPlane(f64, f64),
    #[error("batch length mismatch: {ra} RA values vs {dec} Dec values")]
    LengthMismatch { ra: usize, dec: usize },
}

/// TAN projection bound to one specific image.
///
/// Built from that image's own header; never share a `TanWcs` between images,
/// since reference point, pixel scale, and rotation differ per exposure.
#[derive(Debug, Clone)]
pub struct TanWcs {
    /// Reference sky position (RA, Dec) in degrees.
    crval: (f64, f64),
    /// Reference pixel (x, y), 1-based FITS convention.
    crpix: (f64, f64),
    /// Linear transform from pixel offsets to tangent-plane degrees.
    cd: [[f64; 2]; 2],
    /// Inverse of `cd`, precomputed at construction.
    cd_inv: [[f64; 2]; 2],
}

/// Invert a 2x2 matrix. Fails if |det| is below 1e-30.
fn invert_2x2(m: &[[f64; 2]; 2]) -> Result<[[f64; 2]; 2], WcsError> {
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    if det.abs() < 1e-30 {
        return Err(WcsError::SingularMatrix(det));
    }
    let inv_det = 1.0 / det;
    Ok([
        [m[1][1] * inv_det, -m[0][1] * inv_det],
        [-m[1][0] * inv_det, m[0][0] * inv_det],
    ])
}

/// Forward gnomonic projection of `(ra, dec)` at tangent point
/// `(crval_ra, crval_dec)`, all in radians. Returns tangent-plane
/// coordinates `(xi, eta)` in radians, or `None` for points on or behind
/// the tangent plane.
fn tan_project(ra: f64, dec: f64, crval_ra: f64, crval_dec: f64) -> Option<(f64, f64)> {
    let da = ra - crval_ra;
    let sin_dec = dec.sin();
    let cos_dec = dec.cos();
    let sin_dec0 = crval_dec.sin();
    let cos_dec0 = crval_dec.cos();
    let cos_da = da.cos();

    let denom = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_da;
    if denom <= 1e-12 {
        return None;
    }

    let xi = cos_dec * da.sin() / denom;
    let eta = (sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_da) / denom;
    Some((xi, eta))
}

impl TanWcs {
    /// Build a projection from explicit parameters.
    ///
    /// `crval` in degrees, `crpix` 1-based, `cd` in degrees per pixel.
    pub fn new(crval: (f64, f64), crpix: (f64, f64), cd: [[f64; 2]; 2]) -> Result<Self, WcsError> {
        let cd_inv = invert_2x2(&cd)?;
        Ok(Self {
            crval,
            crpix,
            cd,
            cd_inv,
        })
    }

    /// Build a projection from a frame header.
    ///
    /// Requires `CRVAL1/2` and `CRPIX1/2`, plus either the four `CDi_j`
    /// cards or the diagonal `CDELT1/2` fallback.
    pub fn from_header(header: &FrameHeader) -> Result<Self, WcsError> {
        let crval = (
            header.get("CRVAL1").ok_or(WcsError::MissingCard("CRVAL1"))?,
            header.get("CRVAL2").ok_or(WcsError::MissingCard("CRVAL2"))?,
        );
        let crpix = (
            header.get("CRPIX1").ok_or(WcsError::MissingCard("CRPIX1"))?,
            header.get("CRPIX2").ok_or(WcsError::MissingCard("CRPIX2"))?,
        );

        let cd = match (
            header.get("CD1_1"),
            header.get("CD1_2"),
            header.get("CD2_1"),
            header.get("CD2_2"),
        ) {
            (Some(cd11), cd12, cd21, Some(cd22)) => {
                // Off-diagonal cards are commonly omitted when zero.
                [
                    [cd11, cd12.unwrap_or(0.0)],
                    [cd21.unwrap_or(0.0), cd22],
                ]
            }
            _ => {
                let cdelt1 = header.get("CDELT1").ok_or(WcsError::MissingCard("CD1_1"))?;
                let cdelt2 = header.get("CDELT2").ok_or(WcsError::MissingCard("CD2_2"))?;
                [[cdelt1, 0.0], [0.0, cdelt2]]
            }
        };

        Self::new(crval, crpix, cd)
    }

    /// Angular size of one pixel along the declination axis, in degrees.
    ///
    /// Both instrument families carry the scale in `CD2_2`; this is the value
    /// used to convert angular region axes to pixel units.
    pub fn pixel_scale_deg(&self) -> f64 {
        self.cd[1][1].abs()
    }

    /// Same scale expressed in arcseconds per pixel.
    pub fn pixel_scale_arcsec(&self) -> f64 {
        self.pixel_scale_deg() * 3600.0
    }

    /// Convert a sky position in degrees to zero-based pixel coordinates
    /// `(x, y)` = (column, row).
    ///
    /// The result is real-valued; callers truncate to integer pixel indices.
    pub fn world_to_pixel(&self, ra_deg: f64, dec_deg: f64) -> Result<(f64, f64), WcsError> {
        let (xi, eta) = tan_project(
            ra_deg.to_radians(),
            dec_deg.to_radians(),
            self.crval.0.to_radians(),
            self.crval.1.to_radians(),
        )
        .ok_or(WcsError::BehindTangentPlane(ra_deg, dec_deg))?;

        let xi_deg = xi.to_degrees();
        let eta_deg = eta.to_degrees();

        let dx = self.cd_inv[0][0] * xi_deg + self.cd_inv[0][1] * eta_deg;
        let dy = self.cd_inv[1][0] * xi_deg + self.cd_inv[1][1] * eta_deg;

        // CRPIX is 1-based in the header; subtract 1 for array indexing.
        Ok((self.crpix.0 - 1.0 + dx, self.crpix.1 - 1.0 + dy))
    }

    /// Vectorized lookup over parallel slices of RA and Dec.
    ///
    /// The slices must be the same length; a mismatched catalog export is an
    /// error rather than a silent truncation.
    pub fn world_to_pixel_batch(
        &self,
        ra_deg: &[f64],
        dec_deg: &[f64],
    ) -> Result<Vec<(f64, f64)>, WcsError> {
        if ra_deg.len() != dec_deg.len() {
            return Err(WcsError::LengthMismatch {
                ra: ra_deg.len(),
                dec: dec_deg.len(),
            });
        }
        ra_deg
            .iter()
            .zip(dec_deg.iter())
            .map(|(&ra, &dec)| self.world_to_pixel(ra, dec))
            .collect()
    }
}
