//! Foreground star and background galaxy masking for HST/JWST science
//! frames.
//!
//! The pipeline replaces contaminating sources with synthetic sky: each
//! masked region is an ellipse (a circle for stars) placed through the
//! frame's TAN projection, its interior overwritten with Gaussian draws
//! matched to the mean and scatter of the surrounding background annulus.
//! Frames are flux-calibrated to mJy-based units before any statistics are
//! taken.
//!
//! # Pipeline
//!
//! 1. [`io::read_frame`] loads a science frame and its retained header
//!    cards; [`frame::ScienceFrame::calibrate`] applies the per-instrument
//!    unit scaling exactly once.
//! 2. [`wcs::TanWcs`] converts catalog sky positions to pixel coordinates.
//! 3. [`catalog`] supplies the regions: cone-search stars filtered by
//!    parallax, plus operator-measured galaxy ellipses.
//! 4. [`masking::patch_regions`] estimates the background around each
//!    region and infills its interior, stars before galaxies, in list
//!    order.
//! 5. [`io::write_frame`] stores the corrected frame next to the input
//!    batch.
//!
//! [`masking::patch_nan`] covers the second use case: repairing NaN holes
//! in an already-corrected frame without disturbing finite pixels.

pub mod catalog;
pub mod frame;
pub mod geometry;
pub mod io;
pub mod masking;
pub mod wcs;

use thiserror::Error;

pub use frame::{FrameError, InstrumentFamily, ScienceFrame};
pub use geometry::{PixelRegion, SkyRegion};
pub use masking::{patch_nan, patch_regions, PatchReport};
pub use wcs::TanWcs;

/// Top-level error for a correction run.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("projection error: {0}")]
    Wcs(#[from] wcs::WcsError),
    #[error("frame error: {0}")]
    Frame(#[from] frame::FrameError),
    #[error("masking error: {0}")]
    Masking(#[from] masking::MaskingError),
    #[error("catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),
    #[error("I/O error: {0}")]
    Io(#[from] io::IoError),
}

impl From<io::FitsError> for PatchError {
    fn from(err: io::FitsError) -> Self {
        PatchError::Io(io::IoError::Fits(err))
    }
}
