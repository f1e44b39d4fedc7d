//! FITS reading and writing for science frames.
//!
//! Input products place their image in different HDUs (HST primary, JWST
//! first extension), so the reader scans for the first two-dimensional image
//! HDU rather than hard-coding an index. The full input header travels with
//! the frame: every card of the primary and image HDUs is kept (the image
//! HDU overriding the primary on collisions) and written back out, except
//! structural cards the writer regenerates.
//!
//! Pixel data keeps the stored FITS row order: row 0 of the array is the
//! first row in the file, indexed `data[[y, x]]`.

use std::path::{Path, PathBuf};

use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::images::{ImageDescription, ImageType, ReadImage, WriteImage};
use log::debug;
use ndarray::Array2;
use thiserror::Error;

use crate::frame::{CardValue, FrameHeader, InstrumentFamily, ScienceFrame};
use crate::io::header;

/// Cards describing file layout rather than the observation. Dropped on
/// read; the writer emits its own, and checksums of the input data would be
/// stale anyway.
const STRUCTURAL_CARDS: [&str; 11] = [
    "SIMPLE", "BITPIX", "NAXIS", "EXTEND", "XTENSION", "PCOUNT", "GCOUNT", "EXTNAME", "BSCALE",
    "BZERO", "CHECKSUM",
];

fn is_structural(card: &str) -> bool {
    STRUCTURAL_CARDS.contains(&card) || card.starts_with("NAXIS") || card == "DATASUM"
}

/// Errors from FITS file access.
#[derive(Error, Debug)]
pub enum FitsError {
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::compat::errors::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}: no two-dimensional image HDU found")]
    NoImageHdu(PathBuf),
    #[error("{path}: image HDU reports {naxis1}x{naxis2} pixels but holds {len} values")]
    InvalidShape {
        path: PathBuf,
        naxis1: usize,
        naxis2: usize,
        len: usize,
    },
    #[error("{0}: filename does not identify the instrument family")]
    UnknownFamily(PathBuf),
}

/// Read a science frame, scanning HDUs for the first 2-D image.
pub fn read_frame<P: AsRef<Path>>(path: P) -> Result<ScienceFrame, FitsError> {
    let path = path.as_ref();
    let family = InstrumentFamily::from_filename(path)
        .ok_or_else(|| FitsError::UnknownFamily(path.to_path_buf()))?;

    let hdu_headers = header::scan_headers(path)?;
    let image_idx = hdu_headers
        .iter()
        .position(|h| {
            h.get("NAXIS") == Some(2.0)
                && h.get("NAXIS1").unwrap_or(0.0) > 0.0
                && h.get("NAXIS2").unwrap_or(0.0) > 0.0
        })
        .ok_or_else(|| FitsError::NoImageHdu(path.to_path_buf()))?;

    let naxis1 = hdu_headers[image_idx].get("NAXIS1").unwrap_or(0.0) as usize;
    let naxis2 = hdu_headers[image_idx].get("NAXIS2").unwrap_or(0.0) as usize;

    // Merge cards from the primary up through the image HDU, later HDUs
    // overriding earlier ones.
    let mut merged = FrameHeader::new();
    for hdu_header in &hdu_headers[..=image_idx] {
        for (card, value) in hdu_header.iter() {
            if !is_structural(card) {
                merged.insert_card(card, value.clone());
            }
        }
    }

    let fptr = FitsFile::open(path)?;
    let hdu = fptr.hdu(image_idx)?;
    let pixels = f64::read_image(&fptr, &hdu)?;
    let len = pixels.len();
    let data = Array2::from_shape_vec((naxis2, naxis1), pixels).map_err(|_| {
        FitsError::InvalidShape {
            path: path.to_path_buf(),
            naxis1,
            naxis2,
            len,
        }
    })?;
    debug!(
        "read {naxis1}x{naxis2} image from HDU {image_idx} of {}",
        path.display()
    );
    Ok(ScienceFrame::new(data, merged, family))
}

/// Write a frame as a single `SCI` image extension carrying the full header.
///
/// Boolean cards come back out as `'T'`/`'F'` strings and integer cards as
/// their numeric value; the writer's key surface covers strings and floats.
pub fn write_frame<P: AsRef<Path>>(frame: &ScienceFrame, path: P) -> Result<(), FitsError> {
    let path = path.as_ref();
    let (height, width) = frame.shape();

    let mut fptr = FitsFile::create(path).overwrite().open()?;
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: vec![width, height],
    };
    let hdu = fptr.create_image("SCI", &description)?;

    let flat: Vec<f64> = frame.data.iter().copied().collect();
    f64::write_image(&mut fptr, &hdu, &flat)?;

    hdu.write_key(&mut fptr, "EXTNAME", &"SCI".to_string())?;
    for (card, value) in frame.header.iter() {
        match value {
            CardValue::Float(v) => hdu.write_key(&mut fptr, card, v)?,
            CardValue::Int(v) => hdu.write_key(&mut fptr, card, &(*v as f64))?,
            CardValue::Bool(b) => {
                let flag = if *b { "T" } else { "F" };
                hdu.write_key(&mut fptr, card, &flag.to_string())?;
            }
            CardValue::Str(s) => hdu.write_key(&mut fptr, card, s)?,
        }
    }
    debug!("wrote {width}x{height} frame to {}", path.display());
    Ok(())
}
