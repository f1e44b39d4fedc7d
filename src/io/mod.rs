//! Batch input discovery and output layout.
//!
//! A correction batch operates on one galaxy folder holding the science
//! frames (`*sci.fits` for HST, `*anchored.fits` for JWST) and a galaxy
//! ellipse table (`*.txt`). Corrected frames land in a sibling directory
//! named `<folder>_patch_corrected`, one output file per input with the
//! `_star_galaxy_corrected.fits` suffix.

pub mod fits;
pub mod header;

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

pub use fits::{read_frame, write_frame, FitsError};

/// Suffix replacing `.fits` on corrected output files.
const OUTPUT_SUFFIX: &str = "_star_galaxy_corrected.fits";

/// Suffix appended to the input folder name for the output directory.
const OUTPUT_DIR_SUFFIX: &str = "_patch_corrected";

/// Errors from batch discovery and output placement.
#[derive(Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Fits(#[from] FitsError),
    #[error("output directory {0} already exists")]
    PathExists(PathBuf),
    #[error("input folder {0} does not exist or holds no science frames")]
    MissingInput(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Science frames and galaxy tables found in one input folder, each list
/// sorted by filename for a deterministic processing order.
#[derive(Debug, Default)]
pub struct InputSet {
    pub frames: Vec<PathBuf>,
    pub galaxy_tables: Vec<PathBuf>,
}

/// Scan a galaxy folder for science frames and ellipse tables.
///
/// Frames are files ending in `sci.fits` or `anchored.fits`; every `.txt`
/// file is treated as a galaxy table. A folder with no frames at all is an
/// error.
pub fn discover_inputs<P: AsRef<Path>>(dir: P) -> Result<InputSet, IoError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|_| IoError::MissingInput(dir.to_path_buf()))?;

    let mut set = InputSet::default();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Suffix match, not substring: "oscillation.fits" is not a frame.
        if name.ends_with("sci.fits") || name.ends_with("anchored.fits") {
            set.frames.push(path);
        } else if name.ends_with(".txt") {
            set.galaxy_tables.push(path);
        }
    }
    set.frames.sort();
    set.galaxy_tables.sort();

    if set.frames.is_empty() {
        return Err(IoError::MissingInput(dir.to_path_buf()));
    }
    debug!(
        "discovered {} frames and {} galaxy tables in {}",
        set.frames.len(),
        set.galaxy_tables.len(),
        dir.display()
    );
    Ok(set)
}

/// Create the sibling output directory `<folder>_patch_corrected`.
///
/// An already-existing directory is reported as [`IoError::PathExists`] so
/// the caller can decide whether re-using it (and overwriting its files) is
/// acceptable; the returned path inside the error is ready to use.
pub fn create_output_dir<P: AsRef<Path>>(input_dir: P) -> Result<PathBuf, IoError> {
    let input_dir = input_dir.as_ref();
    let name = input_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| IoError::MissingInput(input_dir.to_path_buf()))?;
    let out_dir = input_dir.with_file_name(format!("{name}{OUTPUT_DIR_SUFFIX}"));

    if out_dir.exists() {
        return Err(IoError::PathExists(out_dir));
    }
    fs::create_dir_all(&out_dir)?;
    Ok(out_dir)
}

/// Output path for one corrected frame inside the output directory.
pub fn output_path<P: AsRef<Path>, Q: AsRef<Path>>(out_dir: P, input: Q) -> PathBuf {
    let name = input
        .as_ref()
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("frame.fits");
    let corrected = match name.strip_suffix(".fits") {
        Some(stem) => format!("{stem}{OUTPUT_SUFFIX}"),
        None => format!("{name}{OUTPUT_SUFFIX}"),
    };
    out_dir.as_ref().join(corrected)
}
