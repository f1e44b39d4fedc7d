//! Source lists consumed by the masking pipeline.
//!
//! Two inputs feed the region list for a correction batch:
//!
//! - a **star catalog**: `(ra, dec, parallax)` rows exported from a cone
//!   search around the target, filtered here by a parallax lower bound so
//!   only foreground stars are masked;
//! - a **galaxy table**: operator-measured ellipse parameters
//!   `(ra, dec, a, b, theta)`, one row per background galaxy, consumed in
//!   file order.
//!
//! The cone search itself is an external collaborator; this module only
//! parses its exported rows.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::geometry::SkyRegion;

/// Parallax lower bound selecting foreground stars, in the catalog's own
/// parallax units. Distant stars returned by the positional match fall
/// below this and are left unmasked.
pub const DEFAULT_PARALLAX_THRESHOLD: f64 = 4.8e-8;

/// Mask radius applied to every star, in pixels.
pub const DEFAULT_STAR_RADIUS_PX: f64 = 10.0;

/// Errors from reading source lists.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("input file {0} is missing")]
    MissingInput(PathBuf),
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("{path}: required column {column} not found in table header")]
    MissingColumn { path: PathBuf, column: String },
}

/// One candidate star from the cone-search export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarCandidate {
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub parallax: f64,
}

/// One row of the operator's galaxy ellipse table, axes in degrees and the
/// position angle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalaxyRow {
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub a_deg: f64,
    pub b_deg: f64,
    pub theta_deg: f64,
}

/// Keep only stars with parallax strictly above `threshold`.
///
/// Rows with missing (NaN) parallax fail the comparison and are excluded,
/// matching how the catalog marks stars without a parallax solution.
pub fn filter_foreground(stars: &[StarCandidate], threshold: f64) -> Vec<StarCandidate> {
    let kept: Vec<StarCandidate> = stars
        .iter()
        .filter(|star| star.parallax > threshold)
        .copied()
        .collect();
    debug!(
        "parallax filter kept {}/{} stars above {threshold:e}",
        kept.len(),
        stars.len()
    );
    kept
}

/// Circular mask regions for the foreground stars, in catalog order.
pub fn star_regions(stars: &[StarCandidate], radius_px: f64) -> Vec<SkyRegion> {
    stars
        .iter()
        .map(|star| SkyRegion::Circle {
            ra_deg: star.ra_deg,
            dec_deg: star.dec_deg,
            radius_px,
        })
        .collect()
}

/// Elliptical mask regions for the galaxy table, in table order.
pub fn galaxy_regions(rows: &[GalaxyRow]) -> Vec<SkyRegion> {
    rows.iter()
        .map(|row| SkyRegion::Ellipse {
            ra_deg: row.ra_deg,
            dec_deg: row.dec_deg,
            semi_major_deg: row.a_deg,
            semi_minor_deg: row.b_deg,
            theta_deg: row.theta_deg,
        })
        .collect()
}

fn parse_f64(
    field: &str,
    path: &Path,
    line: usize,
    column: &str,
) -> Result<f64, CatalogError> {
    field.parse::<f64>().map_err(|_| CatalogError::Parse {
        path: path.to_path_buf(),
        line,
        message: format!("cannot parse {column} value {field:?}"),
    })
}

/// Read a star catalog export: comma-separated `ra,dec,parallax` rows with
/// an optional header line. `#` lines are comments.
pub fn read_star_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<StarCandidate>, CatalogError> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).map_err(|_| CatalogError::MissingInput(path.to_path_buf()))?;

    let mut stars = Vec::new();
    let mut first_row = true;
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 3 {
            return Err(CatalogError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                message: format!("expected 3 comma-separated fields, found {}", fields.len()),
            });
        }
        // Skip a header line such as "ra,dec,parallax".
        if first_row {
            first_row = false;
            if fields[0].parse::<f64>().is_err() {
                continue;
            }
        }
        stars.push(StarCandidate {
            ra_deg: parse_f64(fields[0], path, idx + 1, "ra")?,
            dec_deg: parse_f64(fields[1], path, idx + 1, "dec")?,
            // Missing parallax is an empty field in the export.
            parallax: if fields[2].is_empty() {
                f64::NAN
            } else {
                parse_f64(fields[2], path, idx + 1, "parallax")?
            },
        });
    }
    debug!("read {} star candidates from {}", stars.len(), path.display());
    Ok(stars)
}

/// Read the operator's galaxy ellipse table: whitespace-separated columns
/// with a header line naming at least `ra dec a b theta`, in any order.
pub fn read_galaxy_table<P: AsRef<Path>>(path: P) -> Result<Vec<GalaxyRow>, CatalogError> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).map_err(|_| CatalogError::MissingInput(path.to_path_buf()))?;

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let (_, header) = lines.next().ok_or_else(|| CatalogError::Parse {
        path: path.to_path_buf(),
        line: 1,
        message: "table is empty".to_string(),
    })?;
    let names: Vec<&str> = header.split_whitespace().collect();
    let column = |name: &str| -> Result<usize, CatalogError> {
        names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let (ra_col, dec_col) = (column("ra")?, column("dec")?);
    let (a_col, b_col, theta_col) = (column("a")?, column("b")?, column("theta")?);

    let mut rows = Vec::new();
    for (line, raw) in lines {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() < names.len() {
            return Err(CatalogError::Parse {
                path: path.to_path_buf(),
                line,
                message: format!(
                    "expected {} columns, found {}",
                    names.len(),
                    fields.len()
                ),
            });
        }
        rows.push(GalaxyRow {
            ra_deg: parse_f64(fields[ra_col], path, line, "ra")?,
            dec_deg: parse_f64(fields[dec_col], path, line, "dec")?,
            a_deg: parse_f64(fields[a_col], path, line, "a")?,
            b_deg: parse_f64(fields[b_col], path, line, "b")?,
            theta_deg: parse_f64(fields[theta_col], path, line, "theta")?,
        });
    }
    debug!("read {} galaxy rows from {}", rows.len(), path.display());
    Ok(rows)
}
