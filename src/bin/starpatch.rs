//! Batch star/galaxy masking driver.
//!
//! # Usage
//!
//! ```bash
//! # Correct every science frame in a galaxy folder
//! starpatch patch data/ngc1087 --stars data/ngc1087_stars.csv
//!
//! # Reproducible noise
//! starpatch patch data/ngc1087 --stars stars.csv --seed 42
//!
//! # Repair a NaN hole in an already-corrected frame, in place
//! starpatch fix-nan out/ngc1087_f555w_sci_star_galaxy_corrected.fits \
//!     --x 1043 --y 2210 --radius 12
//! ```
//!
//! `patch` reads the galaxy ellipse table (`*.txt`) found next to the
//! frames, filters the star catalog export by parallax, and writes each
//! corrected frame to `<folder>_patch_corrected/` with the
//! `_star_galaxy_corrected.fits` suffix. Frames are flux-calibrated before
//! masking. `fix-nan` rewrites only non-finite pixels and leaves everything
//! else bit-for-bit unchanged.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use starpatch::catalog::{
    self, DEFAULT_PARALLAX_THRESHOLD, DEFAULT_STAR_RADIUS_PX,
};
use starpatch::io::{self, IoError};
use starpatch::masking;
use starpatch::wcs::TanWcs;
use starpatch::{PatchError, SkyRegion};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mask stars and galaxies in every science frame of a folder
    Patch {
        /// Galaxy folder holding *sci.fits / *anchored.fits frames and the
        /// galaxy ellipse table (*.txt)
        folder: PathBuf,

        /// Star catalog export: ra,dec,parallax rows
        #[arg(short, long)]
        stars: PathBuf,

        /// Parallax lower bound selecting foreground stars
        #[arg(long, default_value_t = DEFAULT_PARALLAX_THRESHOLD)]
        threshold: f64,

        /// Mask radius for each star, in pixels
        #[arg(long, default_value_t = DEFAULT_STAR_RADIUS_PX)]
        star_radius: f64,

        /// Noise seed; omit for a fresh realization each run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Replace NaN pixels inside a circle of an existing frame, in place
    FixNan {
        /// Frame to repair
        file: PathBuf,

        /// Defect center column, zero-based pixels
        #[arg(short, long)]
        x: f64,

        /// Defect center row, zero-based pixels
        #[arg(short, long)]
        y: f64,

        /// Repair radius in pixels
        #[arg(short, long)]
        radius: f64,

        /// Noise seed; omit for a fresh realization each run
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn run_patch(
    folder: PathBuf,
    stars: PathBuf,
    threshold: f64,
    star_radius: f64,
    seed: Option<u64>,
) -> Result<(), PatchError> {
    let inputs = io::discover_inputs(&folder)?;
    let out_dir = match io::create_output_dir(&folder) {
        Ok(dir) => dir,
        Err(IoError::PathExists(dir)) => {
            warn!("reusing existing output directory {}", dir.display());
            dir
        }
        Err(err) => return Err(err.into()),
    };

    let candidates = catalog::read_star_catalog(&stars)?;
    let foreground = catalog::filter_foreground(&candidates, threshold);
    let star_regions = catalog::star_regions(&foreground, star_radius);
    info!(
        "{} of {} catalog stars pass the parallax cut",
        foreground.len(),
        candidates.len()
    );

    let galaxy_regions: Vec<SkyRegion> = match inputs.galaxy_tables.first() {
        Some(table) => {
            let rows = catalog::read_galaxy_table(table)?;
            info!("read {} galaxy ellipses from {}", rows.len(), table.display());
            catalog::galaxy_regions(&rows)
        }
        None => {
            warn!("no galaxy table in {}, masking stars only", folder.display());
            Vec::new()
        }
    };

    let mut regions = star_regions;
    regions.extend(galaxy_regions);

    for input in &inputs.frames {
        // A bad frame is reported and skipped; the rest of the batch runs.
        if let Err(err) = correct_frame(input, &out_dir, &regions, seed) {
            error!("{}: {err}", input.display());
        }
    }
    Ok(())
}

fn correct_frame(
    input: &std::path::Path,
    out_dir: &std::path::Path,
    regions: &[SkyRegion],
    seed: Option<u64>,
) -> Result<(), PatchError> {
    let mut frame = io::read_frame(input)?;
    frame.calibrate()?;
    let wcs = TanWcs::from_header(&frame.header)?;

    let report = masking::patch_regions(&mut frame, &wcs, regions, seed)?;
    let output = io::output_path(out_dir, input);
    io::write_frame(&frame, &output)?;
    info!(
        "{}: {} regions patched, {} skipped, {} px redrawn -> {}",
        input.display(),
        report.regions_patched,
        report.regions_skipped,
        report.pixels_overwritten,
        output.display()
    );
    Ok(())
}

fn run_fix_nan(
    file: PathBuf,
    x: f64,
    y: f64,
    radius: f64,
    seed: Option<u64>,
) -> Result<(), PatchError> {
    let mut frame = io::read_frame(&file)?;
    let report = masking::patch_nan(&mut frame, x, y, radius, seed)?;
    io::write_frame(&frame, &file)?;
    info!(
        "{}: {} NaN px redrawn around ({x:.0}, {y:.0})",
        file.display(),
        report.pixels_overwritten
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Patch {
            folder,
            stars,
            threshold,
            star_radius,
            seed,
        } => run_patch(folder, stars, threshold, star_radius, seed)?,
        Commands::FixNan {
            file,
            x,
            y,
            radius,
            seed,
        } => run_fix_nan(file, x, y, radius, seed)?,
    }
    Ok(())
}
