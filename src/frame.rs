//! Science frame representation and per-instrument flux calibration.
//!
//! A [`ScienceFrame`] owns the pixel buffer for the duration of one correction
//! pass, together with the handful of header cards the pipeline needs
//! downstream (projection, flux scaling, target position). The two instrument
//! families carry their image and metadata differently:
//!
//! - **HST** science frames (`*sci.fits`): image and headers in the primary
//!   HDU, flux calibration through `PHOTFNU` in Jy per count.
//! - **JWST** anchored mosaics (`*anchored.fits`): image and headers in the
//!   first extension, surface brightness in MJy/sr converted through the
//!   pixel solid angle `PIXAR_SR`.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::Array2;
use thiserror::Error;

/// Jansky to millijansky, applied to HST frames after the `PHOTFNU` scaling.
const JY_TO_MJY: f64 = 1e3;

/// Megajansky to millijansky, applied to JWST frames together with `PIXAR_SR`.
const MEGAJY_TO_MJY: f64 = 1e9;

/// Errors raised while interpreting frame metadata.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("required header card {0} is missing")]
    MissingCard(String),
    #[error("frame was already calibrated; unit scaling must run exactly once")]
    AlreadyCalibrated,
}

/// Instrument family, inferred from the input filename the same way the
/// observing pipeline names its products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentFamily {
    Hst,
    Jwst,
}

impl InstrumentFamily {
    /// Detect the family from a file name: `sci` marks an HST science
    /// frame, `anchored` a JWST mosaic. Returns `None` for anything else.
    pub fn from_filename<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?;
        if name.contains("anchored") {
            Some(InstrumentFamily::Jwst)
        } else if name.contains("sci") {
            Some(InstrumentFamily::Hst)
        } else {
            None
        }
    }
}

/// One header card value, typed the way FITS types its cards.
#[derive(Debug, Clone, PartialEq)]
pub enum CardValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl CardValue {
    /// Numeric view of the card; integer cards widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            CardValue::Int(v) => Some(v as f64),
            CardValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

/// The input header, carried through to the output unmodified.
///
/// Holds every card of the image HDU (and the primary before it), not just
/// the handful the pipeline itself consumes; downstream photometry relies on
/// cards like `EXPTIME` and `BUNIT` surviving the correction. Deterministic
/// iteration order so output headers are stable across runs.
#[derive(Debug, Clone, Default)]
pub struct FrameHeader {
    cards: BTreeMap<String, CardValue>,
}

impl FrameHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a numeric card.
    pub fn insert(&mut self, key: &str, value: f64) {
        self.cards.insert(key.to_string(), CardValue::Float(value));
    }

    pub fn insert_card(&mut self, key: &str, value: CardValue) {
        self.cards.insert(key.to_string(), value);
    }

    /// Numeric value of a card, if present and numeric.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.cards.get(key).and_then(CardValue::as_f64)
    }

    pub fn get_card(&self, key: &str) -> Option<&CardValue> {
        self.cards.get(key)
    }

    /// Like [`get`](Self::get) but missing cards become a [`FrameError`].
    pub fn require(&self, key: &str) -> Result<f64, FrameError> {
        self.get(key)
            .ok_or_else(|| FrameError::MissingCard(key.to_string()))
    }

    /// Iterate cards in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CardValue)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One image and its retained metadata, mutable in place during correction.
#[derive(Debug, Clone)]
pub struct ScienceFrame {
    /// Pixel values indexed `[[row, col]]`; row 0 is the first stored FITS
    /// row, so a 1-based FITS coordinate `(x, y)` addresses `[[y-1, x-1]]`.
    pub data: Array2<f64>,
    pub header: FrameHeader,
    pub family: InstrumentFamily,
    calibrated: bool,
}

impl ScienceFrame {
    pub fn new(data: Array2<f64>, header: FrameHeader, family: InstrumentFamily) -> Self {
        Self {
            data,
            header,
            family,
            calibrated: false,
        }
    }

    /// `(rows, cols)` of the pixel buffer.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Apply the per-family unit scaling, exactly once.
    ///
    /// Must run before any background estimation or infill: the noise
    /// statistics are only meaningful in the final pixel units. A second
    /// call fails rather than silently re-scaling the buffer.
    pub fn calibrate(&mut self) -> Result<(), FrameError> {
        if self.calibrated {
            return Err(FrameError::AlreadyCalibrated);
        }
        let factor = match self.family {
            InstrumentFamily::Hst => self.header.require("PHOTFNU")? * JY_TO_MJY,
            InstrumentFamily::Jwst => self.header.require("PIXAR_SR")? * MEGAJY_TO_MJY,
        };
        self.data.mapv_inplace(|v| v * factor);
        self.calibrated = true;
        Ok(())
    }

    /// Sky position used as the center of the star catalog cone search.
    ///
    /// HST stores the target in the primary header (`RA_TARG`/`DEC_TARG`);
    /// JWST carries the telescope boresight (`RA_V1`/`DEC_V1`).
    pub fn target_coordinates(&self) -> Result<(f64, f64), FrameError> {
        match self.family {
            InstrumentFamily::Hst => Ok((
                self.header.require("RA_TARG")?,
                self.header.require("DEC_TARG")?,
            )),
            InstrumentFamily::Jwst => Ok((
                self.header.require("RA_V1")?,
                self.header.require("DEC_V1")?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hst_frame() -> ScienceFrame {
        let mut header = FrameHeader::new();
        header.insert("PHOTFNU", 2.0e-7);
        header.insert("RA_TARG", 41.0);
        header.insert("DEC_TARG", -30.0);
        ScienceFrame::new(
            Array2::from_elem((4, 4), 10.0),
            header,
            InstrumentFamily::Hst,
        )
    }

    #[test]
    fn test_family_from_filename() {
        assert_eq!(
            InstrumentFamily::from_filename("ngc1087_f555w_sci.fits"),
            Some(InstrumentFamily::Hst)
        );
        assert_eq!(
            InstrumentFamily::from_filename("/data/ngc1087_F200W_anchored.fits"),
            Some(InstrumentFamily::Jwst)
        );
        assert_eq!(InstrumentFamily::from_filename("random.fits"), None);
    }

    #[test]
    fn test_hst_calibration_scales_by_photfnu() {
        let mut frame = hst_frame();
        frame.calibrate().unwrap();
        // 10.0 * PHOTFNU * 1e3
        assert_relative_eq!(frame.data[[0, 0]], 10.0 * 2.0e-7 * 1e3, epsilon = 1e-15);
        assert!(frame.is_calibrated());
    }

    #[test]
    fn test_jwst_calibration_scales_by_pixar_sr() {
        let mut header = FrameHeader::new();
        header.insert("PIXAR_SR", 9.3e-14);
        let mut frame = ScienceFrame::new(
            Array2::from_elem((2, 2), 5.0),
            header,
            InstrumentFamily::Jwst,
        );
        frame.calibrate().unwrap();
        assert_relative_eq!(frame.data[[1, 1]], 5.0 * 9.3e-14 * 1e9, epsilon = 1e-15);
    }

    #[test]
    fn test_double_calibration_rejected() {
        let mut frame = hst_frame();
        frame.calibrate().unwrap();
        assert!(matches!(
            frame.calibrate(),
            Err(FrameError::AlreadyCalibrated)
        ));
    }

    #[test]
    fn test_missing_flux_card() {
        let mut frame = ScienceFrame::new(
            Array2::zeros((2, 2)),
            FrameHeader::new(),
            InstrumentFamily::Hst,
        );
        match frame.calibrate() {
            Err(FrameError::MissingCard(card)) => assert_eq!(card, "PHOTFNU"),
            other => panic!("expected MissingCard, got {other:?}"),
        }
    }

    #[test]
    fn test_integer_cards_widen_for_numeric_consumers() {
        let mut header = FrameHeader::new();
        header.insert_card("EXPTIME", CardValue::Int(507));
        header.insert_card("BUNIT", CardValue::Str("MJy/sr".to_string()));
        assert_eq!(header.get("EXPTIME"), Some(507.0));
        assert_eq!(header.require("EXPTIME").unwrap(), 507.0);
        assert_eq!(header.get("BUNIT"), None);
        assert_eq!(
            header.get_card("BUNIT"),
            Some(&CardValue::Str("MJy/sr".to_string()))
        );
    }

    #[test]
    fn test_target_coordinates_per_family() {
        let frame = hst_frame();
        assert_eq!(frame.target_coordinates().unwrap(), (41.0, -30.0));

        let mut header = FrameHeader::new();
        header.insert("RA_V1", 12.5);
        header.insert("DEC_V1", 3.25);
        let jwst = ScienceFrame::new(Array2::zeros((1, 1)), header, InstrumentFamily::Jwst);
        assert_eq!(jwst.target_coordinates().unwrap(), (12.5, 3.25));
    }
}
