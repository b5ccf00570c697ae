//! Licence-plate localisation, rectification and reading.
//!
//! The pipeline is classical and runs on a single color frame:
//!
//! 1. [`Localizer`] finds convex quadrilaterals in the Canny edge map,
//! 2. [`Rectifier`] warps each one to a frontal view,
//! 3. [`PlateReader`] binarises the crop and asks an [`OcrEngine`] for text,
//!    keeping only results long enough to be a plate.
//!
//! [`PlateDetector`] chains the three for one frame. The OCR engine is an
//! opaque oracle; [`TesseractCli`] drives the `tesseract` executable.
//!
//! ```no_run
//! use std::sync::Arc;
//! use parkgate_plate::{DetectorParams, PlateDetector, TesseractCli};
//!
//! let frame = image::open("frame.jpg")?.to_rgb8();
//! let detector = PlateDetector::new(DetectorParams::default(), Arc::new(TesseractCli::default()));
//! for read in detector.detect(&frame)? {
//!     println!("{} at {:?}", read.text, read.candidate.bbox);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod annotate;
mod detector;
mod localize;
mod ocr;
mod read;
mod rectify;
mod threshold;

pub use detector::{DetectorParams, PlateDetector, PlateRead};
pub use localize::{
    CandidateIter, CorroborationParams, LocalizeDiagnostics, Localizer, LocalizerParams,
    PlateCandidate,
};
pub use ocr::{OcrEngine, OcrError, OcrOptions, TesseractCli};
pub use read::{normalize_text, NormalizeMode, PlateReader, PlateText, ReadError, ReaderParams};
pub use rectify::{RectifiedPlate, Rectifier, RectifierParams, RectifyError};
pub use threshold::{binarize, otsu_threshold};
