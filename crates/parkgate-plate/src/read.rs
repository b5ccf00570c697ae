//! Plate text extraction from a rectified crop.

use crate::ocr::{OcrEngine, OcrError, OcrOptions};
use crate::threshold::{binarize, otsu_threshold};
use image::{imageops, GrayImage, RgbImage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Ocr(#[from] OcrError),
}

/// Which characters survive normalisation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    #[default]
    Alphanumeric,
    /// Alphanumerics plus space, period and comma.
    WithPunctuation,
}

impl NormalizeMode {
    fn keeps(self, c: char) -> bool {
        match self {
            Self::Alphanumeric => c.is_alphanumeric(),
            Self::WithPunctuation => c.is_alphanumeric() || matches!(c, ' ' | '.' | ','),
        }
    }
}

/// Drop every character the mode does not keep.
pub fn normalize_text(raw: &str, mode: NormalizeMode) -> String {
    raw.chars().filter(|&c| mode.keeps(c)).collect()
}

/// A normalised string long enough to be treated as a plate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlateText(String);

impl PlateText {
    /// Normalise `raw`; `None` if fewer than `min_len` characters remain.
    pub fn parse(raw: &str, mode: NormalizeMode, min_len: usize) -> Option<Self> {
        let text = normalize_text(raw, mode);
        (text.chars().count() >= min_len).then_some(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PlateText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PlateText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderParams {
    pub normalize: NormalizeMode,
    /// Minimum normalised length of a plate.
    pub min_len: usize,
    pub ocr: OcrOptions,
}

impl Default for ReaderParams {
    fn default() -> Self {
        Self {
            normalize: NormalizeMode::Alphanumeric,
            min_len: 5,
            ocr: OcrOptions::default(),
        }
    }
}

/// Binarises a rectified plate and asks the OCR engine for its text.
#[derive(Clone)]
pub struct PlateReader {
    params: ReaderParams,
    engine: Arc<dyn OcrEngine>,
}

impl fmt::Debug for PlateReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlateReader")
            .field("params", &self.params)
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl PlateReader {
    pub fn new(params: ReaderParams, engine: Arc<dyn OcrEngine>) -> Self {
        Self { params, engine }
    }

    pub fn params(&self) -> &ReaderParams {
        &self.params
    }

    pub fn engine(&self) -> &dyn OcrEngine {
        self.engine.as_ref()
    }

    /// Intensity image thresholded at its Otsu level.
    pub fn binarize(&self, plate: &RgbImage) -> GrayImage {
        let gray = imageops::grayscale(plate);
        let t = otsu_threshold(&gray);
        binarize(&gray, t)
    }

    /// `Ok(None)` when the recognised text is too short to be a plate.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, plate), fields(engine = self.engine.name()))
    )]
    pub fn read(&self, plate: &RgbImage) -> Result<Option<PlateText>, ReadError> {
        let binary = self.binarize(plate);
        let raw = self.engine.recognize(&binary, &self.params.ocr)?;
        let text = PlateText::parse(&raw, self.params.normalize, self.params.min_len);
        if text.is_none() {
            debug!("OCR text {:?} is not a plate", raw.trim());
        }
        Ok(text)
    }
}
