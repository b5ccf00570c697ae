use crate::{
    LocalizeDiagnostics, Localizer, LocalizerParams, OcrEngine, PlateCandidate, PlateReader,
    PlateText, ReadError, ReaderParams, Rectifier, RectifierParams,
};
use image::RgbImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters for the whole frame pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub localizer: LocalizerParams,
    pub rectifier: RectifierParams,
    pub reader: ReaderParams,
}

/// One plate read from a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlateRead {
    pub text: PlateText,
    pub candidate: PlateCandidate,
}

/// Localize, rectify and read every plate in a frame.
#[derive(Clone, Debug)]
pub struct PlateDetector {
    localizer: Localizer,
    rectifier: Rectifier,
    reader: PlateReader,
}

impl PlateDetector {
    pub fn new(params: DetectorParams, engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            localizer: Localizer::new(params.localizer),
            rectifier: Rectifier::new(params.rectifier),
            reader: PlateReader::new(params.reader, engine),
        }
    }

    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    pub fn rectifier(&self) -> &Rectifier {
        &self.rectifier
    }

    pub fn reader(&self) -> &PlateReader {
        &self.reader
    }

    pub fn detect(&self, frame: &RgbImage) -> Result<Vec<PlateRead>, ReadError> {
        self.detect_with_diagnostics(frame).map(|(reads, _)| reads)
    }

    /// Like [`detect`](Self::detect), also returning what the localizer rejected.
    ///
    /// Candidates that cannot be rectified are skipped. A text read from
    /// several candidates is reported once, for the first of them.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn detect_with_diagnostics(
        &self,
        frame: &RgbImage,
    ) -> Result<(Vec<PlateRead>, LocalizeDiagnostics), ReadError> {
        let mut iter = self.localizer.candidates(frame);
        let mut reads: Vec<PlateRead> = Vec::new();

        for candidate in iter.by_ref() {
            let plate = match self.rectifier.rectify(frame, &candidate) {
                Ok(plate) => plate,
                Err(err) => {
                    debug!("skipping candidate {:?}: {err}", candidate.bbox);
                    continue;
                }
            };
            let Some(text) = self.reader.read(&plate.image)? else {
                continue;
            };
            if reads.iter().any(|r| r.text == text) {
                continue;
            }
            info!("plate {text} at {:?}", candidate.bbox);
            reads.push(PlateRead { text, candidate });
        }

        let diagnostics = iter.finish();
        debug!(
            "{} contours, {} candidates, {} plates",
            diagnostics.contours,
            diagnostics.candidates.len(),
            reads.len()
        );
        Ok((reads, diagnostics))
    }
}
