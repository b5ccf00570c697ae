//! Perspective rectification of plate candidates.

use crate::PlateCandidate;
use image::{imageops, RgbImage};
use nalgebra::{distance, Point2};
use parkgate_core::{homography_from_4pt, order_corners, warp_perspective_rgb, Quad};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RectifyError {
    #[error("degenerate plate size {width}x{height}")]
    Degenerate { width: u32, height: u32 },
    #[error("plate corners admit no projective mapping")]
    Singular,
    #[error("trimming {trim}px leaves nothing of a {width}x{height} plate")]
    TrimmedAway { width: u32, height: u32, trim: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifierParams {
    /// Pixels removed from every side of the warped plate.
    pub border_trim: u32,
}

impl Default for RectifierParams {
    fn default() -> Self {
        Self { border_trim: 5 }
    }
}

/// A plate resampled to a frontal view.
#[derive(Clone, Debug)]
pub struct RectifiedPlate {
    pub image: RgbImage,
    /// Source corners as `[TL, TR, BR, BL]`.
    pub corners: [Point2<f32>; 4],
}

#[derive(Clone, Debug, Default)]
pub struct Rectifier {
    params: RectifierParams,
}

impl Rectifier {
    pub fn new(params: RectifierParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RectifierParams {
        &self.params
    }

    pub fn rectify(
        &self,
        frame: &RgbImage,
        candidate: &PlateCandidate,
    ) -> Result<RectifiedPlate, RectifyError> {
        self.rectify_quad(frame, &candidate.quad)
    }

    /// Warp the region bounded by `quad` to an upright rectangle.
    ///
    /// The output size follows the longer of each pair of opposite edges,
    /// truncated to whole pixels, minus the border trim on every side.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, frame)))]
    pub fn rectify_quad(&self, frame: &RgbImage, quad: &Quad) -> Result<RectifiedPlate, RectifyError> {
        let corners = order_corners(&quad.corners);
        let [tl, tr, br, bl] = corners;

        let width = (distance(&br, &bl) as u32).max(distance(&tr, &tl) as u32);
        let height = (distance(&tr, &br) as u32).max(distance(&tl, &bl) as u32);
        if width < 1 || height < 1 {
            return Err(RectifyError::Degenerate { width, height });
        }

        let (w, h) = ((width - 1) as f32, (height - 1) as f32);
        let target = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ];
        let h_src_from_dst = homography_from_4pt(&target, &corners).ok_or(RectifyError::Singular)?;
        let warped = warp_perspective_rgb(frame, &h_src_from_dst, width, height);

        let trim = self.params.border_trim;
        if trim == 0 {
            return Ok(RectifiedPlate {
                image: warped,
                corners,
            });
        }
        if width <= 2 * trim || height <= 2 * trim {
            return Err(RectifyError::TrimmedAway { width, height, trim });
        }
        let image =
            imageops::crop_imm(&warped, trim, trim, width - 2 * trim, height - 2 * trim).to_image();
        Ok(RectifiedPlate { image, corners })
    }
}
