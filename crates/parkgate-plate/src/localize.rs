//! Edge/contour based plate localisation.
//!
//! A frame is reduced to an intensity image, run through Canny and traced
//! for outer borders. Each top-level border is filtered in two passes:
//! a fine polygon approximation that must be convex, then a coarse one whose
//! vertex count decides the shape. Four-vertex shapes may additionally have
//! to show enough inner structure (characters) to count as a plate.

use image::{imageops, GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use log::{debug, trace};
use nalgebra::Point2;
use parkgate_core::{
    approx_poly_dp, arc_length, bounding_rect, is_convex, polygon_area, BoundingBox, Quad,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::iter::FusedIterator;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Inner-structure check applied to rectangular candidates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorroborationParams {
    /// A crop must contain strictly more contours than this.
    pub min_inner_contours: usize,
}

impl Default for CorroborationParams {
    fn default() -> Self {
        Self {
            min_inner_contours: 10,
        }
    }
}

/// Parameters for [`Localizer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerParams {
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
    /// Contours must enclose strictly more than this many square pixels.
    pub min_area: f64,
    /// First-pass approximation tolerance, as a fraction of the arc length.
    pub convexity_epsilon: f64,
    /// Second-pass approximation tolerance, as a fraction of the arc length.
    pub shape_epsilon: f64,
    /// `None` disables the inner-structure gate. In TOML, `corroboration = false`.
    #[serde(
        serialize_with = "serialize_corroboration",
        deserialize_with = "deserialize_corroboration"
    )]
    pub corroboration: Option<CorroborationParams>,
}

impl Default for LocalizerParams {
    fn default() -> Self {
        Self {
            canny_low: 100.0,
            canny_high: 200.0,
            min_area: 150.0,
            convexity_epsilon: 0.025,
            shape_epsilon: 0.07,
            corroboration: Some(CorroborationParams::default()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CorroborationToggle {
    Flag(bool),
    Params(CorroborationParams),
}

fn serialize_corroboration<S: Serializer>(
    value: &Option<CorroborationParams>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(params) => params.serialize(serializer),
        None => serializer.serialize_bool(false),
    }
}

fn deserialize_corroboration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<CorroborationParams>, D::Error> {
    Ok(match CorroborationToggle::deserialize(deserializer)? {
        CorroborationToggle::Flag(true) => Some(CorroborationParams::default()),
        CorroborationToggle::Flag(false) => None,
        CorroborationToggle::Params(p) => Some(p),
    })
}

/// A plate-shaped quadrilateral found in a frame.
///
/// The quad is convex with an enclosed area above the localizer's minimum;
/// its corners are in approximation order, see [`Quad::ordered`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlateCandidate {
    pub quad: Quad,
    pub bbox: BoundingBox,
    /// Enclosed area of the quad in square pixels.
    pub area: f64,
}

/// What the localizer threw away, and why.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LocalizeDiagnostics {
    /// Top-level contours seen so far.
    pub contours: usize,
    /// Contours at or below the area threshold.
    pub undersized: Vec<BoundingBox>,
    /// Contours whose fine approximation is not convex.
    pub non_convex: Vec<BoundingBox>,
    /// Three-vertex shapes.
    pub triangles: Vec<BoundingBox>,
    /// Four-vertex shapes that are not convex or too small after coarse approximation.
    pub degenerate_quads: Vec<BoundingBox>,
    /// Rectangles rejected by the inner-structure gate.
    pub uncorroborated: Vec<BoundingBox>,
    /// Coarse approximations with neither 3 nor 4 vertices.
    pub other_shapes: usize,
    /// Candidates handed out.
    pub candidates: Vec<BoundingBox>,
}

/// Finds plate candidates in color frames.
#[derive(Clone, Debug, Default)]
pub struct Localizer {
    params: LocalizerParams,
}

impl Localizer {
    pub fn new(params: LocalizerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LocalizerParams {
        &self.params
    }

    /// Start a single pass over `frame`.
    ///
    /// Edge detection and contour tracing happen here; classification of
    /// each contour happens lazily as the iterator is advanced.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn candidates(&self, frame: &RgbImage) -> CandidateIter {
        let gray = imageops::grayscale(frame);
        let edges = edge_map(&gray, &self.params);
        let contours: Vec<Vec<Point2<i32>>> = find_contours::<i32>(&edges)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| c.points.into_iter().map(|p| Point2::new(p.x, p.y)).collect())
            .collect();
        debug!(
            "localizer: {} external contours in {}x{} frame",
            contours.len(),
            frame.width(),
            frame.height()
        );
        CandidateIter {
            params: self.params.clone(),
            gray,
            contours: contours.into_iter(),
            diagnostics: LocalizeDiagnostics::default(),
        }
    }
}

/// Lazy, single-use sequence of candidates for one frame.
///
/// Owns the intensity image and the traced contours; once `next` returns
/// `None` it keeps returning `None`.
pub struct CandidateIter {
    params: LocalizerParams,
    gray: GrayImage,
    contours: std::vec::IntoIter<Vec<Point2<i32>>>,
    diagnostics: LocalizeDiagnostics,
}

impl CandidateIter {
    pub fn diagnostics(&self) -> &LocalizeDiagnostics {
        &self.diagnostics
    }

    /// Drain the remaining candidates and return the final diagnostics.
    pub fn finish(mut self) -> LocalizeDiagnostics {
        for _ in self.by_ref() {}
        self.diagnostics
    }

    fn classify(&mut self, contour: &[Point2<i32>]) -> Option<PlateCandidate> {
        let p = &self.params;
        let diag = &mut self.diagnostics;
        diag.contours += 1;

        let bbox = bounding_rect(contour)?;
        if polygon_area(contour) <= p.min_area {
            diag.undersized.push(bbox);
            return None;
        }

        let perimeter = arc_length(contour, true);
        let fine = approx_poly_dp(contour, p.convexity_epsilon * perimeter, true);
        if !is_convex(&fine) {
            diag.non_convex.push(bbox);
            return None;
        }

        let coarse = approx_poly_dp(contour, p.shape_epsilon * perimeter, true);
        let shape_box = bounding_rect(&coarse)?;
        match coarse.len() {
            3 => {
                diag.triangles.push(shape_box);
                None
            }
            4 => {
                let area = polygon_area(&coarse);
                if !is_convex(&coarse) || area <= p.min_area {
                    diag.degenerate_quads.push(shape_box);
                    return None;
                }
                if let Some(gate) = &p.corroboration {
                    let inner = count_inner_contours(&self.gray, shape_box, p);
                    if inner <= gate.min_inner_contours {
                        trace!("rectangle {shape_box:?} has {inner} inner contours, rejected");
                        diag.uncorroborated.push(shape_box);
                        return None;
                    }
                }
                let quad = Quad::from_polygon(&coarse)?;
                diag.candidates.push(shape_box);
                Some(PlateCandidate {
                    quad,
                    bbox: shape_box,
                    area,
                })
            }
            _ => {
                diag.other_shapes += 1;
                None
            }
        }
    }
}

impl Iterator for CandidateIter {
    type Item = PlateCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(contour) = self.contours.next() {
            if let Some(candidate) = self.classify(&contour) {
                return Some(candidate);
            }
        }
        None
    }
}

impl FusedIterator for CandidateIter {}

/// Number of contours (all nesting levels) in the edge map of a crop.
fn count_inner_contours(gray: &GrayImage, bbox: BoundingBox, params: &LocalizerParams) -> usize {
    let Some(roi) = bbox.clip(gray.width(), gray.height()) else {
        return 0;
    };
    let crop = imageops::crop_imm(gray, roi.x as u32, roi.y as u32, roi.width, roi.height).to_image();
    find_contours::<i32>(&edge_map(&crop, params)).len()
}

/// Canny with the hysteresis thresholds taken in ascending order.
fn edge_map(gray: &GrayImage, params: &LocalizerParams) -> GrayImage {
    let low = params.canny_low.min(params.canny_high);
    let high = params.canny_low.max(params.canny_high);
    canny(gray, low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let p = LocalizerParams::default();
        assert_eq!((p.canny_low, p.canny_high), (100.0, 200.0));
        assert_eq!(p.min_area, 150.0);
        assert_eq!(p.convexity_epsilon, 0.025);
        assert_eq!(p.shape_epsilon, 0.07);
        assert_eq!(p.corroboration.map(|c| c.min_inner_contours), Some(10));
    }

    #[test]
    fn swapped_thresholds_still_trace() {
        let mut frame = RgbImage::from_pixel(80, 60, image::Rgb([40, 40, 40]));
        for y in 20..40 {
            for x in 20..60 {
                frame.put_pixel(x, y, image::Rgb([220, 220, 220]));
            }
        }
        let swapped = LocalizerParams {
            canny_low: 200.0,
            canny_high: 100.0,
            corroboration: None,
            ..LocalizerParams::default()
        };
        let ordered = LocalizerParams {
            corroboration: None,
            ..LocalizerParams::default()
        };
        let a = Localizer::new(swapped).candidates(&frame).finish();
        let b = Localizer::new(ordered).candidates(&frame).finish();
        assert_eq!(a.contours, b.contours);
        assert!(a.contours > 0);
    }

    #[test]
    fn corroboration_toggle_serde() {
        let off: LocalizerParams =
            serde_json::from_str(r#"{"corroboration": false}"#).expect("parse");
        assert!(off.corroboration.is_none());
        assert_eq!(off.min_area, 150.0);

        let on: LocalizerParams = serde_json::from_str(r#"{"corroboration": true}"#).expect("parse");
        assert_eq!(on.corroboration, Some(CorroborationParams::default()));

        let custom: LocalizerParams =
            serde_json::from_str(r#"{"corroboration": {"min_inner_contours": 3}}"#).expect("parse");
        assert_eq!(custom.corroboration.map(|c| c.min_inner_contours), Some(3));

        let json = serde_json::to_string(&off).expect("serialize");
        assert!(json.contains(r#""corroboration":false"#));
    }

    /// Closed polyline through `corners`, one point per pixel step.
    fn trace(corners: &[(i32, i32)]) -> Vec<Point2<i32>> {
        let mut pts = Vec::new();
        for i in 0..corners.len() {
            let (a, b) = (corners[i], corners[(i + 1) % corners.len()]);
            let steps = (b.0 - a.0).abs().max((b.1 - a.1).abs());
            for t in 0..steps {
                pts.push(Point2::new(
                    a.0 + (b.0 - a.0) * t / steps,
                    a.1 + (b.1 - a.1) * t / steps,
                ));
            }
        }
        pts
    }

    fn iter_over(contours: Vec<Vec<Point2<i32>>>, params: LocalizerParams) -> CandidateIter {
        CandidateIter {
            params,
            gray: GrayImage::new(200, 200),
            contours: contours.into_iter(),
            diagnostics: LocalizeDiagnostics::default(),
        }
    }

    #[test]
    fn contours_are_sorted_by_shape() {
        let params = LocalizerParams {
            corroboration: None,
            ..LocalizerParams::default()
        };
        let contours = vec![
            trace(&[(10, 10), (110, 10), (110, 40), (10, 40)]),
            trace(&[(0, 0), (5, 0), (5, 5), (0, 5)]),
            trace(&[(120, 120), (180, 120), (150, 170)]),
            trace(&[(10, 100), (90, 100), (90, 180), (50, 120), (10, 180)]),
            trace(&[(130, 10), (190, 20), (185, 60), (125, 50)]),
        ];
        let mut iter = iter_over(contours, params);

        let first = iter.next().expect("first rectangle");
        assert_eq!(
            first.bbox,
            BoundingBox {
                x: 10,
                y: 10,
                width: 101,
                height: 31
            }
        );
        assert_eq!(first.area, 3000.0);
        let second = iter.next().expect("skewed rectangle");
        assert_eq!(second.bbox.x, 125);
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());

        let diag = iter.diagnostics();
        assert_eq!(diag.contours, 5);
        assert_eq!(diag.undersized.len(), 1);
        assert_eq!(diag.triangles.len(), 1);
        assert_eq!(diag.non_convex.len(), 1);
        assert_eq!(diag.candidates.len(), 2);
    }

    #[test]
    fn gate_rejects_rectangles_without_inner_structure() {
        let contours = vec![trace(&[(10, 10), (110, 10), (110, 40), (10, 40)])];
        let mut iter = iter_over(contours, LocalizerParams::default());
        assert!(iter.next().is_none());
        assert_eq!(iter.diagnostics().uncorroborated.len(), 1);
    }

    #[test]
    fn blank_frame_has_no_candidates() {
        let frame = RgbImage::from_pixel(64, 48, image::Rgb([90, 90, 90]));
        let mut iter = Localizer::default().candidates(&frame);
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
        assert_eq!(iter.diagnostics().contours, 0);
    }
}
