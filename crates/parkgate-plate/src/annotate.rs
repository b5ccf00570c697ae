//! Debug overlay of localizer decisions.

use crate::LocalizeDiagnostics;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use parkgate_core::BoundingBox;

pub const RECTANGLE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const TRIANGLE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const REJECTED_COLOR: Rgb<u8> = Rgb([128, 128, 128]);

const RECTANGLE_MARGIN: i32 = 8;
const TRIANGLE_MARGIN: i32 = 4;

/// Copy of `frame` with the shapes of one localizer pass outlined.
///
/// Rectangles (accepted or not) are red and padded by 8 px, triangles green
/// and padded by 4 px, non-convex contours gray.
pub fn annotate(frame: &RgbImage, diagnostics: &LocalizeDiagnostics) -> RgbImage {
    let mut out = frame.clone();
    for bbox in &diagnostics.non_convex {
        outline(&mut out, *bbox, 0, REJECTED_COLOR);
    }
    let rectangles = diagnostics
        .candidates
        .iter()
        .chain(&diagnostics.uncorroborated)
        .chain(&diagnostics.degenerate_quads);
    for bbox in rectangles {
        outline(&mut out, *bbox, RECTANGLE_MARGIN, RECTANGLE_COLOR);
    }
    for bbox in &diagnostics.triangles {
        outline(&mut out, *bbox, TRIANGLE_MARGIN, TRIANGLE_COLOR);
    }
    out
}

fn outline(canvas: &mut RgbImage, bbox: BoundingBox, margin: i32, color: Rgb<u8>) {
    let b = bbox.inflate(margin);
    if b.width == 0 || b.height == 0 {
        return;
    }
    draw_hollow_rect_mut(canvas, Rect::at(b.x, b.y).of_size(b.width, b.height), color);
}
