#![allow(dead_code)]

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use parkgate_plate::{OcrEngine, OcrError, OcrOptions};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const BACKGROUND: Rgb<u8> = Rgb([60, 60, 60]);
pub const PLATE: Rgb<u8> = Rgb([235, 235, 235]);
pub const INK: Rgb<u8> = Rgb([15, 15, 15]);

/// Plate rectangle used by the synthetic frames: x, y, width, height.
pub const PLATE_RECT: (i32, i32, u32, u32) = (40, 50, 200, 60);

/// Gray frame with a light plate and, optionally, nine dark glyph blocks on it.
pub fn plate_frame(with_glyphs: bool) -> RgbImage {
    let mut frame = RgbImage::from_pixel(360, 200, BACKGROUND);
    let (x, y, w, h) = PLATE_RECT;
    draw_filled_rect_mut(&mut frame, Rect::at(x, y).of_size(w, h), PLATE);
    if with_glyphs {
        for i in 0..9 {
            let gx = x + 12 + i * 20;
            draw_filled_rect_mut(&mut frame, Rect::at(gx, y + 13).of_size(10, 34), INK);
        }
    }
    frame
}

/// Adds a large light triangle to the right of the plate.
pub fn add_triangle(frame: &mut RgbImage) {
    let pts = [Point::new(300, 40), Point::new(350, 150), Point::new(250, 150)];
    draw_polygon_mut(frame, &pts, PLATE);
}

/// OCR double that always answers the same text and counts calls.
pub struct ScriptedOcr {
    pub reply: String,
    pub calls: AtomicUsize,
}

impl ScriptedOcr {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize(&self, _image: &image::GrayImage, _options: &OcrOptions) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}
