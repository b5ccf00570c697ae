//! Global Otsu binarisation for OCR input.

use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;

/// Otsu threshold over an 8-bit histogram.
///
/// Pixels `> t` belong to the bright class. A flat image returns its only
/// level, so it binarises to black.
pub fn otsu_threshold(image: &GrayImage) -> u8 {
    let mut samples = image.as_raw().iter().copied();
    let Some(first) = samples.next() else {
        return 127;
    };
    if samples.all(|v| v == first) {
        return first;
    }
    otsu_level(image)
}

/// `255` where the pixel is above `t`, `0` elsewhere.
pub fn binarize(image: &GrayImage, t: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y).0[0];
        Luma([if v > t { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_levels() {
        let img = GrayImage::from_fn(20, 10, |x, _| Luma([if x < 8 { 30 } else { 210 }]));
        let t = otsu_threshold(&img);
        assert!((30..210).contains(&t), "threshold {t}");
        let bin = binarize(&img, t);
        assert_eq!(bin.get_pixel(0, 0).0[0], 0);
        assert_eq!(bin.get_pixel(19, 9).0[0], 255);
    }

    #[test]
    fn splits_noisy_bimodal_histogram() {
        let img = GrayImage::from_fn(64, 4, |x, _| {
            let base = if x % 2 == 0 { 40 } else { 200 };
            Luma([base + (x % 7) as u8])
        });
        let t = otsu_threshold(&img);
        assert!((46..200).contains(&t), "threshold {t}");
    }

    #[test]
    fn empty_image_uses_midpoint() {
        assert_eq!(otsu_threshold(&GrayImage::new(0, 0)), 127);
    }

    #[test]
    fn flat_image_maps_to_black() {
        let img = GrayImage::from_pixel(4, 4, Luma([77]));
        assert_eq!(otsu_threshold(&img), 77);
        assert!(binarize(&img, 77).pixels().all(|p| p.0[0] == 0));
    }
}
