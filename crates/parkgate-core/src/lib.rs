//! Core types and utilities for the parkgate plate pipeline.
//!
//! This crate is intentionally small and purely geometric: polygon helpers
//! for contour filtering, corner ordering, a 4-point homography solver and
//! the perspective warp used to rectify plate regions. It does *not* depend
//! on an edge detector or an OCR engine.

mod geometry;
mod homography;
mod logger;
mod raster;

pub use geometry::{
    approx_poly_dp, arc_length, bounding_rect, is_convex, order_corners, polygon_area,
    BoundingBox, Quad,
};
pub use homography::{homography_from_4pt, warp_perspective_rgb, Homography};
pub use raster::{sample_bilinear_rgb, sample_bilinear_rgb_u8};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
