//! Core types and utilities for 3×3 board tracking.
//!
//! This crate is intentionally small: RGB image views, HSV colour envelopes,
//! quad geometry, a 4-point homography used to sample cells, grey-level
//! histograms and the workspace logger. It does *not* depend on any concrete
//! image decoding crate; the `tictac-vision` facade adapts `image` buffers.

mod color;
mod geometry;
mod histogram;
mod homography;
mod image;
mod logger;

pub use color::{rgb_to_hsv, ColorEnvelope, Hsv, HsvRange};
pub use geometry::{CellRegion, Quad};
pub use histogram::IntensityHistogram;
pub use homography::{homography_from_4pt, warp_quad_rgb, Homography};
pub use image::{luma, sample_bilinear_rgb, sample_bilinear_rgb_u8, RgbImage, RgbImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

/// Number of cells on the board.
pub const CELL_COUNT: usize = 9;
