//! One-time geometric calibration of a 3×3 board.
//!
//! Pipeline, each step a pure function of its inputs:
//! 1. Centre-crop the frame.
//! 2. Threshold grid-line colours into a binary mask and clean it with
//!    dilate, close, open and a 3×3 median.
//! 3. Take the largest line blob as the outer boundary.
//! 4. Fill the boundary quad, erode it inward and remove line pixels.
//! 5. Keep interior blobs within the configured area range; exactly nine
//!    must remain.
//! 6. Order them row-major and shift back to full-frame coordinates.
//!
//! ## Quickstart
//!
//! ```
//! use tictac_vision_core::RgbImage;
//! use tictac_vision_grid::{GridLocator, GridLocatorParams};
//!
//! let frame = RgbImage::filled(64, 48, [230, 230, 230]);
//! let locator = GridLocator::new(GridLocatorParams::default());
//! assert!(locator.locate(&frame.view()).is_none());
//! ```

mod blobs;
mod error;
mod locator;
mod mask;
mod params;

pub use blobs::{find_blobs, Blob};
pub use error::CalibrationError;
pub use locator::{line_mask, order_row_major, GridLocator};
pub use mask::{centre_window, BinaryMask, Window};
pub use params::{CropParams, GridLocatorParams};
