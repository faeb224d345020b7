//! Printable boards and synthetic frames.
//!
//! Two products share one layout model:
//! - a printable page (A4 by default) with a centred 3×3 grid,
//! - a synthetic "camera frame" with the board placed at a pixel offset and
//!   optional markers drawn into cells, used to exercise calibration,
//!   classification and tracking without a camera.

mod layout;
mod render;

pub use layout::{BoardLayout, BoardLayoutError, MarkerStyle, PageSpec};
pub use render::{render_page, SyntheticFrame};
