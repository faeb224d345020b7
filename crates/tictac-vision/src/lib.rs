//! High-level facade crate for the `tictac-vision-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the underlying crates,
//! - JSON configuration and run reports ([`io`]),
//! - (feature `image`) adapters between `image::RgbImage` and the core view
//!   types, and a frame source replaying a directory of still images.
//!
//! ## Quickstart
//!
//! ```no_run
//! use tictac_vision::detect;
//! use tictac_vision::grid::GridLocatorParams;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("frame.png")?.to_rgb8();
//! let regions = detect::locate_cells(&img, &GridLocatorParams::default())?;
//! println!("centre cell at {:?}", regions[4].center);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `tictac_vision::core`: image views, HSV envelopes, quads, homography.
//! - `tictac_vision::grid`: one-time grid calibration.
//! - `tictac_vision::board`: cell classification, state tracking, actuator
//!   commands and the tick-loop session.
//! - `tictac_vision::print`: printable boards and synthetic frames.
//! - `tictac_vision::io`: [`TrackerConfig`] and [`RunReport`] JSON files.
//! - `tictac_vision::detect` (feature `image`): helpers from `image::RgbImage`.
//! - `tictac_vision::frames` (feature `image`): [`frames::DirectoryFrameSource`].

pub use tictac_vision_board as board;
pub use tictac_vision_core as core;
pub use tictac_vision_grid as grid;
pub use tictac_vision_print as print;

pub use tictac_vision_board::{
    ActuatorCommand, BoardEvent, BoardStateTracker, CellState, MarkerKind, Session, TickReport,
    UpdateReport,
};
pub use tictac_vision_core::{CellRegion, RgbImage};
pub use tictac_vision_grid::GridLocator;

pub mod io;

pub use io::{ConfigIoError, RunReport, TrackerConfig};

#[cfg(feature = "image")]
pub mod detect;

#[cfg(feature = "image")]
pub mod frames;
