//! Per-frame cell classification and the board-state machine.
//!
//! A [`Session`] calibrates once with [`tictac_vision_grid::GridLocator`],
//! captures an empty-board reference per cell and then, tick by tick, feeds
//! frames through [`BoardStateTracker::update`]. Placements by the human
//! player become [`ActuatorCommand`]s sent over an optional
//! [`ActuatorChannel`].
//!
//! ## Quickstart
//!
//! ```
//! use tictac_vision_board::{
//!     classify_transition, ActuatorCommand, CellDiff, CellState, TransitionKind,
//! };
//!
//! let mut previous = [CellState::Empty; 9];
//! let mut current = previous;
//! current[4] = CellState::Occupied(None);
//! let diff = CellDiff::between(&previous, &current);
//! assert_eq!(classify_transition(&diff), TransitionKind::Placement { cell: 4 });
//! assert_eq!(ActuatorCommand::human_placement(4).encode(), [1, 5]);
//! previous = current;
//! assert!(CellDiff::between(&previous, &current).is_unchanged());
//! ```

mod actuator;
mod classifier;
mod session;
mod tracker;
mod types;

pub use actuator::{
    ActuatorChannel, ActuatorCommand, CommandKind, Disconnected, MemoryChannel, StreamChannel,
};
pub use classifier::{
    Cell, CellClassifier, CellSample, ClassifierParams, ColorCounts, ColorRule, ColorVerdict,
    EmptinessReading, SampleParams, COLOR_RULES,
};
pub use session::{
    Calibration, CooldownGate, FrameError, FrameSource, Session, SessionError, SessionParams,
    TickOutcome, TickReport,
};
pub use tracker::{
    classify_transition, BoardEvent, BoardStateTracker, CellDiff, MovePolicy, NoOpReason,
    Placement, RuleViolation, TrackerParams, TransitionKind, UpdateReport,
};
pub use types::{BoardSnapshot, CellState, MarkerKind};
