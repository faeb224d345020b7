//! Pull-based tick loop: one frame in, at most one command out.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tictac_vision_core::{CellRegion, RgbImage, CELL_COUNT};
use tictac_vision_grid::{CalibrationError, GridLocator};

use crate::actuator::ActuatorChannel;
use crate::classifier::CellClassifier;
use crate::tracker::{BoardStateTracker, TrackerParams, UpdateReport};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Manual pause window, modelled as an explicit deadline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CooldownGate {
    until: Option<Instant>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause until `now + duration`. A later deadline already set is kept.
    pub fn pause(&mut self, now: Instant, duration: Duration) {
        let deadline = now + duration;
        self.until = Some(match self.until {
            Some(existing) if existing > deadline => existing,
            _ => deadline,
        });
    }

    #[inline]
    pub fn is_paused(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    /// Time left before updates resume; zero when not paused.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or_default()
    }

    pub fn resume(&mut self) {
        self.until = None;
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Transient failure; the next call may succeed.
    #[error("frame dropped: {reason}")]
    Dropped { reason: String },
    /// A finite source has no more frames.
    #[error("frame source exhausted")]
    Exhausted,
}

/// Lazy sequence of frames, e.g. a camera or a replayed recording.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<RgbImage, FrameError>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Result<RgbImage, FrameError>,
{
    fn next_frame(&mut self) -> Result<RgbImage, FrameError> {
        self()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("calibration failed after {attempts} attempts (last error: {last:?})")]
    Calibration {
        attempts: usize,
        last: Option<CalibrationError>,
    },
    #[error("frame source exhausted")]
    SourceExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionParams {
    /// Length of a pause started with [`Session::pause`].
    pub cooldown_ms: u64,
    /// Start a pause whenever a command is sent, letting the actuator finish.
    pub pause_after_command: bool,
    /// Give up calibrating after this many frames; `None` retries forever.
    pub max_calibration_attempts: Option<usize>,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            cooldown_ms: 5000,
            pause_after_command: false,
            max_calibration_attempts: None,
        }
    }
}

impl SessionParams {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Successful calibration: where the cells are and how many frames it took.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub attempts: usize,
    pub regions: [CellRegion; CELL_COUNT],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TickOutcome {
    /// No frame this tick.
    Dropped { reason: String },
    /// Frame pulled but not classified.
    Paused { remaining_ms: u64 },
    Updated(UpdateReport),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Bytes written to the actuator this tick.
    pub sent: Option<Vec<u8>>,
    /// Bytes the actuator sent back since the previous tick.
    pub replies: Vec<u8>,
}

/// Frame source, tracker, optional actuator and cooldown gate.
pub struct Session<S: FrameSource> {
    source: S,
    tracker: BoardStateTracker,
    calibration: Calibration,
    channel: Option<Box<dyn ActuatorChannel>>,
    gate: CooldownGate,
    params: SessionParams,
}

impl<S: FrameSource> Session<S> {
    /// Pull frames until the locator finds nine cells, capture the empty-board
    /// references from that frame and seed the tracker.
    pub fn calibrate(
        mut source: S,
        locator: &GridLocator,
        classifier: CellClassifier,
        tracker_params: TrackerParams,
        params: SessionParams,
    ) -> Result<Self, SessionError> {
        let mut attempts = 0usize;
        let mut last = None;
        loop {
            if params
                .max_calibration_attempts
                .is_some_and(|max| attempts >= max)
            {
                return Err(SessionError::Calibration { attempts, last });
            }
            attempts += 1;

            let frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(FrameError::Dropped { reason }) => {
                    debug!("calibration frame {attempts} dropped: {reason}");
                    continue;
                }
                Err(FrameError::Exhausted) => return Err(SessionError::SourceExhausted),
            };

            match locator.try_locate(&frame.view()) {
                Ok(regions) => {
                    info!("calibrated after {attempts} frame(s)");
                    let cells = classifier.capture_cells(&frame.view(), &regions);
                    let tracker = BoardStateTracker::seed(cells, classifier, tracker_params);
                    return Ok(Self {
                        source,
                        tracker,
                        calibration: Calibration { attempts, regions },
                        channel: None,
                        gate: CooldownGate::new(),
                        params,
                    });
                }
                Err(err) => {
                    debug!("calibration attempt {attempts}: {err}");
                    last = Some(err);
                }
            }
        }
    }

    /// Attach an actuator. Without one, tracking runs and commands are only
    /// reported.
    pub fn with_channel(mut self, channel: Box<dyn ActuatorChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    #[inline]
    pub fn tracker(&self) -> &BoardStateTracker {
        &self.tracker
    }

    #[inline]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    #[inline]
    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    #[inline]
    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Start the configured cooldown at `now`.
    pub fn pause(&mut self, now: Instant) {
        self.gate.pause(now, self.params.cooldown());
    }

    pub fn resume(&mut self) {
        self.gate.resume();
    }

    /// Pull one frame and, unless paused, run one tracker update on it.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, now)))]
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, SessionError> {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(FrameError::Dropped { reason }) => {
                warn!("frame dropped: {reason}");
                return Ok(self.report(TickOutcome::Dropped { reason }, None));
            }
            Err(FrameError::Exhausted) => return Err(SessionError::SourceExhausted),
        };

        if self.gate.is_paused(now) {
            let remaining_ms = self.gate.remaining(now).as_millis() as u64;
            debug!("paused, {remaining_ms} ms left");
            return Ok(self.report(TickOutcome::Paused { remaining_ms }, None));
        }

        let update = self.tracker.update(&frame.view());
        let mut sent = None;
        if let Some(command) = update.command {
            let bytes = command.encode();
            match self.channel.as_mut() {
                Some(channel) => {
                    channel.send(&bytes);
                    if channel.is_connected() {
                        sent = Some(bytes.to_vec());
                    }
                }
                None => debug!("no actuator attached, command {bytes:?} not sent"),
            }
            if self.params.pause_after_command {
                self.pause(now);
            }
        }
        Ok(self.report(TickOutcome::Updated(update), sent))
    }

    fn report(&mut self, outcome: TickOutcome, sent: Option<Vec<u8>>) -> TickReport {
        let replies = self
            .channel
            .as_mut()
            .map(|c| c.receive())
            .unwrap_or_default();
        if !replies.is_empty() {
            debug!("actuator -> {replies:?}");
        }
        TickReport {
            outcome,
            sent,
            replies,
        }
    }
}
