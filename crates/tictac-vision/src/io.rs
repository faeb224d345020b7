//! JSON configuration and run reports.

use crate::board::{
    BoardSnapshot, Calibration, CellClassifier, ClassifierParams, MarkerKind, SessionParams,
    TickOutcome, TickReport, TrackerParams,
};
use crate::grid::{GridLocator, GridLocatorParams};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Every tunable of a tracking run. Missing blocks take their defaults, so
/// `{}` is a valid config.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub locator: GridLocatorParams,
    pub classifier: ClassifierParams,
    pub tracker: TrackerParams,
    pub session: SessionParams,
}

impl TrackerConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn build_locator(&self) -> GridLocator {
        GridLocator::new(self.locator.clone())
    }

    pub fn build_classifier(&self) -> CellClassifier {
        CellClassifier::new(self.classifier.clone())
    }
}

/// Outcome of replaying a frame sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Where the frames came from, e.g. a directory path.
    pub source: String,
    #[serde(default)]
    pub calibration: Option<Calibration>,
    #[serde(default)]
    pub ticks: Vec<TickReport>,
    /// Commands actually written to the actuator, in order.
    #[serde(default)]
    pub commands_sent: Vec<Vec<u8>>,
    #[serde(default)]
    pub final_board: Option<BoardSnapshot>,
    #[serde(default)]
    pub turn_record: Option<MarkerKind>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Append one tick, collecting any bytes it sent.
    pub fn record(&mut self, tick: TickReport) {
        if let Some(sent) = &tick.sent {
            self.commands_sent.push(sent.clone());
        }
        if let TickOutcome::Updated(update) = &tick.outcome {
            self.final_board = Some(update.snapshot);
            self.turn_record = update.turn_record;
        }
        self.ticks.push(tick);
    }

    /// Ticks that ran a tracker update.
    pub fn updates(&self) -> usize {
        self.ticks
            .iter()
            .filter(|t| matches!(t.outcome, TickOutcome::Updated(_)))
            .count()
    }

    /// Ticks whose update raised a rule violation.
    pub fn violations(&self) -> usize {
        self.ticks
            .iter()
            .filter(|t| matches!(&t.outcome, TickOutcome::Updated(u) if u.violation.is_some()))
            .count()
    }

    /// Load a JSON report from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
