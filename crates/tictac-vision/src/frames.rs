//! Frame sources backed by files on disk.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::board::{FrameError, FrameSource};
use crate::core::RgbImage;
use crate::detect::load_rgb;

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Replays still images from a directory in file-name order.
///
/// A file that fails to decode yields [`FrameError::Dropped`]; after the last
/// file every call yields [`FrameError::Exhausted`].
#[derive(Clone, Debug)]
pub struct DirectoryFrameSource {
    paths: Vec<PathBuf>,
    next: usize,
    interval: Option<Duration>,
}

impl DirectoryFrameSource {
    /// List the image files of `dir`. Subdirectories are ignored.
    pub fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        info!("{} frame(s) in {}", paths.len(), dir.as_ref().display());
        Ok(Self::from_paths(paths))
    }

    /// Replay exactly these files, in this order.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            next: 0,
            interval: None,
        }
    }

    /// Sleep this long before every frame but the first, to mimic a camera.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Frames not yet handed out.
    pub fn remaining(&self) -> usize {
        self.paths.len().saturating_sub(self.next)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Result<RgbImage, FrameError> {
        let Some(path) = self.paths.get(self.next) else {
            return Err(FrameError::Exhausted);
        };
        if let Some(interval) = self.interval.filter(|_| self.next > 0) {
            thread::sleep(interval);
        }
        self.next += 1;
        debug!("frame {} <- {}", self.next, path.display());
        load_rgb(path).map_err(|err| FrameError::Dropped {
            reason: format!("{}: {err}", path.display()),
        })
    }
}
