/// Why a calibration attempt failed. All variants are retryable on the next
/// frame.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("crop window is empty")]
    EmptyCrop,
    #[error("board boundary not found")]
    BoundaryNotFound,
    #[error("expected 9 cells, found {found}")]
    CellCount { found: usize },
}
