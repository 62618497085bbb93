use thiserror::Error;

use crate::sensor::CellId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("sensor source unavailable: wanted {wanted} samples, got {got}")]
    SourceUnavailable { wanted: usize, got: usize },
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("environmental array read failed: {0}")]
    Environment(String),
    #[error("load cell {0} is not calibrated")]
    CalibrationMissing(CellId),
    #[error("calibration needs at least 2 samples, got {pairs}")]
    InsufficientCalibrationData { pairs: usize },
    #[error("calibration fit failed: {0}")]
    DegenerateCalibration(&'static str),
    #[error("invalid operator input: {0}")]
    OperatorInput(String),
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("slot for load cell {0} is already occupied")]
    SlotOccupied(CellId),
    #[error("corrupt persisted calibration state: {0}")]
    CorruptPersistedState(String),
    #[error("sampling stopped after {attempts} consecutive read failures (last: {last})")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("sampling worker panicked: {0}")]
    WorkerPanicked(String),
    #[error("io error: {0}")]
    Io(String),
}

impl CoreError {
    /// Read failures the sampling loop retries in place instead of stopping.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::SourceUnavailable { .. } | CoreError::Hardware(_) | CoreError::Environment(_)
        )
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
