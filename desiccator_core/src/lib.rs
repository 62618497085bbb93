#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Desiccator mass and environment sampling (hardware-agnostic).
//!
//! Load cells are read through `desiccator_traits::RawSensorSource` and the
//! temperature/humidity sensors through `desiccator_traits::EnvironmentalArray`.
//!
//! ## Architecture
//!
//! - **Filtering**: trimmed mean over a quantile band (`filter`)
//! - **Calibration**: least-squares raw→grams fit and the operator seam (`calibration`)
//! - **Sensors**: one load cell with tare and calibration state (`sensor`)
//! - **Array**: the 4 × 2 grid of load cells (`array`) and its file format (`persist`)
//! - **Sampling**: the periodic loop and its consumers (`coordinator`, `record`)

pub mod array;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod coordinator;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod persist;
pub mod record;
pub mod sensor;

pub use array::MassSensorArray;
pub use calibration::{CalibrationOperator, CalibrationSample, LinearFit, fit_linear, parse_yes_no};
pub use config::{CoordinatorCfg, MeasureCfg};
pub use coordinator::{
    ConsumerResult, CoordinatorHandle, CoordinatorState, Finished, RunControl, SamplingCoordinator,
};
pub use error::{CoreError, Result};
pub use persist::PersistedCell;
pub use record::{CycleReport, EnvironmentReading, MassRecord, RunSummary, SampleRecord};
pub use sensor::{CellId, Channel, HardwareBinding, MassSensor, Side};
