//! Values handed to sampling consumers.

use std::time::Duration;

/// One temperature/relative-humidity reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentReading {
    pub temperature_c: f64,
    /// Fraction in `[0, 1]`.
    pub relative_humidity: f64,
}

impl From<(f64, f64)> for EnvironmentReading {
    fn from((temperature_c, relative_humidity): (f64, f64)) -> Self {
        Self {
            temperature_c,
            relative_humidity,
        }
    }
}

/// Timestamped mass vector, one entry per populated slot in array order.
#[derive(Debug, Clone, PartialEq)]
pub struct MassRecord {
    /// Seconds since the coordinator was created (monotonic).
    pub timestamp: f64,
    pub masses: Vec<f64>,
}

/// Everything sampled in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub timestamp: f64,
    pub masses: Vec<f64>,
    pub environment: Vec<EnvironmentReading>,
}

/// Passed to cycle-complete consumers once pacing for the cycle is done.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Zero-based index of completed cycles since the coordinator was created.
    pub index: u64,
    /// Time spent reading and publishing, before any pacing delay.
    pub work: Duration,
    /// Work took at least the whole interval; no delay was inserted.
    pub overrun: bool,
    pub record: SampleRecord,
}

/// Counters for one `run` of the sampling loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub overruns: u64,
    pub read_failures: u64,
    pub consumer_failures: u64,
    pub dropped_records: u64,
}
