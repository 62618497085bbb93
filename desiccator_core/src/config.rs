//! Runtime configuration for measurement and sampling.
//!
//! These are the structs the core works with; they are separate from the
//! TOML-deserialized config in `desiccator_config` (see `conversions`).

use std::time::Duration;

/// How raw samples are pulled and reduced to one reading.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureCfg {
    /// Raw samples per filtered measurement.
    pub batch_size: usize,
    /// Lower quantile kept by the trimmed mean.
    pub trim_low: f64,
    /// Upper quantile kept by the trimmed mean.
    pub trim_high: f64,
    /// Samples averaged by array-wide tare.
    pub tare_samples: usize,
    /// Source reads per batch before reporting `SourceUnavailable`.
    pub read_retries: u32,
}

impl Default for MeasureCfg {
    fn default() -> Self {
        Self {
            batch_size: 10,
            trim_low: 0.1,
            trim_high: 0.9,
            tare_samples: 25,
            read_retries: 3,
        }
    }
}

/// Pacing and failure policy of the sampling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorCfg {
    /// Target time from the start of one cycle to the start of the next.
    pub interval: Duration,
    /// Pause before retrying a cycle whose sensor read failed.
    pub retry_delay: Duration,
    /// Consecutive read failures before sampling stops; `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for CoordinatorCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            retry_delay: Duration::from_millis(500),
            max_consecutive_failures: Some(5),
        }
    }
}
