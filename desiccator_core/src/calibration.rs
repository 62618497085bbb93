//! Linear mass calibration: least-squares fit and the operator seam used by
//! the interactive procedure.

use crate::error::{CoreError, Result};
use crate::sensor::CellId;

/// One (filtered measurement, known mass) pair collected during calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    /// Trimmed-mean raw reading in counts.
    pub measurement: f64,
    /// Mass placed on the cell, in grams.
    pub known_mass: f64,
}

/// `mass = slope * measurement + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    #[inline]
    pub fn apply(&self, measurement: f64) -> f64 {
        self.slope * measurement + self.intercept
    }
}

/// Ordinary least-squares fit of known mass against measurement.
///
/// Needs at least two samples with distinct measurements. Computed around the
/// means in f64, which keeps large raw offsets (~1e6 counts) well conditioned.
pub fn fit_linear(samples: &[CalibrationSample]) -> Result<LinearFit> {
    if samples.len() < 2 {
        return Err(CoreError::InsufficientCalibrationData {
            pairs: samples.len(),
        });
    }
    if samples
        .iter()
        .any(|s| !(s.measurement.is_finite() && s.known_mass.is_finite()))
    {
        return Err(CoreError::DegenerateCalibration("non-finite calibration sample"));
    }

    let n = samples.len() as f64;
    let mean_x = samples.iter().map(|s| s.measurement).sum::<f64>() / n;
    let mean_y = samples.iter().map(|s| s.known_mass).sum::<f64>() / n;
    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    for s in samples {
        let x = s.measurement - mean_x;
        let y = s.known_mass - mean_y;
        sxx += x * x;
        sxy += x * y;
    }
    if !sxx.is_finite() || sxx == 0.0 {
        return Err(CoreError::DegenerateCalibration(
            "cannot determine slope (all measurements identical)",
        ));
    }
    let slope = sxy / sxx;
    if !slope.is_finite() {
        return Err(CoreError::DegenerateCalibration("non-finite slope"));
    }
    if slope == 0.0 {
        return Err(CoreError::DegenerateCalibration(
            "zero slope (known masses must differ)",
        ));
    }
    let intercept = mean_y - slope * mean_x;
    Ok(LinearFit { slope, intercept })
}

/// Parse an explicit yes/no answer. Anything else is rejected rather than
/// guessed.
pub fn parse_yes_no(answer: &str) -> Result<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        other => Err(CoreError::OperatorInput(format!(
            "expected y/yes or n/no, got {other:?}"
        ))),
    }
}

/// The person (or script) driving an interactive calibration.
///
/// Every call blocks until the operator has answered. Returning an error
/// aborts the calibration and leaves the cell's coefficients unchanged.
pub trait CalibrationOperator {
    /// Whether cell `id` should be calibrated at all (array-wide calibration asks per cell).
    fn confirm_cell(&mut self, id: CellId) -> Result<bool>;

    /// Returns once the cell carries no load.
    fn prepare_zero(&mut self, id: CellId) -> Result<()>;

    /// Known mass in grams that is now resting on the cell.
    fn known_mass(&mut self, id: CellId) -> Result<f64>;

    /// Whether another known mass follows.
    fn add_another(&mut self, id: CellId) -> Result<bool>;

    /// Called after each pair is collected.
    fn sample_taken(&mut self, _id: CellId, _sample: &CalibrationSample) {}
}

impl From<desiccator_config::CalibrationRow> for CalibrationSample {
    fn from(r: desiccator_config::CalibrationRow) -> Self {
        Self {
            measurement: r.raw,
            known_mass: r.mass,
        }
    }
}
