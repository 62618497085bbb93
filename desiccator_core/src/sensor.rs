//! A single load cell: identity, hardware binding, tare and calibration state.

use std::fmt;
use std::str::FromStr;

use desiccator_traits::RawSensorSource;
use tracing::{debug, info, warn};

use crate::calibration::{CalibrationOperator, CalibrationSample, LinearFit, fit_linear};
use crate::config::MeasureCfg;
use crate::error::{CoreError, Result};
use crate::filter::{mean, trimmed_mean};
use crate::hw_error::map_source_error;

/// Number of chambers in the rig.
pub const CHAMBERS: usize = 4;
/// Load cells per chamber (left and right).
pub const SIDES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    L,
    R,
}

impl Side {
    /// Column of this side in the array grid.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::L => 0,
            Side::R => 1,
        }
    }

    #[inline]
    pub fn as_char(self) -> char {
        match self {
            Side::L => 'L',
            Side::R => 'R',
        }
    }

    /// Accepts `L`/`R` in either case.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'L' => Some(Side::L),
            'R' => Some(Side::R),
            _ => None,
        }
    }
}

/// Physical placement of a load cell: chamber 1..=4 and side.
///
/// Construction is unchecked; the array rejects chambers outside the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    pub chamber: u8,
    pub side: Side,
}

impl CellId {
    #[inline]
    pub const fn new(chamber: u8, side: Side) -> Self {
        Self { chamber, side }
    }

    /// Grid coordinates `(chamber - 1, side index)`.
    pub fn slot(self) -> Result<(usize, usize)> {
        if !(1..=CHAMBERS as u8).contains(&self.chamber) {
            return Err(CoreError::InvalidTopology(format!(
                "chamber {} outside 1..={CHAMBERS}",
                self.chamber
            )));
        }
        Ok((usize::from(self.chamber - 1), self.side.index()))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.chamber, self.side.as_char())
    }
}

impl FromStr for CellId {
    type Err = CoreError;

    /// Parses the two-character form, e.g. `"3R"`.
    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let (Some(c), Some(sd), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(CoreError::InvalidTopology(format!(
                "cell id {s:?} must be a chamber digit followed by L or R"
            )));
        };
        let chamber = c
            .to_digit(10)
            .ok_or_else(|| CoreError::InvalidTopology(format!("cell id {s:?}: bad chamber")))?;
        let side = Side::from_char(sd)
            .ok_or_else(|| CoreError::InvalidTopology(format!("cell id {s:?}: bad side")))?;
        let id = CellId::new(chamber as u8, side);
        id.slot()?;
        Ok(id)
    }
}

/// HX711 input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    #[inline]
    pub fn as_char(self) -> char {
        match self {
            Channel::A => 'A',
            Channel::B => 'B',
        }
    }
}

impl FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Channel::A),
            "B" => Ok(Channel::B),
            other => Err(CoreError::InvalidTopology(format!("unknown channel {other:?}"))),
        }
    }
}

/// Wiring of one load cell. Carried and persisted verbatim; only the driver
/// interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareBinding {
    pub data_pin: u8,
    pub clock_pin: u8,
    pub gain: u8,
    pub channel: Channel,
}

impl HardwareBinding {
    pub const fn new(data_pin: u8, clock_pin: u8) -> Self {
        Self {
            data_pin,
            clock_pin,
            gain: 128,
            channel: Channel::A,
        }
    }
}

/// One strain-gauge load cell reading through a `RawSensorSource`.
pub struct MassSensor<S> {
    id: CellId,
    binding: HardwareBinding,
    source: S,
    cfg: MeasureCfg,
    tare_offset: f64,
    slope: Option<f64>,
    intercept: Option<f64>,
}

impl<S> fmt::Debug for MassSensor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MassSensor")
            .field("id", &self.id)
            .field("binding", &self.binding)
            .field("tare_offset", &self.tare_offset)
            .field("slope", &self.slope)
            .field("intercept", &self.intercept)
            .finish_non_exhaustive()
    }
}

impl<S> MassSensor<S> {
    pub fn new(source: S, binding: HardwareBinding, id: CellId) -> Self {
        Self {
            id,
            binding,
            source,
            cfg: MeasureCfg::default(),
            tare_offset: 0.0,
            slope: None,
            intercept: None,
        }
    }

    /// Restore previously fitted (or partially persisted) coefficients.
    pub fn with_coefficients(mut self, slope: Option<f64>, intercept: Option<f64>) -> Self {
        self.slope = slope;
        self.intercept = intercept;
        self
    }

    pub fn with_measure_cfg(mut self, cfg: MeasureCfg) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn set_measure_cfg(&mut self, cfg: MeasureCfg) {
        self.cfg = cfg;
    }

    pub fn measure_cfg(&self) -> &MeasureCfg {
        &self.cfg
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn binding(&self) -> &HardwareBinding {
        &self.binding
    }

    /// Baseline in raw counts from the last `tare`; 0.0 until tared.
    pub fn tare_offset(&self) -> f64 {
        self.tare_offset
    }

    pub fn slope(&self) -> Option<f64> {
        self.slope
    }

    pub fn intercept(&self) -> Option<f64> {
        self.intercept
    }

    /// Both coefficients, or `None` while the cell is uncalibrated.
    pub fn coefficients(&self) -> Option<LinearFit> {
        match (self.slope, self.intercept) {
            (Some(slope), Some(intercept)) => Some(LinearFit { slope, intercept }),
            _ => None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.coefficients().is_some()
    }

    pub fn set_coefficients(&mut self, fit: LinearFit) {
        self.slope = Some(fit.slope);
        self.intercept = Some(fit.intercept);
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S: RawSensorSource> MassSensor<S> {
    /// Collect exactly `n` raw samples, re-reading a short or failed batch up
    /// to `read_retries` times before giving up.
    fn pull(&mut self, n: usize) -> Result<Vec<i32>> {
        let mut out = Vec::with_capacity(n);
        let mut fault: Option<CoreError> = None;
        let attempts = self.cfg.read_retries.max(1);
        for attempt in 1..=attempts {
            let missing = n - out.len();
            match self.source.read_raw(missing) {
                Ok(batch) => out.extend(batch.into_iter().take(missing)),
                Err(e) => {
                    let mapped = map_source_error(&*e, n, out.len());
                    warn!(cell = %self.id, attempt, error = %mapped, "raw read failed");
                    fault = Some(mapped);
                }
            }
            if out.len() >= n {
                return Ok(out);
            }
            debug!(cell = %self.id, attempt, got = out.len(), wanted = n, "short raw batch");
        }
        match fault {
            Some(e @ CoreError::Hardware(_)) => Err(e),
            _ => Err(CoreError::SourceUnavailable {
                wanted: n,
                got: out.len(),
            }),
        }
    }

    /// Capture the zero-load baseline as the plain mean of `sample_count` samples.
    pub fn tare(&mut self, sample_count: usize) -> Result<f64> {
        let samples = self.pull(sample_count)?;
        let values: Vec<f64> = samples.iter().map(|&v| f64::from(v)).collect();
        let offset = mean(&values).ok_or(CoreError::SourceUnavailable {
            wanted: sample_count,
            got: 0,
        })?;
        self.tare_offset = offset;
        info!(cell = %self.id, offset, samples = sample_count, "tared");
        Ok(offset)
    }

    /// One filtered reading in raw counts (trimmed mean of a batch).
    pub fn measure_raw(&mut self) -> Result<f64> {
        let batch = self.pull(self.cfg.batch_size)?;
        let value = trimmed_mean(&batch, self.cfg.trim_low, self.cfg.trim_high).ok_or(
            CoreError::SourceUnavailable {
                wanted: self.cfg.batch_size,
                got: 0,
            },
        )?;
        debug!(cell = %self.id, value, "filtered raw reading");
        Ok(value)
    }

    /// Calibrated mass in grams. Fails before touching the hardware when the
    /// cell has no coefficients.
    pub fn measure_mass(&mut self) -> Result<f64> {
        let fit = self
            .coefficients()
            .ok_or(CoreError::CalibrationMissing(self.id))?;
        Ok(fit.apply(self.measure_raw()?))
    }

    /// Interactive calibration: one zero-load reading, then one reading per
    /// known mass until the operator is done, then a least-squares fit.
    ///
    /// On any error the previous coefficients are kept.
    pub fn calibrate<O: CalibrationOperator + ?Sized>(&mut self, operator: &mut O) -> Result<LinearFit> {
        info!(cell = %self.id, "calibration started");
        operator.prepare_zero(self.id)?;
        let zero = CalibrationSample {
            measurement: self.measure_raw()?,
            known_mass: 0.0,
        };
        operator.sample_taken(self.id, &zero);
        let mut samples = vec![zero];

        loop {
            let known_mass = operator.known_mass(self.id)?;
            if !(known_mass.is_finite() && known_mass >= 0.0) {
                return Err(CoreError::OperatorInput(format!(
                    "known mass must be a non-negative number, got {known_mass}"
                )));
            }
            let sample = CalibrationSample {
                measurement: self.measure_raw()?,
                known_mass,
            };
            operator.sample_taken(self.id, &sample);
            samples.push(sample);
            if !operator.add_another(self.id)? {
                break;
            }
        }

        let fit = fit_linear(&samples)?;
        self.set_coefficients(fit);
        info!(
            cell = %self.id,
            slope = fit.slope,
            intercept = fit.intercept,
            points = samples.len(),
            "calibration stored"
        );
        Ok(fit)
    }
}
