//! The 4 × 2 grid of load cells and its persisted form.

use std::path::Path;

use desiccator_traits::RawSensorSource;
use tracing::{info, warn};

use crate::calibration::{CalibrationOperator, LinearFit};
use crate::config::MeasureCfg;
use crate::error::{CoreError, Result};
use crate::persist::{self, PersistedCell};
use crate::sensor::{CHAMBERS, CellId, HardwareBinding, MassSensor, SIDES};

/// Load cells indexed by `(chamber - 1, side)`. Any slot may be empty.
///
/// Iteration, measurement vectors and the persisted file all use the same
/// order: chamber 1 → 4, left before right.
pub struct MassSensorArray<S> {
    slots: [[Option<MassSensor<S>>; SIDES]; CHAMBERS],
}

impl<S> Default for MassSensorArray<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for MassSensorArray<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<S> MassSensorArray<S> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| std::array::from_fn(|_| None)),
        }
    }

    /// Place a sensor in its slot. Not idempotent: an occupied slot is an error.
    pub fn insert(&mut self, sensor: MassSensor<S>) -> Result<()> {
        let id = sensor.id();
        let (c, s) = id.slot()?;
        let slot = &mut self.slots[c][s];
        if slot.is_some() {
            return Err(CoreError::SlotOccupied(id));
        }
        *slot = Some(sensor);
        Ok(())
    }

    pub fn from_sensors(sensors: impl IntoIterator<Item = MassSensor<S>>) -> Result<Self> {
        let mut array = Self::new();
        for sensor in sensors {
            array.insert(sensor)?;
        }
        Ok(array)
    }

    /// Rebuild from persisted records, creating each cell's source from its
    /// binding with `make_source`.
    pub fn from_persisted<F>(cells: &[PersistedCell], mut make_source: F) -> Result<Self>
    where
        F: FnMut(CellId, &HardwareBinding) -> Result<S>,
    {
        let mut array = Self::new();
        for cell in cells {
            let source = make_source(cell.id, &cell.binding)?;
            let sensor = MassSensor::new(source, cell.binding, cell.id)
                .with_coefficients(cell.slope, cell.intercept);
            array.insert(sensor)?;
        }
        Ok(array)
    }

    pub fn get(&self, id: CellId) -> Option<&MassSensor<S>> {
        let (c, s) = id.slot().ok()?;
        self.slots[c][s].as_ref()
    }

    pub fn get_mut(&mut self, id: CellId) -> Option<&mut MassSensor<S>> {
        let (c, s) = id.slot().ok()?;
        self.slots[c][s].as_mut()
    }

    /// Populated cells in array order.
    pub fn iter(&self) -> impl Iterator<Item = &MassSensor<S>> {
        self.slots.iter().flatten().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MassSensor<S>> {
        self.slots.iter_mut().flatten().filter_map(Option::as_mut)
    }

    pub fn ids(&self) -> Vec<CellId> {
        self.iter().map(MassSensor::id).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cells that cannot produce a mass yet.
    pub fn uncalibrated(&self) -> Vec<CellId> {
        self.iter()
            .filter(|s| !s.is_calibrated())
            .map(MassSensor::id)
            .collect()
    }

    pub fn set_measure_cfg(&mut self, cfg: &MeasureCfg) {
        for sensor in self.iter_mut() {
            sensor.set_measure_cfg(cfg.clone());
        }
    }

    pub fn to_persisted(&self) -> Vec<PersistedCell> {
        self.iter()
            .map(|s| PersistedCell {
                id: s.id(),
                binding: *s.binding(),
                slope: s.slope(),
                intercept: s.intercept(),
            })
            .collect()
    }

    /// Persisted text form (see `persist`).
    pub fn serialize(&self) -> String {
        persist::encode(&self.to_persisted())
    }

    /// Inverse of `serialize`. Fails as a whole on any malformed record.
    pub fn deserialize<F>(data: &str, make_source: F) -> Result<Self>
    where
        F: FnMut(CellId, &HardwareBinding) -> Result<S>,
    {
        let cells = persist::decode(data)?;
        Self::from_persisted(&cells, make_source)
    }

    /// Atomically write the calibration file.
    pub fn save(&self, path: &Path) -> Result<()> {
        persist::write_atomic(path, self.serialize().as_bytes())?;
        info!(path = %path.display(), cells = self.len(), "calibration state saved");
        Ok(())
    }

    pub fn load<F>(path: &Path, make_source: F) -> Result<Self>
    where
        F: FnMut(CellId, &HardwareBinding) -> Result<S>,
    {
        let data = std::fs::read_to_string(path)?;
        let array = Self::deserialize(&data, make_source)?;
        info!(path = %path.display(), cells = array.len(), "calibration state loaded");
        Ok(array)
    }
}

impl<S: RawSensorSource> MassSensorArray<S> {
    /// One calibrated mass per populated slot, in array order.
    ///
    /// Any uncalibrated cell fails the whole call before any hardware is read.
    pub fn measure_all(&mut self) -> Result<Vec<f64>> {
        if let Some(missing) = self.iter().find(|s| !s.is_calibrated()) {
            return Err(CoreError::CalibrationMissing(missing.id()));
        }
        self.iter_mut().map(MassSensor::measure_mass).collect()
    }

    /// Tare every cell; returns the new offsets in array order.
    pub fn tare_all(&mut self, sample_count: usize) -> Result<Vec<(CellId, f64)>> {
        self.iter_mut()
            .map(|s| s.tare(sample_count).map(|offset| (s.id(), offset)))
            .collect()
    }

    /// Walk every cell in array order, calibrating the ones the operator
    /// confirms. Stops at the first error; cells finished before it keep
    /// their new coefficients.
    pub fn calibrate_all<O: CalibrationOperator + ?Sized>(
        &mut self,
        operator: &mut O,
    ) -> Result<Vec<(CellId, LinearFit)>> {
        let mut fitted = Vec::new();
        for sensor in self.iter_mut() {
            let id = sensor.id();
            if !operator.confirm_cell(id)? {
                info!(cell = %id, "calibration skipped");
                continue;
            }
            match sensor.calibrate(operator) {
                Ok(fit) => fitted.push((id, fit)),
                Err(e) => {
                    warn!(cell = %id, error = %e, "calibration aborted");
                    return Err(e);
                }
            }
        }
        Ok(fitted)
    }
}
