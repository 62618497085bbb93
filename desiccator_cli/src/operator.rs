//! Terminal operator for interactive calibration.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use desiccator_core::calibration::{CalibrationOperator, CalibrationSample, parse_yes_no};
use desiccator_core::error::{CoreError, Result};
use desiccator_core::sensor::CellId;
use desiccator_hardware::SimLoad;

/// Prompts on `out` and reads one answer line per question from `input`.
pub struct PromptOperator<R, W> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> PromptOperator<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self { input, out }
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(CoreError::OperatorInput("input closed".into()));
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> CalibrationOperator for PromptOperator<R, W> {
    fn confirm_cell(&mut self, id: CellId) -> Result<bool> {
        let answer = self.ask(&format!("Calibrate load cell {id}? [y/n]: "))?;
        parse_yes_no(&answer)
    }

    fn prepare_zero(&mut self, id: CellId) -> Result<()> {
        self.ask(&format!("Remove all mass from load cell {id}, then press Enter: "))?;
        Ok(())
    }

    fn known_mass(&mut self, id: CellId) -> Result<f64> {
        let answer = self.ask(&format!("Place a known mass on {id} and enter it in grams: "))?;
        answer
            .parse::<f64>()
            .map_err(|_| CoreError::OperatorInput(format!("{answer:?} is not a number of grams")))
    }

    fn add_another(&mut self, _id: CellId) -> Result<bool> {
        let answer = self.ask("Add another known mass? [y/n]: ")?;
        parse_yes_no(&answer)
    }

    fn sample_taken(&mut self, id: CellId, sample: &CalibrationSample) {
        let _ = writeln!(
            self.out,
            "  {id}: {:.1} counts at {} g",
            sample.measurement, sample.known_mass
        );
    }
}

/// Puts the operator's answers onto simulated load cells, so a workstation
/// calibration sees the masses the operator claims to have placed.
pub struct SimulatedPlacement<'a, O: ?Sized> {
    inner: &'a mut O,
    loads: &'a HashMap<CellId, SimLoad>,
}

impl<'a, O: CalibrationOperator + ?Sized> SimulatedPlacement<'a, O> {
    pub fn new(inner: &'a mut O, loads: &'a HashMap<CellId, SimLoad>) -> Self {
        Self { inner, loads }
    }

    fn place(&self, id: CellId, grams: f64) {
        if let Some(load) = self.loads.get(&id) {
            load.set(grams);
        }
    }
}

impl<O: CalibrationOperator + ?Sized> CalibrationOperator for SimulatedPlacement<'_, O> {
    fn confirm_cell(&mut self, id: CellId) -> Result<bool> {
        self.inner.confirm_cell(id)
    }

    fn prepare_zero(&mut self, id: CellId) -> Result<()> {
        self.inner.prepare_zero(id)?;
        self.place(id, 0.0);
        Ok(())
    }

    fn known_mass(&mut self, id: CellId) -> Result<f64> {
        let grams = self.inner.known_mass(id)?;
        self.place(id, grams);
        Ok(grams)
    }

    fn add_another(&mut self, id: CellId) -> Result<bool> {
        self.inner.add_another(id)
    }

    fn sample_taken(&mut self, id: CellId, sample: &CalibrationSample) {
        self.inner.sample_taken(id, sample);
    }
}
