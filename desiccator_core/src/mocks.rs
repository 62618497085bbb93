//! Scripted sources and operators for tests, benches and dry runs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use desiccator_traits::{EnvironmentalArray, RawSensorSource, SourceError};

use crate::calibration::{CalibrationOperator, CalibrationSample};
use crate::error::{CoreError, Result};
use crate::sensor::CellId;

#[derive(Debug, Clone)]
enum Script {
    Constant(i32),
    Batches(VecDeque<std::result::Result<Vec<i32>, String>>),
}

/// Raw source that replays a script.
///
/// `constant` answers every request in full. `batches` hands out one queued
/// batch (or error) per call and returns empty batches once exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    script: Script,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn constant(raw: i32) -> Self {
        Self {
            script: Script::Constant(raw),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn batches<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = Vec<i32>>,
    {
        Self {
            script: Script::Batches(batches.into_iter().map(Ok).collect()),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a failing read after the already scripted batches.
    pub fn then_fail(mut self, msg: &str) -> Self {
        if let Script::Batches(q) = &mut self.script {
            q.push_back(Err(msg.to_string()));
        }
        self
    }

    /// Shared count of `read_raw` calls, readable after the source moved.
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

impl RawSensorSource for ScriptedSource {
    fn read_raw(&mut self, n: usize) -> std::result::Result<Vec<i32>, SourceError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        match &mut self.script {
            Script::Constant(v) => Ok(vec![*v; n]),
            Script::Batches(q) => match q.pop_front() {
                Some(Ok(batch)) => Ok(batch),
                Some(Err(msg)) => Err(msg.into()),
                None => Ok(Vec::new()),
            },
        }
    }
}

/// Environmental array with fixed readings that can be told to fail.
#[derive(Debug, Clone)]
pub struct ScriptedEnvironment {
    readings: Vec<(f64, f64)>,
    failures: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedEnvironment {
    pub fn new(readings: Vec<(f64, f64)>) -> Self {
        Self {
            readings,
            failures: Arc::new(AtomicUsize::new(0)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail the next `n` reads.
    pub fn failing(self, n: usize) -> Self {
        self.failures.store(n, Ordering::Relaxed);
        self
    }

    /// Handle to inject failures while a coordinator owns the array.
    pub fn failure_handle(&self) -> Arc<AtomicUsize> {
        self.failures.clone()
    }

    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

impl EnvironmentalArray for ScriptedEnvironment {
    fn measure_all(&mut self) -> std::result::Result<Vec<(f64, f64)>, SourceError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let failing = self
            .failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err("scripted environment failure".into());
        }
        Ok(self.readings.clone())
    }
}

/// One scripted operator answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Confirm(bool),
    Ready,
    Mass(f64),
    Another(bool),
    Fail(String),
}

/// Operator that replays answers in order and records every collected pair.
///
/// An unexpected answer (or running out of answers) is an operator error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<Answer>,
    pub samples: Vec<(CellId, CalibrationSample)>,
}

impl ScriptedOperator {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            samples: Vec::new(),
        }
    }

    /// Zero step, then each mass, answering "another" until the last one.
    pub fn for_masses(masses: &[f64]) -> Self {
        let mut answers = vec![Answer::Ready];
        for (i, &m) in masses.iter().enumerate() {
            answers.push(Answer::Mass(m));
            answers.push(Answer::Another(i + 1 < masses.len()));
        }
        Self::new(answers)
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, id: CellId, step: &str) -> Result<Answer> {
        match self.answers.pop_front() {
            Some(Answer::Fail(msg)) => Err(CoreError::OperatorInput(msg)),
            Some(a) => Ok(a),
            None => Err(CoreError::OperatorInput(format!(
                "no scripted answer for {step} on {id}"
            ))),
        }
    }

    fn unexpected(step: &str, got: &Answer) -> CoreError {
        CoreError::OperatorInput(format!("unexpected answer {got:?} for {step}"))
    }
}

impl CalibrationOperator for ScriptedOperator {
    fn confirm_cell(&mut self, id: CellId) -> Result<bool> {
        match self.next(id, "confirm")? {
            Answer::Confirm(b) => Ok(b),
            other => Err(Self::unexpected("confirm", &other)),
        }
    }

    fn prepare_zero(&mut self, id: CellId) -> Result<()> {
        match self.next(id, "zero")? {
            Answer::Ready => Ok(()),
            other => Err(Self::unexpected("zero", &other)),
        }
    }

    fn known_mass(&mut self, id: CellId) -> Result<f64> {
        match self.next(id, "mass")? {
            Answer::Mass(m) => Ok(m),
            other => Err(Self::unexpected("mass", &other)),
        }
    }

    fn add_another(&mut self, id: CellId) -> Result<bool> {
        match self.next(id, "another")? {
            Answer::Another(b) => Ok(b),
            other => Err(Self::unexpected("another", &other)),
        }
    }

    fn sample_taken(&mut self, id: CellId, sample: &CalibrationSample) {
        self.samples.push((id, *sample));
    }
}
