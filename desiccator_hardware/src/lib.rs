//! Sensor backends for the desiccator controller.
//!
//! The default build only ships simulated sources so the whole stack runs on
//! a workstation. Enable the `hardware` feature for the HX711 GPIO reader.
pub mod error;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;

use desiccator_traits::{EnvironmentalArray, RawSensorSource, SourceError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tiny xorshift PRNG; deterministic noise for the simulated sensors.
#[derive(Debug, Clone)]
struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    /// Uniform value in [-1.0, 1.0).
    fn next_signed(&mut self) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        (f64::from(x) / (f64::from(u32::MAX) + 1.0)) * 2.0 - 1.0
    }
}

/// Shared handle to the mass (grams) resting on a simulated load cell.
///
/// Cloned handles stay connected to the cell after it has been moved into an array.
#[derive(Debug, Clone, Default)]
pub struct SimLoad(Arc<AtomicU64>);

impl SimLoad {
    pub fn set(&self, grams: f64) {
        self.0.store(grams.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Simulated HX711 load cell: linear counts plus noise and periodic spikes.
#[derive(Debug, Clone)]
pub struct SimulatedLoadCell {
    zero_counts: f64,
    counts_per_gram: f64,
    noise_counts: f64,
    spike_every: u32,
    spike_counts: f64,
    load: SimLoad,
    rng: XorShift32,
    reads: u32,
}

impl SimulatedLoadCell {
    pub fn new(zero_counts: f64, counts_per_gram: f64, seed: u32) -> Self {
        Self {
            zero_counts,
            counts_per_gram,
            noise_counts: 40.0,
            spike_every: 23,
            spike_counts: 25_000.0,
            load: SimLoad::default(),
            rng: XorShift32::new(seed),
            reads: 0,
        }
    }

    /// Cell whose offset and seed derive from its wiring, so each simulated
    /// cell in an array reads differently but reproducibly.
    pub fn for_pins(data_pin: u8, clock_pin: u8) -> Self {
        let seed = (u32::from(data_pin) << 8) | u32::from(clock_pin);
        let zero = 80_000.0 + 1_000.0 * f64::from(data_pin);
        Self::new(zero, 420.0, seed)
    }

    /// Disable noise and spikes (exact linear response).
    pub fn noiseless(mut self) -> Self {
        self.noise_counts = 0.0;
        self.spike_every = 0;
        self
    }

    pub fn load_handle(&self) -> SimLoad {
        self.load.clone()
    }

    fn sample(&mut self) -> i32 {
        self.reads = self.reads.wrapping_add(1);
        let mut v = self.zero_counts + self.load.get() * self.counts_per_gram;
        if self.noise_counts > 0.0 {
            v += self.noise_counts * self.rng.next_signed();
        }
        if self.spike_every > 0 && self.reads % self.spike_every == 0 {
            v += self.spike_counts;
        }
        v.round() as i32
    }
}

impl RawSensorSource for SimulatedLoadCell {
    fn read_raw(&mut self, n: usize) -> Result<Vec<i32>, SourceError> {
        let out: Vec<i32> = (0..n).map(|_| self.sample()).collect();
        tracing::trace!(n, first = ?out.first(), "simulated load cell batch");
        Ok(out)
    }
}

/// Simulated temperature/RH array, sensors ordered inlet/outlet per chamber.
#[derive(Debug, Clone)]
pub struct SimulatedEnvironment {
    sensors: usize,
    rng: XorShift32,
}

impl SimulatedEnvironment {
    pub fn new(sensors: usize) -> Self {
        Self {
            sensors,
            rng: XorShift32::new(0x5EED),
        }
    }
}

impl EnvironmentalArray for SimulatedEnvironment {
    fn measure_all(&mut self) -> Result<Vec<(f64, f64)>, SourceError> {
        let mut out = Vec::with_capacity(self.sensors);
        for i in 0..self.sensors {
            let chamber = (i / 2) as f64;
            let temp = 22.0 + 0.5 * chamber + 0.05 * self.rng.next_signed();
            let rh = (0.45 - 0.08 * chamber + 0.005 * self.rng.next_signed()).clamp(0.0, 1.0);
            out.push((temp, rh));
        }
        Ok(out)
    }
}
