//! Periodic sampling loop.
//!
//! Each cycle reads the environmental array and the load cell array, publishes
//! both to registered consumers, then sleeps for whatever is left of the
//! interval. The loop runs on one dedicated worker thread (`spawn`) and stops
//! cooperatively when the shared run flag is cleared.
use crossbeam_channel as xch;
use desiccator_traits::clock::{Clock, MonotonicClock};
use desiccator_traits::{EnvironmentalArray, RawSensorSource};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::array::MassSensorArray;
use crate::config::CoordinatorCfg;
use crate::error::{CoreError, Result};
use crate::record::{CycleReport, EnvironmentReading, MassRecord, RunSummary, SampleRecord};

/// What a consumer returns; errors are logged and counted, never propagated.
pub type ConsumerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type MassConsumer = Box<dyn FnMut(&MassRecord) -> ConsumerResult + Send>;
type EnvironmentConsumer = Box<dyn FnMut(&[EnvironmentReading]) -> ConsumerResult + Send>;
type CycleConsumer = Box<dyn FnMut(&CycleReport) -> ConsumerResult + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Sampling,
}

/// Shared start/stop control for a coordinator.
///
/// - `running` is written by the controller (`start`/`stop`) and read by the
///   worker once per cycle. The worker only clears it when it stops on error.
/// - `active` is written by the worker alone and reports the loop state.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    running: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request sampling; takes effect when the coordinator is (re)started.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Request a stop; the in-flight cycle finishes first.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> CoordinatorState {
        if self.active.load(Ordering::Acquire) {
            CoordinatorState::Sampling
        } else {
            CoordinatorState::Idle
        }
    }

    /// The raw flag, for signal handlers that need an `Arc<AtomicBool>`.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

pub struct SamplingCoordinator<S, E, C = MonotonicClock> {
    masses: MassSensorArray<S>,
    environment: E,
    clock: C,
    cfg: CoordinatorCfg,
    control: RunControl,
    epoch: Instant,
    next_index: u64,
    dropped: Arc<AtomicU64>,
    on_mass: Vec<MassConsumer>,
    on_environment: Vec<EnvironmentConsumer>,
    on_cycle: Vec<CycleConsumer>,
}

impl<S, E, C: Clock> SamplingCoordinator<S, E, C> {
    pub fn new(masses: MassSensorArray<S>, environment: E, clock: C, cfg: CoordinatorCfg) -> Self {
        let epoch = clock.now();
        Self {
            masses,
            environment,
            clock,
            cfg,
            control: RunControl::new(),
            epoch,
            next_index: 0,
            dropped: Arc::new(AtomicU64::new(0)),
            on_mass: Vec::new(),
            on_environment: Vec::new(),
            on_cycle: Vec::new(),
        }
    }

    /// Share an externally owned control instead of the coordinator's own.
    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub fn cfg(&self) -> &CoordinatorCfg {
        &self.cfg
    }

    pub fn masses(&self) -> &MassSensorArray<S> {
        &self.masses
    }

    /// Exclusive access for tare/calibration while no loop is running.
    pub fn masses_mut(&mut self) -> &mut MassSensorArray<S> {
        &mut self.masses
    }

    pub fn environment_mut(&mut self) -> &mut E {
        &mut self.environment
    }

    pub fn into_parts(self) -> (MassSensorArray<S>, E) {
        (self.masses, self.environment)
    }

    /// Register a consumer for timestamped mass vectors.
    pub fn on_mass<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&MassRecord) -> ConsumerResult + Send + 'static,
    {
        self.on_mass.push(Box::new(f));
        self
    }

    /// Register a consumer for environmental readings.
    pub fn on_environment<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&[EnvironmentReading]) -> ConsumerResult + Send + 'static,
    {
        self.on_environment.push(Box::new(f));
        self
    }

    /// Register a consumer notified after each cycle's pacing delay.
    pub fn on_cycle_complete<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&CycleReport) -> ConsumerResult + Send + 'static,
    {
        self.on_cycle.push(Box::new(f));
        self
    }

    /// Fan complete records out to another thread through a bounded channel.
    ///
    /// The loop never blocks on the receiver: when the channel is full the
    /// record is dropped and counted in `RunSummary::dropped_records`.
    pub fn record_channel(&mut self, capacity: usize) -> xch::Receiver<SampleRecord> {
        let (tx, rx) = xch::bounded(capacity.max(1));
        let dropped = self.dropped.clone();
        self.on_cycle_complete(move |report| {
            match tx.try_send(report.record.clone()) {
                Ok(()) => {}
                Err(xch::TrySendError::Full(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(cycle = report.index, "record channel full, dropping record");
                }
                // Receiver gone; nothing left to feed.
                Err(xch::TrySendError::Disconnected(_)) => {}
            }
            Ok(())
        });
        rx
    }
}

impl<S, E, C> SamplingCoordinator<S, E, C>
where
    S: RawSensorSource,
    E: EnvironmentalArray,
    C: Clock,
{
    /// Run cycles until the run flag is observed clear, or a non-transient
    /// error occurs. Returns immediately when the flag is already clear.
    pub fn run(&mut self) -> Result<RunSummary> {
        let dropped_before = self.dropped.load(Ordering::Relaxed);
        let mut summary = RunSummary::default();
        self.control.set_active(true);
        info!(interval_ms = self.cfg.interval.as_millis() as u64, cells = self.masses.len(), "sampling started");

        let outcome = self.run_loop(&mut summary);

        self.control.set_active(false);
        summary.dropped_records = self.dropped.load(Ordering::Relaxed) - dropped_before;
        match outcome {
            Ok(()) => {
                info!(cycles = summary.cycles, overruns = summary.overruns, "sampling stopped");
                Ok(summary)
            }
            Err(e) => {
                self.control.stop();
                error!(error = %e, cycles = summary.cycles, "sampling aborted");
                Err(e)
            }
        }
    }

    fn run_loop(&mut self, summary: &mut RunSummary) -> Result<()> {
        let mut consecutive_failures: u32 = 0;
        while self.control.is_running() {
            let cycle_start = self.clock.now();

            let environment: Vec<EnvironmentReading> = match self.environment.measure_all() {
                Ok(pairs) => pairs.into_iter().map(EnvironmentReading::from).collect(),
                Err(e) => {
                    let err = CoreError::Environment(e.to_string());
                    self.read_failed(err, &mut consecutive_failures, summary)?;
                    continue;
                }
            };

            // Both readings are taken before anything is published, so a
            // failed mass read never leaves an environment-only cycle behind.
            let masses = match self.masses.measure_all() {
                Ok(m) => m,
                Err(e) if e.is_transient() => {
                    self.read_failed(e, &mut consecutive_failures, summary)?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let timestamp = self.clock.secs_since(self.epoch);
            consecutive_failures = 0;

            summary.consumer_failures += dispatch(&mut self.on_environment, "environment", &environment[..]);
            let mass_record = MassRecord { timestamp, masses };
            summary.consumer_failures += dispatch(&mut self.on_mass, "mass", &mass_record);

            let work = self.clock.now().saturating_duration_since(cycle_start);
            let overrun = work >= self.cfg.interval;
            if overrun {
                summary.overruns += 1;
                warn!(
                    work_ms = work.as_millis() as u64,
                    interval_ms = self.cfg.interval.as_millis() as u64,
                    "cycle overran its interval"
                );
            } else {
                self.clock.sleep(self.cfg.interval - work);
            }

            let report = CycleReport {
                index: self.next_index,
                work,
                overrun,
                record: SampleRecord {
                    timestamp,
                    masses: mass_record.masses,
                    environment,
                },
            };
            self.next_index += 1;
            summary.cycles += 1;
            summary.consumer_failures += dispatch(&mut self.on_cycle, "cycle_complete", &report);
        }
        Ok(())
    }

    /// Count a failed read and either back off or give up.
    fn read_failed(
        &mut self,
        err: CoreError,
        consecutive: &mut u32,
        summary: &mut RunSummary,
    ) -> Result<()> {
        *consecutive += 1;
        summary.read_failures += 1;
        warn!(error = %err, consecutive = *consecutive, "sensor read failed, retrying cycle");
        if self.cfg.max_consecutive_failures.is_some_and(|max| *consecutive >= max) {
            return Err(CoreError::RetriesExhausted {
                attempts: *consecutive,
                last: err.to_string(),
            });
        }
        self.clock.sleep(self.cfg.retry_delay);
        Ok(())
    }
}

impl<S, E, C> SamplingCoordinator<S, E, C>
where
    S: RawSensorSource + Send + 'static,
    E: EnvironmentalArray + Send + 'static,
    C: Clock + Send + 'static,
{
    /// Move the coordinator onto its own worker thread and run it there.
    ///
    /// The coordinator comes back from `CoordinatorHandle::join`, so the
    /// arrays can be recalibrated and sampling restarted.
    pub fn spawn(mut self) -> Result<CoordinatorHandle<S, E, C>> {
        let control = self.control.clone();
        let join = std::thread::Builder::new()
            .name("desiccator-sampler".into())
            .spawn(move || {
                let outcome = self.run();
                Finished {
                    coordinator: self,
                    outcome,
                }
            })?;
        Ok(CoordinatorHandle {
            control,
            join: Some(join),
        })
    }
}

/// Result of a worker run, with the coordinator handed back.
pub struct Finished<S, E, C> {
    pub coordinator: SamplingCoordinator<S, E, C>,
    pub outcome: Result<RunSummary>,
}

/// Owner of a running sampling worker.
///
/// Dropping the handle stops the loop and joins the thread, so workers never
/// outlive their handle.
pub struct CoordinatorHandle<S, E, C> {
    control: RunControl,
    join: Option<std::thread::JoinHandle<Finished<S, E, C>>>,
}

impl<S, E, C> CoordinatorHandle<S, E, C> {
    pub fn control(&self) -> &RunControl {
        &self.control
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Wait for the worker to exit (it exits once the flag is clear or on error).
    pub fn join(mut self) -> Result<Finished<S, E, C>> {
        let Some(handle) = self.join.take() else {
            return Err(CoreError::WorkerPanicked("worker already joined".into()));
        };
        handle
            .join()
            .map_err(|p| CoreError::WorkerPanicked(panic_message(p.as_ref())))
    }

    /// Clear the flag and wait for the in-flight cycle to finish.
    pub fn stop_and_join(self) -> Result<Finished<S, E, C>> {
        self.stop();
        self.join()
    }
}

impl<S, E, C> Drop for CoordinatorHandle<S, E, C> {
    fn drop(&mut self) {
        self.control.stop();
        if let Some(handle) = self.join.take() {
            match handle.join() {
                Ok(_) => {
                    tracing::trace!("sampling worker joined");
                }
                Err(p) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(panic = %panic_message(p.as_ref()), "sampling worker panicked");
                }
            }
        }
    }
}

/// Call every consumer in registration order, isolating errors and panics.
/// Returns the number of consumers that failed.
fn dispatch<T: ?Sized>(
    consumers: &mut [Box<dyn FnMut(&T) -> ConsumerResult + Send>],
    event: &'static str,
    value: &T,
) -> u64 {
    let mut failures = 0;
    for (i, consumer) in consumers.iter_mut().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| consumer(value))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures += 1;
                warn!(event, consumer = i, error = %e, "consumer failed");
            }
            Err(p) => {
                failures += 1;
                error!(event, consumer = i, panic = %panic_message(p.as_ref()), "consumer panicked");
            }
        }
    }
    failures
}

fn panic_message(p: &(dyn Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
