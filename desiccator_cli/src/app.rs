//! Command implementations: config mapping, rig assembly, and the commands.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use desiccator_config::Config;
use desiccator_core::calibration::{CalibrationSample, fit_linear};
use desiccator_core::error::Result as CoreResult;
use desiccator_core::persist::PersistedCell;
use desiccator_core::{
    CellId, CoordinatorCfg, CycleReport, HardwareBinding, MassSensorArray, MeasureCfg,
    SamplingCoordinator,
};
use desiccator_hardware::{SimLoad, SimulatedEnvironment};
use desiccator_traits::RawSensorSource;
use desiccator_traits::clock::MonotonicClock;
use eyre::{Result, WrapErr, bail, eyre};
use serde_json::json;

use crate::operator::{PromptOperator, SimulatedPlacement};

pub type CellSource = Box<dyn RawSensorSource + Send>;

/// Load cells plus environmental sensors, built from config and calibration file.
pub struct Rig {
    pub array: MassSensorArray<CellSource>,
    pub environment: SimulatedEnvironment,
    /// Load handles of simulated cells (empty on real hardware).
    pub loads: HashMap<CellId, SimLoad>,
    pub calibration_file: PathBuf,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = desiccator_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn make_source(
    cfg: &Config,
    _loads: &mut HashMap<CellId, SimLoad>,
    id: CellId,
    b: &HardwareBinding,
) -> CoreResult<CellSource> {
    let timeout = Duration::from_millis(cfg.hardware.sensor_read_timeout_ms);
    let hx = desiccator_hardware::hx711::Hx711::new(
        b.data_pin,
        b.clock_pin,
        b.gain,
        b.channel.as_char(),
        timeout,
    )
    .map_err(|e| desiccator_core::CoreError::Hardware(format!("open hx711 for {id}: {e}")))?;
    Ok(Box::new(hx))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn make_source(
    _cfg: &Config,
    loads: &mut HashMap<CellId, SimLoad>,
    id: CellId,
    b: &HardwareBinding,
) -> CoreResult<CellSource> {
    let cell = desiccator_hardware::SimulatedLoadCell::for_pins(b.data_pin, b.clock_pin);
    loads.insert(id, cell.load_handle());
    Ok(Box::new(cell))
}

/// Build the array from the calibration file when it exists, otherwise from
/// the `[[cells]]` wiring in the config (all cells uncalibrated).
pub fn build_rig(cfg: &Config, calibration_override: Option<&Path>) -> Result<Rig> {
    let calibration_file = calibration_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&cfg.persistence.calibration_file));
    let mut loads = HashMap::new();
    let factory = |id: CellId, b: &HardwareBinding| make_source(cfg, &mut loads, id, b);

    let mut array = if calibration_file.exists() {
        MassSensorArray::load(&calibration_file, factory)
            .wrap_err_with(|| format!("load calibration file {}", calibration_file.display()))?
    } else {
        let cells = cfg
            .cells
            .iter()
            .map(PersistedCell::try_from)
            .collect::<CoreResult<Vec<_>>>()?;
        tracing::info!(
            path = %calibration_file.display(),
            cells = cells.len(),
            "no calibration file yet, using configured wiring"
        );
        MassSensorArray::from_persisted(&cells, factory)?
    };
    if array.is_empty() {
        bail!("no load cells configured: add [[cells]] to the config or provide a calibration file");
    }
    array.set_measure_cfg(&MeasureCfg::from(&cfg.mass));

    Ok(Rig {
        array,
        environment: SimulatedEnvironment::new(cfg.environment.sensors),
        loads,
        calibration_file,
    })
}

fn record_json(r: &CycleReport) -> serde_json::Value {
    let environment: Vec<_> = r
        .record
        .environment
        .iter()
        .map(|e| json!({ "temperature_c": e.temperature_c, "relative_humidity": e.relative_humidity }))
        .collect();
    json!({
        "cycle": r.index,
        "timestamp": r.record.timestamp,
        "masses": r.record.masses,
        "environment": environment,
        "work_ms": r.work.as_millis() as u64,
        "overrun": r.overrun,
    })
}

fn record_text(r: &CycleReport, ids: &[CellId]) -> String {
    let masses: Vec<String> = ids
        .iter()
        .zip(&r.record.masses)
        .map(|(id, g)| format!("{id}={g:.2}g"))
        .collect();
    let env: Vec<String> = r
        .record
        .environment
        .iter()
        .map(|e| format!("{:.1}C/{:.0}%", e.temperature_c, e.relative_humidity * 100.0))
        .collect();
    format!(
        "[{:>9.3}s] {} | {}",
        r.record.timestamp,
        masses.join(" "),
        env.join(" ")
    )
}

pub fn run_sampling(
    cfg: &Config,
    rig: Rig,
    cycles: Option<u64>,
    interval_ms: Option<u64>,
    json_out: bool,
) -> Result<()> {
    let mut coord_cfg = CoordinatorCfg::from(&cfg.sampling);
    if let Some(ms) = interval_ms {
        coord_cfg.interval = Duration::from_millis(ms);
    }
    let ids = rig.array.ids();
    let mut coord =
        SamplingCoordinator::new(rig.array, rig.environment, MonotonicClock::new(), coord_cfg);
    let control = coord.control();

    {
        let control = control.clone();
        coord.on_cycle_complete(move |report| {
            let line = if json_out {
                record_json(report).to_string()
            } else {
                record_text(report, &ids)
            };
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{line}")?;
            stdout.flush()?;
            if cycles.is_some_and(|n| report.index + 1 >= n) {
                control.stop();
            }
            Ok(())
        });
    }

    let flag = control.flag();
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(false, std::sync::atomic::Ordering::Release);
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
    }

    control.start();
    let handle = coord.spawn()?;
    let finished = handle.join()?;
    let summary = finished.outcome?;
    tracing::info!(
        cycles = summary.cycles,
        overruns = summary.overruns,
        read_failures = summary.read_failures,
        consumer_failures = summary.consumer_failures,
        "run summary"
    );
    if !json_out {
        eprintln!(
            "Sampled {} cycles ({} overruns, {} read failures).",
            summary.cycles, summary.overruns, summary.read_failures
        );
    }
    Ok(())
}

pub fn tare(cfg: &Config, mut rig: Rig, samples: Option<usize>, json_out: bool) -> Result<()> {
    let n = samples.unwrap_or(cfg.mass.tare_samples);
    if n == 0 {
        bail!("tare needs at least one sample");
    }
    let offsets = rig.array.tare_all(n)?;
    if json_out {
        let rows: Vec<_> = offsets
            .iter()
            .map(|(id, off)| json!({ "cell": id.to_string(), "offset": off }))
            .collect();
        println!("{}", serde_json::Value::from(rows));
    } else {
        for (id, off) in offsets {
            println!("{id}: zero at {off:.1} counts");
        }
    }
    Ok(())
}

fn parse_cell(s: &str) -> Result<CellId> {
    s.parse::<CellId>()
        .wrap_err_with(|| format!("invalid cell {s:?}"))
}

pub fn calibrate(mut rig: Rig, cell: Option<&str>) -> Result<()> {
    let stdin = std::io::stdin();
    let mut prompt = PromptOperator::new(stdin.lock(), std::io::stdout());
    let mut operator = SimulatedPlacement::new(&mut prompt, &rig.loads);

    match cell {
        Some(s) => {
            let id = parse_cell(s)?;
            let sensor = rig
                .array
                .get_mut(id)
                .ok_or_else(|| eyre!("load cell {id} is not part of the array"))?;
            let fit = sensor.calibrate(&mut operator)?;
            println!("{id}: slope {:.6e} g/count, intercept {:.3} g", fit.slope, fit.intercept);
        }
        None => {
            let fitted = rig.array.calibrate_all(&mut operator)?;
            for (id, fit) in &fitted {
                println!("{id}: slope {:.6e} g/count, intercept {:.3} g", fit.slope, fit.intercept);
            }
            if fitted.is_empty() {
                println!("No cells calibrated.");
                return Ok(());
            }
        }
    }
    rig.array.save(&rig.calibration_file)?;
    println!("Saved calibration to {}", rig.calibration_file.display());
    Ok(())
}

pub fn calibrate_csv(mut rig: Rig, cell: &str, file: &Path) -> Result<()> {
    let id = parse_cell(cell)?;
    let rows = desiccator_config::load_calibration_csv(file)?;
    let samples: Vec<CalibrationSample> = rows.into_iter().map(CalibrationSample::from).collect();
    let fit = fit_linear(&samples)?;
    let sensor = rig
        .array
        .get_mut(id)
        .ok_or_else(|| eyre!("load cell {id} is not part of the array"))?;
    sensor.set_coefficients(fit);
    tracing::info!(cell = %id, slope = fit.slope, intercept = fit.intercept, points = samples.len(), "calibration fitted from CSV");
    rig.array.save(&rig.calibration_file)?;
    println!(
        "{id}: slope {:.6e} g/count, intercept {:.3} g ({} points), saved to {}",
        fit.slope,
        fit.intercept,
        samples.len(),
        rig.calibration_file.display()
    );
    Ok(())
}

pub fn show(rig: &Rig, json_out: bool) -> Result<()> {
    if json_out {
        let rows: Vec<_> = rig
            .array
            .to_persisted()
            .iter()
            .map(|c| {
                json!({
                    "cell": c.id.to_string(),
                    "data_pin": c.binding.data_pin,
                    "clock_pin": c.binding.clock_pin,
                    "gain": c.binding.gain,
                    "channel": c.binding.channel.as_char().to_string(),
                    "slope": c.slope,
                    "intercept": c.intercept,
                })
            })
            .collect();
        println!("{}", serde_json::Value::from(rows));
        return Ok(());
    }
    for s in rig.array.iter() {
        let b = s.binding();
        let cal = match s.coefficients() {
            Some(fit) => format!("slope {:e} intercept {}", fit.slope, fit.intercept),
            None => "uncalibrated".to_string(),
        };
        println!(
            "{}  dt={} sck={} gain={} ch={}  {cal}",
            s.id(),
            b.data_pin,
            b.clock_pin,
            b.gain,
            b.channel.as_char()
        );
    }
    Ok(())
}

pub fn self_check(mut rig: Rig) -> Result<()> {
    use desiccator_traits::EnvironmentalArray;

    let mut failures = 0usize;
    for sensor in rig.array.iter_mut() {
        match sensor.measure_raw() {
            Ok(raw) => println!("{}: ok ({raw:.1} counts)", sensor.id()),
            Err(e) => {
                failures += 1;
                println!("{}: FAILED ({e})", sensor.id());
            }
        }
    }
    match rig.environment.measure_all() {
        Ok(readings) => println!("environment: ok ({} sensors)", readings.len()),
        Err(e) => {
            failures += 1;
            println!("environment: FAILED ({e})");
        }
    }
    if failures > 0 {
        bail!("self-check failed: {failures} sensor(s) did not respond");
    }
    println!("OK");
    Ok(())
}
