#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration CSV parsing for the desiccator controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The calibration CSV loader enforces headers and returns the rows in file
//!   order; fitting happens in `desiccator_core`.
use serde::Deserialize;

/// Calibration CSV schema.
///
/// Expected headers:
/// raw,mass
///
/// `raw` is a filtered (trimmed-mean) reading in counts, `mass` the known
/// mass in grams that produced it.
///
/// Example:
/// raw,mass
/// 842913.5,0.0
/// 1024913.0,100.0
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct CalibrationRow {
    pub raw: f64,
    pub mass: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sampling {
    /// Target cycle interval in milliseconds.
    pub interval_ms: u64,
    /// Delay before retrying a cycle whose sensor read failed.
    pub retry_delay_ms: u64,
    /// Consecutive failed reads tolerated before sampling stops (0 = unbounded).
    pub max_consecutive_failures: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            retry_delay_ms: 500,
            max_consecutive_failures: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MassCfg {
    /// Raw samples per filtered measurement.
    pub batch_size: usize,
    /// Lower quantile of the trimmed-mean band.
    pub trim_low: f64,
    /// Upper quantile of the trimmed-mean band.
    pub trim_high: f64,
    /// Raw samples averaged by `tare`.
    pub tare_samples: usize,
    /// Source reads attempted before a short batch is reported as unavailable.
    pub read_retries: u32,
}

impl Default for MassCfg {
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Max time to wait for HX711 data-ready (DT low) before giving up on a sample
    pub sensor_read_timeout_ms: u64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Persistence {
    /// Path of the persisted load cell calibration file.
    pub calibration_file: String,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            calibration_file: "cache/load_cells.txt".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EnvironmentCfg {
    /// Number of temperature/RH sensors on the bus.
    pub sensors: usize,
}

impl Default for EnvironmentCfg {
    fn default() -> Self {
        Self { sensors: 8 }
    }
}

/// One load cell as wired, used when no calibration file exists yet.
#[derive(Debug, Deserialize, Clone)]
pub struct CellCfg {
    pub chamber: u8,
    pub side: String,
    pub data_pin: u8,
    pub clock_pin: u8,
    #[serde(default = "default_gain")]
    pub gain: u8,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_gain() -> u8 {
    128
}

fn default_channel() -> String {
    "A".to_string()
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sampling: Sampling,
    #[serde(default)]
    pub mass: MassCfg,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub persistence: Persistence,
    #[serde(default)]
    pub environment: EnvironmentCfg,
    /// Load cell wiring; ignored once a calibration file has been written.
    #[serde(default)]
    pub cells: Vec<CellCfg>,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<Vec<CalibrationRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["raw", "mass"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'raw,mass', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => {
                if !(row.raw.is_finite() && row.mass.is_finite()) {
                    eyre::bail!("invalid CSV row {}: non-finite value", idx + 2);
                }
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    Ok(rows)
}

const VALID_GAINS: [u8; 3] = [32, 64, 128];

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Sampling
        if self.sampling.interval_ms == 0 {
            eyre::bail!("sampling.interval_ms must be >= 1");
        }
        if self.sampling.interval_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("sampling.interval_ms is unreasonably large (>24h)");
        }
        if self.sampling.retry_delay_ms > 60 * 1000 {
            eyre::bail!("sampling.retry_delay_ms is unreasonably large (>60s)");
        }

        // Mass reduction
        if self.mass.batch_size == 0 {
            eyre::bail!("mass.batch_size must be >= 1");
        }
        if !(0.0..1.0).contains(&self.mass.trim_low) {
            eyre::bail!("mass.trim_low must be in [0.0, 1.0)");
        }
        if !(self.mass.trim_high > 0.0 && self.mass.trim_high <= 1.0) {
            eyre::bail!("mass.trim_high must be in (0.0, 1.0]");
        }
        if self.mass.trim_low >= self.mass.trim_high {
            eyre::bail!("mass.trim_low must be < mass.trim_high");
        }
        if self.mass.tare_samples == 0 {
            eyre::bail!("mass.tare_samples must be >= 1");
        }
        if self.mass.read_retries == 0 {
            eyre::bail!("mass.read_retries must be >= 1");
        }

        // Hardware
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }

        // Persistence
        if self.persistence.calibration_file.trim().is_empty() {
            eyre::bail!("persistence.calibration_file must not be empty");
        }

        // Cells
        let mut seen = Vec::with_capacity(self.cells.len());
        for (i, cell) in self.cells.iter().enumerate() {
            if !(1..=4).contains(&cell.chamber) {
                eyre::bail!("cells[{i}].chamber must be one of 1, 2, 3, 4");
            }
            let side = cell.side.to_ascii_uppercase();
            if side != "L" && side != "R" {
                eyre::bail!("cells[{i}].side must be \"L\" or \"R\"");
            }
            if !VALID_GAINS.contains(&cell.gain) {
                eyre::bail!("cells[{i}].gain must be one of 32, 64, 128");
            }
            match cell.channel.to_ascii_uppercase().as_str() {
                "A" if cell.gain == 32 => {
                    eyre::bail!("cells[{i}]: channel A supports gain 64 or 128")
                }
                "B" if cell.gain != 32 => eyre::bail!("cells[{i}]: channel B requires gain 32"),
                "A" | "B" => {}
                _ => eyre::bail!("cells[{i}].channel must be \"A\" or \"B\""),
            }
            if cell.data_pin == cell.clock_pin {
                eyre::bail!("cells[{i}]: data_pin and clock_pin must differ");
            }
            let key = (cell.chamber, side);
            if seen.contains(&key) {
                eyre::bail!("cells[{i}]: duplicate cell {}{}", key.0, key.1);
            }
            seen.push(key);
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = load_toml("").unwrap();
        assert_eq!(cfg.sampling.interval_ms, 10_000);
        assert_eq!(cfg.mass.batch_size, 10);
        assert_eq!(cfg.mass.tare_samples, 25);
        assert_eq!(cfg.environment.sensors, 8);
        assert_eq!(cfg.persistence.calibration_file, "cache/load_cells.txt");
        assert!(cfg.cells.is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn cell_defaults_gain_and_channel() {
        let cfg = load_toml(
            r#"
[[cells]]
chamber = 2
side = "r"
data_pin = 5
clock_pin = 6
"#,
        )
        .unwrap();
        assert_eq!(cfg.cells[0].gain, 128);
        assert_eq!(cfg.cells[0].channel, "A");
        cfg.validate().unwrap();
    }
}
