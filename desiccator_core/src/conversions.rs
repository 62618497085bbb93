//! `From` implementations bridging `desiccator_config` types to core types.

use std::time::Duration;

use crate::config::{CoordinatorCfg, MeasureCfg};
use crate::error::{CoreError, Result};
use crate::persist::PersistedCell;
use crate::sensor::{CellId, Channel, HardwareBinding, Side};

// ── MeasureCfg ───────────────────────────────────────────────────────────────

impl From<&desiccator_config::MassCfg> for MeasureCfg {
    fn from(c: &desiccator_config::MassCfg) -> Self {
        Self {
            batch_size: c.batch_size,
            trim_low: c.trim_low,
            trim_high: c.trim_high,
            tare_samples: c.tare_samples,
            read_retries: c.read_retries,
        }
    }
}

// ── CoordinatorCfg ───────────────────────────────────────────────────────────

impl From<&desiccator_config::Sampling> for CoordinatorCfg {
    fn from(c: &desiccator_config::Sampling) -> Self {
        Self {
            interval: Duration::from_millis(c.interval_ms),
            retry_delay: Duration::from_millis(c.retry_delay_ms),
            max_consecutive_failures: (c.max_consecutive_failures > 0)
                .then_some(c.max_consecutive_failures),
        }
    }
}

// ── Cell wiring ──────────────────────────────────────────────────────────────

impl TryFrom<&desiccator_config::CellCfg> for PersistedCell {
    type Error = CoreError;

    fn try_from(c: &desiccator_config::CellCfg) -> Result<Self> {
        let mut side_chars = c.side.chars();
        let side = match (side_chars.next(), side_chars.next()) {
            (Some(ch), None) => Side::from_char(ch),
            _ => None,
        }
        .ok_or_else(|| CoreError::InvalidTopology(format!("unknown side {:?}", c.side)))?;
        let id = CellId::new(c.chamber, side);
        id.slot()?;
        Ok(PersistedCell {
            id,
            binding: HardwareBinding {
                data_pin: c.data_pin,
                clock_pin: c.clock_pin,
                gain: c.gain,
                channel: c.channel.parse::<Channel>()?,
            },
            slope: None,
            intercept: None,
        })
    }
}
