//! Batch reduction for noisy load cell samples.
//!
//! Single-sample ADC noise and vibration produce occasional large outliers.
//! A trimmed mean over a fixed quantile band rejects them deterministically.

/// Arithmetic mean, `None` for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Quantile `q` in `[0, 1]` of an ascending-sorted slice, linearly
/// interpolated between closest ranks (position `q * (n - 1)`).
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !q.is_finite() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    if lower == upper || frac == 0.0 {
        return Some(sorted[lower]);
    }
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Inclusive `[low, high]` quantile band of a batch.
pub fn quantile_band(samples: &[i32], low: f64, high: f64) -> Option<(f64, f64)> {
    let mut sorted: Vec<f64> = samples.iter().map(|&v| f64::from(v)).collect();
    sorted.sort_by(f64::total_cmp);
    Some((quantile(&sorted, low)?, quantile(&sorted, high)?))
}

/// Mean of the samples inside the `[low, high]` quantile band of this batch.
///
/// Values strictly below the lower or strictly above the upper quantile are
/// discarded. If nothing survives the trim, the untrimmed mean is returned.
pub fn trimmed_mean(samples: &[i32], low: f64, high: f64) -> Option<f64> {
    let (lo, hi) = quantile_band(samples, low, high)?;
    let (sum, kept) = samples
        .iter()
        .map(|&v| f64::from(v))
        .filter(|v| *v >= lo && *v <= hi)
        .fold((0.0f64, 0usize), |(s, n), v| (s + v, n + 1));
    if kept == 0 {
        let all: Vec<f64> = samples.iter().map(|&v| f64::from(v)).collect();
        return mean(&all);
    }
    Some(sum / kept as f64)
}
