use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (i.e., line goes low),
/// or a timeout expires. Sleeps in small intervals to avoid CPU spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Collect up to `n` conversions from `read`.
///
/// A data-ready timeout ends the batch early and returns what was gathered so
/// far; any other error is propagated.
pub fn collect_batch(n: usize, mut read: impl FnMut() -> Result<i32>) -> Result<Vec<i32>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        match read() {
            Ok(v) => out.push(v),
            Err(HwError::DataReadyTimeout) => {
                tracing::debug!(got = out.len(), wanted = n, "data-ready timeout, short batch");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

/// Number of trailing clock pulses that select gain/channel for the next HX711 conversion.
///
/// Channel A supports gain 128 (25 pulses) and 64 (27 pulses); channel B is fixed at 32 (26 pulses).
pub fn gain_pulses(gain: u8, channel: char) -> Result<u8> {
    match (channel.to_ascii_uppercase(), gain) {
        ('A', 128) => Ok(25),
        ('B', 32) => Ok(26),
        ('A', 64) => Ok(27),
        _ => Err(HwError::InvalidGain { gain, channel }),
    }
}

/// Sign-extend a 24-bit two's complement HX711 word.
#[inline]
pub fn sign_extend_24(value: u32) -> i32 {
    let v = (value & 0x00FF_FFFF) as i32;
    if (v & 0x0080_0000) != 0 { v | !0x00FF_FFFF } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(128, 'A', 25)]
    #[case(128, 'a', 25)]
    #[case(32, 'b', 26)]
    #[case(64, 'A', 27)]
    fn gain_pulse_table(#[case] gain: u8, #[case] channel: char, #[case] pulses: u8) {
        assert_eq!(gain_pulses(gain, channel).unwrap(), pulses);
    }

    #[rstest]
    #[case(32, 'A')]
    #[case(64, 'B')]
    #[case(128, 'C')]
    fn unsupported_gain_channel_pairs(#[case] gain: u8, #[case] channel: char) {
        assert!(matches!(
            gain_pulses(gain, channel),
            Err(HwError::InvalidGain { gain: g, channel: c }) if g == gain && c == channel
        ));
    }

    #[rstest]
    #[case(0x000001, 1)]
    #[case(0x7FFFFF, 8_388_607)]
    #[case(0xFFFFFF, -1)]
    #[case(0x800000, -8_388_608)]
    #[case(0xFF00_0001, 1)]
    fn sign_extension(#[case] word: u32, #[case] expected: i32) {
        assert_eq!(sign_extend_24(word), expected);
    }
}
