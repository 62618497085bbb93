use std::time::Duration;

use desiccator_traits::{RawSensorSource, SourceError};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::{collect_batch, gain_pulses, sign_extend_24, wait_until_low_with_timeout};

/// Bit-banged HX711 reader on Raspberry Pi GPIO.
pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
    timeout: Duration,
}

impl Hx711 {
    pub fn new(
        data_pin: u8,
        clock_pin: u8,
        gain: u8,
        channel: char,
        timeout: Duration,
    ) -> Result<Self> {
        let pulses = gain_pulses(gain, channel)?;
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))?;
        let dt = gpio
            .get(data_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 dt pin {data_pin}: {e}")))?
            .into_input();
        let mut sck = gpio
            .get(clock_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 sck pin {clock_pin}: {e}")))?
            .into_output();
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            gain_pulses: pulses,
            timeout,
        })
    }

    pub fn read_with_timeout(&mut self) -> Result<i32> {
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), self.timeout, Duration::from_micros(200))?;

        // Clock out 24 bits
        let mut value: u32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | u32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Pulse gain to set next measurement
        for _ in 0..self.gain_pulses {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        let raw = sign_extend_24(value);
        trace!(raw, "hx711 raw read");
        Ok(raw)
    }
}

impl RawSensorSource for Hx711 {
    fn read_raw(&mut self, n: usize) -> std::result::Result<Vec<i32>, SourceError> {
        collect_batch(n, || self.read_with_timeout()).map_err(|e| Box::new(e) as SourceError)
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}
