//! Hardware seams shared by the desiccator crates.
//!
//! Sensors are consumed through two small contracts so the calibration and
//! sampling logic never depends on a concrete driver.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error returned across the trait boundary.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Supplier of raw strain-gauge ADC counts for one load cell.
pub trait RawSensorSource {
    /// Read up to `n` raw samples in acquisition order.
    ///
    /// Implementations may return fewer than `n` samples when the device
    /// times out. Repeated calls must not reset internal device state.
    fn read_raw(&mut self, n: usize) -> Result<Vec<i32>, SourceError>;
}

/// Array of temperature / relative-humidity sensors read as one unit.
pub trait EnvironmentalArray {
    /// One `(temperature_c, relative_humidity)` pair per configured sensor,
    /// always in the same order. Relative humidity is a fraction in `[0, 1]`.
    fn measure_all(&mut self) -> Result<Vec<(f64, f64)>, SourceError>;
}

impl<T: RawSensorSource + ?Sized> RawSensorSource for Box<T> {
    fn read_raw(&mut self, n: usize) -> Result<Vec<i32>, SourceError> {
        (**self).read_raw(n)
    }
}

impl<T: EnvironmentalArray + ?Sized> EnvironmentalArray for Box<T> {
    fn measure_all(&mut self) -> Result<Vec<(f64, f64)>, SourceError> {
        (**self).measure_all()
    }
}
