//! Acceleration sample types and the sensor capability.
//!
//! Readings are in SI engineering units (m/s²), the unit the accelerometer
//! driver reports. Helpers convert from standard gravity units.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// One raw three-axis acceleration reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Build a reading from values expressed in multiples of standard gravity.
    pub fn from_g(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: x * STANDARD_GRAVITY,
            y: y * STANDARD_GRAVITY,
            z: z * STANDARD_GRAVITY,
        }
    }

    /// Unfiltered Euclidean norm.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Static characteristics of an accelerometer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSpec {
    /// Full-scale range in multiples of g (e.g. 2 for ±2g)
    pub full_scale_g: f64,
    /// Time a single read takes on the bus
    pub sample_latency: Duration,
}

impl Default for SensorSpec {
    fn default() -> Self {
        Self {
            full_scale_g: 2.0,
            sample_latency: Duration::from_micros(500),
        }
    }
}

/// Errors raised by an acceleration source.
#[derive(Debug)]
pub enum SensorError {
    /// The device could not be found or initialised
    Unavailable(String),
    /// A read failed after initialisation
    ReadFailed(String),
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::Unavailable(e) => write!(f, "Accelerometer unavailable: {e}"),
            SensorError::ReadFailed(e) => write!(f, "Accelerometer read failed: {e}"),
        }
    }
}

impl std::error::Error for SensorError {}

/// Capability to read three-axis acceleration.
pub trait AccelerationSource {
    /// Bring the device up. Failure here is fatal for the process.
    fn begin(&mut self) -> Result<(), SensorError>;

    /// Read one sample.
    fn read_acceleration(&mut self) -> Result<Acceleration, SensorError>;

    fn spec(&self) -> SensorSpec {
        SensorSpec::default()
    }
}

impl<S: AccelerationSource + ?Sized> AccelerationSource for Box<S> {
    fn begin(&mut self) -> Result<(), SensorError> {
        (**self).begin()
    }

    fn read_acceleration(&mut self) -> Result<Acceleration, SensorError> {
        (**self).read_acceleration()
    }

    fn spec(&self) -> SensorSpec {
        (**self).spec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude() {
        let a = Acceleration::new(3.0, 4.0, 0.0);
        assert!((a.magnitude() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_g_scales_to_si() {
        let a = Acceleration::from_g(0.0, 0.0, 1.0);
        assert!((a.z - STANDARD_GRAVITY).abs() < 1e-12);
        assert!((a.magnitude() - STANDARD_GRAVITY).abs() < 1e-12);
    }
}
