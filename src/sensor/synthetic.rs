//! Synthetic accelerometer for simulation and testing.
//!
//! Produces a deterministic waveform indexed by sample number, so the same
//! configuration always yields the same stream regardless of wall-clock timing.

use crate::sensor::types::{
    Acceleration, AccelerationSource, SensorError, SensorSpec, STANDARD_GRAVITY,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Axis selector for single-axis waveforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Shape of the generated signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Waveform {
    /// Device lying still: 1g on the z axis
    Rest,
    /// All-zero readings
    Silence,
    /// Sinusoid on one axis, amplitude in m/s²
    Sine {
        frequency_hz: f64,
        amplitude: f64,
        axis: Axis,
    },
}

impl Waveform {
    /// Parse a waveform name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "rest" => Some(Waveform::Rest),
            "silence" | "zero" => Some(Waveform::Silence),
            "sine" => Some(Waveform::Sine {
                frequency_hz: 5.0,
                amplitude: STANDARD_GRAVITY,
                axis: Axis::X,
            }),
            _ => None,
        }
    }
}

/// Deterministic accelerometer driven by a [`Waveform`].
#[derive(Debug, Clone)]
pub struct SyntheticAccelerometer {
    waveform: Waveform,
    sample_rate_hz: f64,
    index: u64,
    available: bool,
    started: bool,
}

impl SyntheticAccelerometer {
    /// Create a source that generates `waveform` as if sampled at `sample_rate_hz`.
    pub fn new(waveform: Waveform, sample_rate_hz: f64) -> Self {
        Self {
            waveform,
            sample_rate_hz,
            index: 0,
            available: true,
            started: false,
        }
    }

    /// A source whose device never comes up.
    pub fn unavailable() -> Self {
        let mut source = Self::new(Waveform::Silence, 1.0);
        source.available = false;
        source
    }

    /// Number of samples generated so far.
    pub fn samples_generated(&self) -> u64 {
        self.index
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    fn value_at(&self, index: u64) -> Acceleration {
        match self.waveform {
            Waveform::Rest => Acceleration::new(0.0, 0.0, STANDARD_GRAVITY),
            Waveform::Silence => Acceleration::default(),
            Waveform::Sine {
                frequency_hz,
                amplitude,
                axis,
            } => {
                let t = index as f64 / self.sample_rate_hz;
                let v = amplitude * (2.0 * PI * frequency_hz * t).sin();
                match axis {
                    Axis::X => Acceleration::new(v, 0.0, 0.0),
                    Axis::Y => Acceleration::new(0.0, v, 0.0),
                    Axis::Z => Acceleration::new(0.0, 0.0, v),
                }
            }
        }
    }
}

impl AccelerationSource for SyntheticAccelerometer {
    fn begin(&mut self) -> Result<(), SensorError> {
        if !self.available {
            return Err(SensorError::Unavailable(
                "synthetic device configured as absent".to_string(),
            ));
        }
        self.started = true;
        Ok(())
    }

    fn read_acceleration(&mut self) -> Result<Acceleration, SensorError> {
        if !self.started {
            return Err(SensorError::ReadFailed("device not started".to_string()));
        }
        let sample = self.value_at(self.index);
        self.index += 1;
        Ok(sample)
    }

    fn spec(&self) -> SensorSpec {
        SensorSpec {
            full_scale_g: 2.0,
            sample_latency: std::time::Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_reports_gravity() {
        let mut source = SyntheticAccelerometer::new(Waveform::Rest, 64.0);
        source.begin().unwrap();
        let a = source.read_acceleration().unwrap();
        assert!((a.magnitude() - STANDARD_GRAVITY).abs() < 1e-12);
    }

    #[test]
    fn test_sine_is_periodic() {
        let wave = Waveform::Sine {
            frequency_hz: 4.0,
            amplitude: 1.0,
            axis: Axis::Y,
        };
        let mut source = SyntheticAccelerometer::new(wave, 64.0);
        source.begin().unwrap();
        let samples: Vec<_> = (0..32)
            .map(|_| source.read_acceleration().unwrap())
            .collect();
        // 16 samples per period at 4 Hz / 64 Hz
        assert!((samples[0].y - samples[16].y).abs() < 1e-9);
        assert!((samples[4].y - 1.0).abs() < 1e-9);
        assert_eq!(samples[4].x, 0.0);
    }

    #[test]
    fn test_unavailable_fails_begin() {
        let mut source = SyntheticAccelerometer::unavailable();
        assert!(matches!(source.begin(), Err(SensorError::Unavailable(_))));
    }

    #[test]
    fn test_read_before_begin_fails() {
        let mut source = SyntheticAccelerometer::new(Waveform::Rest, 64.0);
        assert!(source.read_acceleration().is_err());
    }

    #[test]
    fn test_waveform_names() {
        assert_eq!(Waveform::from_name("rest"), Some(Waveform::Rest));
        assert_eq!(Waveform::from_name("ZERO"), Some(Waveform::Silence));
        assert!(matches!(
            Waveform::from_name("sine"),
            Some(Waveform::Sine { .. })
        ));
        assert_eq!(Waveform::from_name("square"), None);
    }
}
