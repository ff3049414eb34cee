//! Single-pole low-pass filtering of raw acceleration.
//!
//! Each axis runs an exponential smoother `y += α (x - y)` with
//! `α = 1 - exp(-2π · fc · dt)`. State lives for the whole process and is
//! never reset between analysis windows.

use crate::sensor::Acceleration;
use std::f64::consts::PI;
use std::time::Duration;

/// First-order IIR low-pass filter.
#[derive(Debug, Clone, PartialEq)]
pub struct LowPassFilter {
    alpha: f64,
    output: f64,
}

impl LowPassFilter {
    /// Create a filter for `corner_hz`, fed once every `sample_interval`.
    pub fn new(corner_hz: f64, sample_interval: Duration) -> Self {
        Self {
            alpha: smoothing_factor(corner_hz, sample_interval),
            output: 0.0,
        }
    }

    /// Feed one input and return the new output.
    pub fn input(&mut self, value: f64) -> f64 {
        self.output += self.alpha * (value - self.output);
        self.output
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

/// Smoothing factor for a single-pole filter with time constant `1 / (2π fc)`.
pub fn smoothing_factor(corner_hz: f64, sample_interval: Duration) -> f64 {
    1.0 - (-2.0 * PI * corner_hz * sample_interval.as_secs_f64()).exp()
}

/// Three independent low-pass filters, one per axis.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    x: LowPassFilter,
    y: LowPassFilter,
    z: LowPassFilter,
}

impl FilterBank {
    pub fn new(corner_hz: f64, sample_interval: Duration) -> Self {
        let filter = LowPassFilter::new(corner_hz, sample_interval);
        Self {
            x: filter.clone(),
            y: filter.clone(),
            z: filter,
        }
    }

    /// Filter one sample and return the norm of the filtered axes.
    pub fn apply(&mut self, sample: &Acceleration) -> f64 {
        let x = self.x.input(sample.x);
        let y = self.y.input(sample.y);
        let z = self.z.input(sample.z);
        (x * x + y * y + z * z).sqrt()
    }

    /// Current filtered outputs.
    pub fn outputs(&self) -> Acceleration {
        Acceleration::new(self.x.output(), self.y.output(), self.z.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval() -> Duration {
        Duration::from_secs_f64(1.0 / 64.0)
    }

    #[test]
    fn test_alpha_in_unit_range() {
        let filter = LowPassFilter::new(10.0, interval());
        // 1 - exp(-2π·10/64)
        assert!((filter.alpha() - 0.6253).abs() < 1e-3);
    }

    #[test]
    fn test_step_response_converges() {
        let mut filter = LowPassFilter::new(10.0, interval());
        let mut last = 0.0;
        for _ in 0..50 {
            let y = filter.input(1.0);
            assert!(y >= last);
            last = y;
        }
        assert!((last - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_output_is_attenuated() {
        let mut filter = LowPassFilter::new(10.0, interval());
        let y = filter.input(1.0);
        assert!(y < 1.0 && y > 0.0);
    }

    #[test]
    fn test_magnitude_non_negative() {
        let mut bank = FilterBank::new(10.0, interval());
        for i in 0..100 {
            let v = if i % 2 == 0 { -3.0 } else { 2.0 };
            assert!(bank.apply(&Acceleration::new(v, -v, v * 0.5)) >= 0.0);
        }
    }

    #[test]
    fn test_identical_streams_match() {
        let stream: Vec<Acceleration> = (0..200)
            .map(|i| {
                let t = i as f64 / 64.0;
                Acceleration::new((7.0 * t).sin(), (3.0 * t).cos(), 9.8)
            })
            .collect();

        let mut a = FilterBank::new(10.0, interval());
        let mut b = FilterBank::new(10.0, interval());
        let out_a: Vec<f64> = stream.iter().map(|s| a.apply(s)).collect();
        let out_b: Vec<f64> = stream.iter().map(|s| b.apply(s)).collect();
        assert_eq!(out_a, out_b);
    }
}
