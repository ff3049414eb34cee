//! Fixed-capacity analysis window.
//!
//! The window is an arena allocated once at start-up and overwritten every
//! cycle. It holds exactly `N` filtered magnitudes (real part), `N` zeroed
//! imaginary counterparts for the in-place transform, and the acquisition
//! time of every sample for timing telemetry.

use crate::config::ConfigError;
use crate::sensor::Acceleration;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::time::Duration;

/// Sampling cadence actually achieved while filling one window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CycleTiming {
    /// Mean spacing between consecutive samples in milliseconds
    pub mean_interval_ms: f64,
    /// Standard deviation of the spacing in milliseconds
    pub interval_jitter_ms: f64,
    /// Samples per second over the window
    pub achieved_rate_hz: f64,
}

/// One cycle's worth of samples.
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    real: Vec<f64>,
    imag: Vec<f64>,
    acquired_at: Vec<Duration>,
    filled: usize,
    last_raw: Option<Acceleration>,
}

impl AnalysisWindow {
    /// Allocate a window of `len` entries. `len` must be a power of two.
    pub fn new(len: usize) -> Result<Self, ConfigError> {
        if len < 2 || !len.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "window length {len} must be a power of two >= 2"
            )));
        }
        Ok(Self {
            real: vec![0.0; len],
            imag: vec![0.0; len],
            acquired_at: vec![Duration::ZERO; len],
            filled: 0,
            last_raw: None,
        })
    }

    /// Start a new cycle. Previous contents are discarded.
    pub fn clear(&mut self) {
        self.filled = 0;
        self.last_raw = None;
    }

    /// Append one filtered magnitude. Returns false when the window is already full.
    pub fn push(&mut self, magnitude: f64, raw: Acceleration, acquired_at: Duration) -> bool {
        if self.is_full() {
            return false;
        }
        self.real[self.filled] = magnitude;
        self.imag[self.filled] = 0.0;
        self.acquired_at[self.filled] = acquired_at;
        self.filled += 1;
        self.last_raw = Some(raw);
        true
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.real.len()
    }

    /// Number of samples pushed this cycle.
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn capacity(&self) -> usize {
        self.real.len()
    }

    /// Unfiltered reading of the most recent sample.
    pub fn last_raw(&self) -> Option<Acceleration> {
        self.last_raw
    }

    pub fn real(&self) -> &[f64] {
        &self.real
    }

    pub fn imag(&self) -> &[f64] {
        &self.imag
    }

    /// Both halves for in-place spectral analysis.
    pub fn buffers_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        (&mut self.real, &mut self.imag)
    }

    /// Timing statistics for the samples pushed this cycle.
    pub fn timing(&self) -> CycleTiming {
        let stamps = &self.acquired_at[..self.filled];
        if stamps.len() < 2 {
            return CycleTiming::default();
        }

        let intervals: Vec<f64> = stamps
            .windows(2)
            .map(|pair| (pair[1].saturating_sub(pair[0])).as_secs_f64() * 1000.0)
            .collect();
        let span = stamps[stamps.len() - 1]
            .saturating_sub(stamps[0])
            .as_secs_f64();

        let jitter = intervals.iter().std_dev();
        CycleTiming {
            mean_interval_ms: intervals.iter().mean(),
            interval_jitter_ms: if jitter.is_nan() { 0.0 } else { jitter },
            achieved_rate_hz: if span > 0.0 {
                intervals.len() as f64 / span
            } else {
                0.0
            },
        }
    }
}
