//! Fixed-cadence acceleration sampling.
//!
//! The sampler spaces reads at `1 / sample_rate` measured from the time the
//! previous sample was acquired. When processing overruns the interval the
//! next read happens immediately and the lost time is not made up, so drift
//! never compounds.

use crate::sensor::{Acceleration, AccelerationSource, SensorError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source with the ability to wait.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Clock backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Simulated clock. Sleeping advances time instantly; clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without sleeping, e.g. to model processing cost.
    pub fn advance(&self, duration: Duration) {
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// A reading together with its acquisition time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSample {
    pub acceleration: Acceleration,
    pub acquired_at: Duration,
}

/// Pulls samples from a source at a fixed target interval.
pub struct Sampler<S, C> {
    source: S,
    clock: C,
    interval: Duration,
    last_sample: Option<Duration>,
    overruns: u64,
}

impl<S: AccelerationSource, C: Clock> Sampler<S, C> {
    /// Bring up the source and prepare to sample at `sample_rate_hz`.
    ///
    /// A source that fails to start is reported as [`SensorError::Unavailable`]
    /// and the caller is expected to halt.
    pub fn start(mut source: S, clock: C, sample_rate_hz: f64) -> Result<Self, SensorError> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(SensorError::Unavailable(format!(
                "invalid sample rate {sample_rate_hz}"
            )));
        }
        source.begin()?;
        let spec = source.spec();
        tracing::info!(
            full_scale_g = spec.full_scale_g,
            latency_us = spec.sample_latency.as_micros() as u64,
            sample_rate_hz,
            "accelerometer started"
        );
        Ok(Self {
            source,
            clock,
            interval: Duration::from_secs_f64(1.0 / sample_rate_hz),
            last_sample: None,
            overruns: 0,
        })
    }

    /// Wait for the next slot and read one sample.
    pub fn next_sample(&mut self) -> Result<TimedSample, SensorError> {
        if let Some(last) = self.last_sample {
            let target = last + self.interval;
            let now = self.clock.now();
            if now < target {
                self.clock.sleep(target - now);
            } else if now > target {
                self.overruns += 1;
            }
        }

        // A failed read still spends its slot
        let read = self.source.read_acceleration();
        let acquired_at = self.clock.now();
        self.last_sample = Some(acquired_at);

        let acceleration = read?;
        if !acceleration.is_finite() {
            return Err(SensorError::ReadFailed(format!(
                "non-finite reading ({}, {}, {})",
                acceleration.x, acceleration.y, acceleration.z
            )));
        }

        Ok(TimedSample {
            acceleration,
            acquired_at,
        })
    }

    /// Target spacing between samples.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of samples that started late because the previous interval overran.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
