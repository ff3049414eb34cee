//! Pipeline telemetry.
//!
//! Counts what the pipeline did (samples, cycles, publishes, drops) and keeps
//! the timing of the last cycle so a degraded sample rate is visible even
//! though it never raises an error.

use crate::core::windowing::CycleTiming;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Counters for the current run.
#[derive(Debug)]
pub struct TelemetryLog {
    samples_acquired: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_aborted: AtomicU64,
    sample_overruns: AtomicU64,
    threshold_crossings: AtomicU64,
    events_published: AtomicU64,
    events_dropped: AtomicU64,
    publish_failures: AtomicU64,
    spectrum_truncations: AtomicU64,
    mode_toggles: AtomicU64,
    last_cycle: Mutex<Option<LastCycle>>,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

/// Snapshot of the most recent cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastCycle {
    pub band_energy: f64,
    pub timing: CycleTiming,
    pub realtime_reporting: bool,
}

impl TelemetryLog {
    pub fn new() -> Self {
        Self {
            samples_acquired: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            cycles_aborted: AtomicU64::new(0),
            sample_overruns: AtomicU64::new(0),
            threshold_crossings: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            spectrum_truncations: AtomicU64::new(0),
            mode_toggles: AtomicU64::new(0),
            last_cycle: Mutex::new(None),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that accumulates onto stats persisted at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("could not load previous telemetry: {e}");
        }

        log
    }

    pub fn record_samples(&self, count: u64) {
        self.samples_acquired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_overruns(&self, count: u64) {
        self.sample_overruns.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_cycle(&self, last: LastCycle) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slot) = self.last_cycle.lock() {
            *slot = Some(last);
        }
    }

    pub fn record_cycle_aborted(&self) {
        self.cycles_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_threshold_crossing(&self) {
        self.threshold_crossings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Event dropped because the transport was not connected.
    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spectrum_truncated(&self) {
        self.spectrum_truncations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mode_toggle(&self) {
        self.mode_toggles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TelemetryStats {
        let last_cycle = self.last_cycle.lock().ok().and_then(|slot| *slot);
        TelemetryStats {
            samples_acquired: self.samples_acquired.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_aborted: self.cycles_aborted.load(Ordering::Relaxed),
            sample_overruns: self.sample_overruns.load(Ordering::Relaxed),
            threshold_crossings: self.threshold_crossings.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            spectrum_truncations: self.spectrum_truncations.load(Ordering::Relaxed),
            mode_toggles: self.mode_toggles.load(Ordering::Relaxed),
            last_cycle,
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        let timing = match stats.last_cycle {
            Some(last) => format!(
                "{:.1} Hz achieved (interval {:.2} ms ± {:.2} ms), last band energy {:.2}",
                last.timing.achieved_rate_hz,
                last.timing.mean_interval_ms,
                last.timing.interval_jitter_ms,
                last.band_energy
            ),
            None => "no completed cycle".to_string(),
        };
        format!(
            "Session Statistics:\n\
             - Samples acquired: {}\n\
             - Cycles completed: {} ({} aborted)\n\
             - Late samples: {}\n\
             - Threshold crossings: {}\n\
             - Events published: {}\n\
             - Events dropped (disconnected): {}\n\
             - Publish failures: {}\n\
             - Spectrum truncations: {}\n\
             - Mode toggles: {}\n\
             - Last cycle: {}\n\
             - Session duration: {} seconds",
            stats.samples_acquired,
            stats.cycles_completed,
            stats.cycles_aborted,
            stats.sample_overruns,
            stats.threshold_crossings,
            stats.events_published,
            stats.events_dropped,
            stats.publish_failures,
            stats.spectrum_truncations,
            stats.mode_toggles,
            timing,
            stats.session_duration_secs
        )
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                samples_acquired: stats.samples_acquired,
                cycles_completed: stats.cycles_completed,
                cycles_aborted: stats.cycles_aborted,
                sample_overruns: stats.sample_overruns,
                events_published: stats.events_published,
                events_dropped: stats.events_dropped,
                publish_failures: stats.publish_failures,
                threshold_crossings: stats.threshold_crossings,
                spectrum_truncations: stats.spectrum_truncations,
                mode_toggles: stats.mode_toggles,
                last_cycle: stats.last_cycle,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_acquired
                    .store(persisted.samples_acquired, Ordering::Relaxed);
                self.cycles_completed
                    .store(persisted.cycles_completed, Ordering::Relaxed);
                self.cycles_aborted
                    .store(persisted.cycles_aborted, Ordering::Relaxed);
                self.sample_overruns
                    .store(persisted.sample_overruns, Ordering::Relaxed);
                self.events_published
                    .store(persisted.events_published, Ordering::Relaxed);
                self.events_dropped
                    .store(persisted.events_dropped, Ordering::Relaxed);
                self.publish_failures
                    .store(persisted.publish_failures, Ordering::Relaxed);
                self.threshold_crossings
                    .store(persisted.threshold_crossings, Ordering::Relaxed);
                self.spectrum_truncations
                    .store(persisted.spectrum_truncations, Ordering::Relaxed);
                self.mode_toggles
                    .store(persisted.mode_toggles, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TelemetryLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub samples_acquired: u64,
    pub cycles_completed: u64,
    pub cycles_aborted: u64,
    pub sample_overruns: u64,
    pub threshold_crossings: u64,
    pub events_published: u64,
    pub events_dropped: u64,
    pub publish_failures: u64,
    pub spectrum_truncations: u64,
    pub mode_toggles: u64,
    pub last_cycle: Option<LastCycle>,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_acquired: u64,
    cycles_completed: u64,
    // Older files predate these counters
    #[serde(default)]
    cycles_aborted: u64,
    #[serde(default)]
    sample_overruns: u64,
    events_published: u64,
    events_dropped: u64,
    publish_failures: u64,
    threshold_crossings: u64,
    #[serde(default)]
    spectrum_truncations: u64,
    #[serde(default)]
    mode_toggles: u64,
    #[serde(default)]
    last_cycle: Option<LastCycle>,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared telemetry log.
pub type SharedTelemetryLog = Arc<TelemetryLog>;

pub fn create_shared_log() -> SharedTelemetryLog {
    Arc::new(TelemetryLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTelemetryLog {
    Arc::new(TelemetryLog::with_persistence(path))
}
