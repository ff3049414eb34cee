//! The sampling → filtering → spectral decision → publish cycle.
//!
//! One cycle fills the analysis window with exactly `N` filtered samples at
//! the sampler's cadence, analyses it once, decides once and publishes at
//! most once. Only the filter bank and the realtime flag survive from one
//! cycle to the next.

use crate::config::{Config, ConfigError};
use crate::control::ControlMailbox;
use crate::core::decision::{decide, Decision};
use crate::core::event::EventRecord;
use crate::core::filter::FilterBank;
use crate::core::sampler::{Clock, Sampler};
use crate::core::spectrum::{band_magnitudes, SpectralAnalyzer};
use crate::core::windowing::{AnalysisWindow, CycleTiming};
use crate::publisher::{Ack, Feedback, PublishFault, Publisher, Transport};
use crate::sensor::{AccelerationSource, SensorError};
use crate::telemetry::{LastCycle, SharedTelemetryLog};
use std::sync::atomic::{AtomicBool, Ordering};

/// State carried across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub filters: FilterBank,
    pub realtime_reporting: bool,
}

impl PipelineState {
    pub fn new(filters: FilterBank, realtime_reporting: bool) -> Self {
        Self {
            filters,
            realtime_reporting,
        }
    }

    /// Flip realtime reporting, returning the new value.
    pub fn toggle_realtime(&mut self) -> bool {
        self.realtime_reporting = !self.realtime_reporting;
        self.realtime_reporting
    }
}

/// What happened in one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Samples accepted into the window
    pub samples: usize,
    pub band_energy: f64,
    /// Unfiltered norm of the cycle's last sample
    pub accl_mag: f64,
    pub timing: CycleTiming,
    /// Control messages drained this cycle
    pub control_messages: usize,
    /// Realtime flag used for the decision
    pub realtime_reporting: bool,
    pub decision: Decision,
    /// Record handed to the publisher, if any
    pub record: Option<EventRecord>,
    pub publish: Option<Result<Ack, PublishFault>>,
}

impl CycleReport {
    pub fn published(&self) -> bool {
        matches!(self.publish, Some(Ok(_)))
    }
}

/// Consecutive abandoned cycles after which [`Pipeline::run`] gives up on the sensor.
pub const MAX_CONSECUTIVE_ABORTS: u32 = 64;

type TimestampSource = Box<dyn Fn() -> u64 + Send>;

fn epoch_seconds() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Cycle controller owning every stage.
pub struct Pipeline<S, C, T, F> {
    sampler: Sampler<S, C>,
    state: PipelineState,
    window: AnalysisWindow,
    analyzer: SpectralAnalyzer,
    energy_threshold: f64,
    publisher: Publisher<T, F>,
    mailbox: ControlMailbox,
    telemetry: SharedTelemetryLog,
    timestamp: TimestampSource,
}

impl<S, C, T, F> Pipeline<S, C, T, F>
where
    S: AccelerationSource,
    C: Clock,
    T: Transport,
    F: Feedback,
{
    /// Assemble a pipeline from a started sampler and a publisher.
    pub fn new(
        config: &Config,
        sampler: Sampler<S, C>,
        publisher: Publisher<T, F>,
        mailbox: ControlMailbox,
        telemetry: SharedTelemetryLog,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let sampling = &config.sampling;
        let filters = FilterBank::new(sampling.corner_frequency_hz, sampler.interval());

        Ok(Self {
            sampler,
            state: PipelineState::new(filters, config.detection.realtime_on_start),
            window: AnalysisWindow::new(sampling.window_len)?,
            analyzer: SpectralAnalyzer::new(sampling.window_len, config.detection.low_band_bins)?,
            energy_threshold: config.detection.energy_threshold,
            publisher,
            mailbox,
            telemetry,
            timestamp: Box::new(epoch_seconds),
        })
    }

    /// Replace the wall-clock source used for event timestamps.
    pub fn with_timestamp_source(mut self, source: impl Fn() -> u64 + Send + 'static) -> Self {
        self.timestamp = Box::new(source);
        self
    }

    /// Run one full cycle.
    ///
    /// A sensor read failure abandons the cycle without publishing; filter
    /// state is kept and the next cycle starts with an empty window.
    pub fn run_cycle(&mut self) -> Result<CycleReport, SensorError> {
        self.publisher.service();

        self.window.clear();
        let overruns_before = self.sampler.overruns();
        while !self.window.is_full() {
            let sample = match self.sampler.next_sample() {
                Ok(sample) => sample,
                Err(e) => {
                    self.telemetry.record_samples(self.window.filled() as u64);
                    self.telemetry.record_cycle_aborted();
                    tracing::warn!("cycle abandoned: {e}");
                    return Err(e);
                }
            };
            let magnitude = self.state.filters.apply(&sample.acceleration);
            self.window
                .push(magnitude, sample.acceleration, sample.acquired_at);
        }

        let samples = self.window.filled();
        let timing = self.window.timing();
        self.telemetry.record_samples(samples as u64);
        let overruns = self.sampler.overruns() - overruns_before;
        if overruns > 0 {
            self.telemetry.record_overruns(overruns);
            tracing::debug!(
                overruns,
                achieved_rate_hz = timing.achieved_rate_hz,
                "sampling fell behind target rate"
            );
        }

        let accl_mag = self
            .window
            .last_raw()
            .map(|a| a.magnitude())
            .unwrap_or(0.0);

        let (real, imag) = self.window.buffers_mut();
        let band_energy = self.analyzer.analyze(real, imag);

        let drained = self.mailbox.drain();
        if let Some(ref last) = drained.last {
            tracing::info!(
                arrivals = drained.arrivals,
                payload = %String::from_utf8_lossy(&last.payload),
                "received control message"
            );
        }
        for _ in 0..drained.arrivals {
            self.state.toggle_realtime();
            self.telemetry.record_mode_toggle();
        }
        if drained.arrivals > 0 {
            tracing::info!(
                realtime_reporting = self.state.realtime_reporting,
                "reporting mode updated"
            );
        }

        let realtime_reporting = self.state.realtime_reporting;
        let decision = decide(band_energy, self.energy_threshold, realtime_reporting);
        if decision.threshold_crossed {
            self.telemetry.record_threshold_crossing();
        }

        let mut record = None;
        let mut publish = None;
        if decision.publish {
            let event = EventRecord::new((self.timestamp)(), accl_mag).with_spectrum(
                band_magnitudes(self.window.real(), self.analyzer.low_band_bins()),
            );
            let result = self.publisher.publish(&event, decision.threshold_crossed);
            match &result {
                Ok(ack) => {
                    self.telemetry.record_published();
                    if ack.dropped_bins > 0 {
                        self.telemetry.record_spectrum_truncated();
                    }
                }
                Err(PublishFault::NotConnected) => self.telemetry.record_dropped(),
                Err(_) => self.telemetry.record_publish_failure(),
            }
            record = Some(event);
            publish = Some(result);
        }

        self.telemetry.record_cycle(LastCycle {
            band_energy,
            timing,
            realtime_reporting,
        });
        tracing::debug!(
            band_energy,
            accl_mag,
            publish = decision.publish,
            achieved_rate_hz = timing.achieved_rate_hz,
            "cycle complete"
        );

        Ok(CycleReport {
            samples,
            band_energy,
            accl_mag,
            timing,
            control_messages: drained.arrivals,
            realtime_reporting,
            decision,
            record,
            publish,
        })
    }

    /// Run cycles until `running` is cleared, `max_cycles` complete, or
    /// [`MAX_CONSECUTIVE_ABORTS`] cycles in a row are abandoned.
    /// Returns the number of completed cycles.
    pub fn run(&mut self, running: &AtomicBool, max_cycles: Option<u64>) -> u64 {
        let mut completed = 0;
        let mut consecutive_aborts = 0u32;
        while running.load(Ordering::SeqCst) {
            if max_cycles.is_some_and(|max| completed >= max) {
                break;
            }
            match self.run_cycle() {
                Ok(_) => {
                    completed += 1;
                    consecutive_aborts = 0;
                }
                Err(e) => {
                    consecutive_aborts += 1;
                    if consecutive_aborts >= MAX_CONSECUTIVE_ABORTS {
                        tracing::error!(
                            consecutive_aborts,
                            completed,
                            "accelerometer keeps failing, stopping: {e}"
                        );
                        break;
                    }
                }
            }
        }
        completed
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn mailbox(&self) -> &ControlMailbox {
        &self.mailbox
    }

    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }

    pub fn publisher(&self) -> &Publisher<T, F> {
        &self.publisher
    }

    pub fn sampler(&self) -> &Sampler<S, C> {
        &self.sampler
    }

    pub fn telemetry(&self) -> &SharedTelemetryLog {
        &self.telemetry
    }
}
