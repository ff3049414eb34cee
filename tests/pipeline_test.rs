//! End-to-end tests for the sampling → spectrum → decision → publish cycle.

use motion_sensor_agent::config::{Config, PayloadProfile};
use motion_sensor_agent::control::{ControlMailbox, ControlMessage};
use motion_sensor_agent::core::{
    Clock, EventRecord, ManualClock, Pipeline, Sampler, MAX_CONSECUTIVE_ABORTS,
};
use motion_sensor_agent::publisher::{MemoryTransport, PublishFault, Publisher};
use motion_sensor_agent::sensor::{
    Acceleration, AccelerationSource, ReplayAccelerometer, SensorError, SyntheticAccelerometer,
    Waveform,
};
use motion_sensor_agent::telemetry::create_shared_log;
use std::cell::Cell;
use std::f64::consts::PI;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

const TIMESTAMP: u64 = 1_700_000_000;

struct Rig<S: AccelerationSource> {
    pipeline: Pipeline<S, ManualClock, MemoryTransport, Box<dyn FnMut(Duration)>>,
    transport: MemoryTransport,
    tones: Rc<Cell<usize>>,
}

fn rig_with<S: AccelerationSource>(config: &Config, source: S) -> Rig<S> {
    let transport = MemoryTransport::new();
    let tones = Rc::new(Cell::new(0));
    let counter = tones.clone();
    let feedback: Box<dyn FnMut(Duration)> =
        Box::new(move |_tone: Duration| counter.set(counter.get() + 1));

    let sampler = Sampler::start(source, ManualClock::new(), config.sampling.sample_rate_hz)
        .expect("source starts");
    let publisher = Publisher::new(
        transport.clone(),
        feedback,
        config.transport.publish_topic.clone(),
        config.payload.budget(),
        config.feedback.tone(),
    );
    let pipeline = Pipeline::new(
        config,
        sampler,
        publisher,
        ControlMailbox::new(),
        create_shared_log(),
    )
    .expect("valid config")
    .with_timestamp_source(|| TIMESTAMP);

    Rig {
        pipeline,
        transport,
        tones,
    }
}

fn synthetic(config: &Config, waveform: Waveform) -> Rig<SyntheticAccelerometer> {
    rig_with(
        config,
        SyntheticAccelerometer::new(waveform, config.sampling.sample_rate_hz),
    )
}

fn shaking() -> Waveform {
    Waveform::from_name("sine").expect("known waveform")
}

#[test]
fn test_device_at_rest_never_publishes() {
    let config = Config::default();
    let mut rig = synthetic(&config, Waveform::Rest);

    for _ in 0..120 {
        let report = rig.pipeline.run_cycle().unwrap();
        assert!(report.band_energy < config.detection.energy_threshold);
        assert!(!report.decision.publish);
    }
    assert_eq!(rig.transport.attempts(), 0);
    assert_eq!(rig.tones.get(), 0);
}

#[test]
fn test_vibration_publishes_within_one_second() {
    let config = Config::default();
    let mut rig = synthetic(&config, shaking());

    // Two 32-sample windows at 64 Hz span one second.
    let mut published = false;
    for _ in 0..2 {
        let report = rig.pipeline.run_cycle().unwrap();
        if report.published() {
            assert!(report.band_energy >= 15.0);
            assert!(report.decision.threshold_crossed);
            published = true;
            break;
        }
    }
    assert!(published);
    assert!(rig.transport.attempts() >= 1);
    assert_eq!(rig.tones.get(), 1);

    let messages = rig.transport.messages();
    assert_eq!(messages[0].topic, "accelerometer_out");
}

#[test]
fn test_zero_input_has_no_energy() {
    let config = Config::default();
    let mut rig = synthetic(&config, Waveform::Silence);

    for _ in 0..5 {
        let report = rig.pipeline.run_cycle().unwrap();
        assert!(report.band_energy < 1.0);
    }
    assert_eq!(rig.transport.attempts(), 0);
}

fn offline_band_energy(samples: &[Acceleration], corner_hz: f64, rate_hz: f64, bands: usize) -> f64 {
    let alpha = 1.0 - (-2.0 * PI * corner_hz / rate_hz).exp();
    let n = samples.len();
    let (mut fx, mut fy, mut fz) = (0.0, 0.0, 0.0);
    let tapered: Vec<f64> = samples
        .iter()
        .enumerate()
        .map(|(i, a)| {
            fx += alpha * (a.x - fx);
            fy += alpha * (a.y - fy);
            fz += alpha * (a.z - fz);
            let w = 0.54 - 0.46 * (2.0 * PI * i as f64 / (n as f64 - 1.0)).cos();
            (fx * fx + fy * fy + fz * fz).sqrt() * w
        })
        .collect();

    (2..2 * bands)
        .step_by(2)
        .map(|k| {
            let (mut re, mut im) = (0.0, 0.0);
            for (i, v) in tapered.iter().enumerate() {
                let angle = -2.0 * PI * (k * i) as f64 / n as f64;
                re += v * angle.cos();
                im += v * angle.sin();
            }
            (re * re + im * im).sqrt()
        })
        .sum()
}

#[test]
fn test_energy_matches_offline_dft() {
    let config = Config::default();
    let samples: Vec<Acceleration> = (0..32)
        .map(|i| {
            let t = i as f64;
            Acceleration::new(5.0 * (0.7 * t).sin(), 2.0 * (0.3 * t).cos(), 9.8 + (1.9 * t).sin())
        })
        .collect();

    let expected = offline_band_energy(&samples, 10.0, 64.0, 10);
    let mut rig = rig_with(&config, ReplayAccelerometer::from_samples(samples));
    let report = rig.pipeline.run_cycle().unwrap();

    assert!(
        (report.band_energy - expected).abs() < 1e-9 * expected.max(1.0),
        "pipeline {} vs offline {}",
        report.band_energy,
        expected
    );
}

#[test]
fn test_published_payload_decodes() {
    let config = Config::default();
    let mut rig = synthetic(&config, shaking());

    let report = loop {
        let report = rig.pipeline.run_cycle().unwrap();
        if report.published() {
            break report;
        }
    };

    let messages = rig.transport.messages();
    let decoded = EventRecord::decode(&messages[0].payload).unwrap();
    assert_eq!(decoded.timestamp, TIMESTAMP);
    assert_eq!(decoded.accl_fft.len(), 9);
    assert!(decoded.accl_mag >= 0.0);

    let sent = report.record.expect("record kept in report");
    assert_eq!(decoded.accl_mag, sent.accl_mag);
    assert_eq!(decoded.accl_fft, sent.accl_fft);
    assert!(messages[0].payload.len() <= config.payload.max_bytes);
}

#[test]
fn test_legacy_profile_fits_small_buffer() {
    let mut config = Config::default();
    config.payload.profile = PayloadProfile::Legacy;
    let mut rig = synthetic(&config, shaking());

    for _ in 0..4 {
        rig.pipeline.run_cycle().unwrap();
    }

    let messages = rig.transport.messages();
    assert!(!messages.is_empty());
    for message in messages {
        assert!(message.payload.len() <= 180);
        let json: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
        assert!(json.get("accl_fft").is_none());
        assert!(json.get("timestamp").is_some());
        assert!(json.get("accl_mag").is_some());
    }
}

#[test]
fn test_identical_streams_give_identical_decisions() {
    let config = Config::default();
    let mut first = synthetic(&config, shaking());
    let mut second = synthetic(&config, shaking());

    for _ in 0..10 {
        let a = first.pipeline.run_cycle().unwrap();
        let b = second.pipeline.run_cycle().unwrap();
        assert_eq!(a.band_energy, b.band_energy);
        assert_eq!(a.decision, b.decision);
    }
    assert_eq!(
        first.pipeline.state().filters,
        second.pipeline.state().filters
    );
}

#[test]
fn test_control_messages_toggle_by_parity() {
    let config = Config::default();

    for count in 0..5 {
        let mut rig = synthetic(&config, Waveform::Silence);
        let sender = rig.pipeline.mailbox().sender();
        for i in 0..count {
            sender.deliver(ControlMessage::new("feedback_in", format!("msg-{i}")));
        }

        let report = rig.pipeline.run_cycle().unwrap();
        assert_eq!(report.control_messages, count);
        assert_eq!(report.realtime_reporting, count % 2 == 1);
        assert_eq!(
            rig.pipeline.telemetry().stats().mode_toggles,
            count as u64
        );
    }
}

#[test]
fn test_every_window_holds_exactly_n_samples() {
    let config = Config::default();
    let mut rig = synthetic(&config, shaking());

    for _ in 0..50 {
        let report = rig.pipeline.run_cycle().unwrap();
        assert_eq!(report.samples, 32);
        assert_eq!(rig.pipeline.window().filled(), 32);
    }
    assert_eq!(rig.pipeline.telemetry().stats().samples_acquired, 50 * 32);
    assert_eq!(rig.pipeline.sampler().source().samples_generated(), 50 * 32);
}

#[test]
fn test_achieved_rate_matches_target() {
    let config = Config::default();
    let mut rig = synthetic(&config, Waveform::Rest);

    let report = rig.pipeline.run_cycle().unwrap();
    assert!((report.timing.achieved_rate_hz - 64.0).abs() < 1e-6);
    assert!((report.timing.mean_interval_ms - 15.625).abs() < 1e-9);
    assert!(report.timing.interval_jitter_ms.abs() < 1e-9);

    // 10 cycles of 32 samples: 319 intervals of 1/64 s.
    for _ in 0..9 {
        rig.pipeline.run_cycle().unwrap();
    }
    let elapsed = rig.pipeline.sampler().clock().now();
    assert_eq!(elapsed, Duration::from_nanos(319 * 15_625_000));
    assert_eq!(rig.pipeline.sampler().overruns(), 0);
}

#[test]
fn test_disconnected_transport_drops_events() {
    let config = Config::default();
    let mut rig = synthetic(&config, shaking());
    rig.transport.set_connected(false);

    for _ in 0..4 {
        let report = rig.pipeline.run_cycle().unwrap();
        if report.decision.publish {
            assert!(matches!(
                report.publish,
                Some(Err(PublishFault::NotConnected))
            ));
        }
    }

    let stats = rig.pipeline.telemetry().stats();
    assert!(stats.events_dropped >= 1);
    assert_eq!(stats.events_published, 0);
    assert_eq!(rig.transport.attempts(), 0);
    assert_eq!(rig.tones.get(), 0);

    // Recovery on the next cycle once the transport is back.
    rig.transport.set_connected(true);
    let report = rig.pipeline.run_cycle().unwrap();
    assert!(report.published());
}

#[test]
fn test_forced_reporting_is_silent() {
    let mut config = Config::default();
    config.detection.realtime_on_start = true;
    let mut rig = synthetic(&config, Waveform::Silence);

    for _ in 0..3 {
        let report = rig.pipeline.run_cycle().unwrap();
        assert!(report.decision.is_forced());
        assert!(report.published());
    }
    assert_eq!(rig.transport.messages().len(), 3);
    assert_eq!(rig.tones.get(), 0);
}

#[test]
fn test_rejected_publish_is_not_retried() {
    let config = Config::default();
    let mut rig = synthetic(&config, shaking());
    rig.transport.set_reject(true);

    let report = rig.pipeline.run_cycle().unwrap();
    let report = if report.decision.publish {
        report
    } else {
        rig.pipeline.run_cycle().unwrap()
    };
    assert!(matches!(
        report.publish,
        Some(Err(PublishFault::Rejected { .. }))
    ));
    assert_eq!(rig.transport.attempts(), 1);
    assert_eq!(rig.tones.get(), 0);
    assert_eq!(rig.pipeline.telemetry().stats().publish_failures, 1);
}

/// Source that fails exactly once, on the given read.
struct FlakySource {
    inner: SyntheticAccelerometer,
    fail_on: u64,
    reads: u64,
}

impl AccelerationSource for FlakySource {
    fn begin(&mut self) -> Result<(), SensorError> {
        self.inner.begin()
    }

    fn read_acceleration(&mut self) -> Result<Acceleration, SensorError> {
        self.reads += 1;
        if self.reads == self.fail_on {
            return Err(SensorError::ReadFailed("bus timeout".to_string()));
        }
        self.inner.read_acceleration()
    }
}

#[test]
fn test_read_failure_abandons_cycle() {
    let mut config = Config::default();
    config.detection.realtime_on_start = true;
    let source = FlakySource {
        inner: SyntheticAccelerometer::new(Waveform::Silence, 64.0),
        fail_on: 10,
        reads: 0,
    };
    let mut rig = rig_with(&config, source);

    assert!(rig.pipeline.run_cycle().is_err());
    assert_eq!(rig.transport.attempts(), 0);

    let report = rig.pipeline.run_cycle().unwrap();
    assert_eq!(report.samples, 32);
    assert!(report.published());

    let stats = rig.pipeline.telemetry().stats();
    assert_eq!(stats.cycles_aborted, 1);
    assert_eq!(stats.cycles_completed, 1);
}

#[test]
fn test_run_skips_failed_cycles() {
    let config = Config::default();
    let source = FlakySource {
        inner: SyntheticAccelerometer::new(Waveform::Rest, 64.0),
        fail_on: 40,
        reads: 0,
    };
    let mut rig = rig_with(&config, source);

    let running = AtomicBool::new(true);
    assert_eq!(rig.pipeline.run(&running, Some(3)), 3);
    assert_eq!(rig.pipeline.telemetry().stats().cycles_aborted, 1);
}

/// Source whose bus dies for good after `healthy` reads.
struct DyingSource {
    inner: SyntheticAccelerometer,
    healthy: u64,
    reads: u64,
}

impl AccelerationSource for DyingSource {
    fn begin(&mut self) -> Result<(), SensorError> {
        self.inner.begin()
    }

    fn read_acceleration(&mut self) -> Result<Acceleration, SensorError> {
        self.reads += 1;
        if self.reads > self.healthy {
            return Err(SensorError::ReadFailed("bus timeout".to_string()));
        }
        self.inner.read_acceleration()
    }
}

#[test]
fn test_dead_sensor_retries_at_sample_cadence() {
    let config = Config::default();
    let source = DyingSource {
        inner: SyntheticAccelerometer::new(Waveform::Rest, 64.0),
        healthy: 40,
        reads: 0,
    };
    let mut rig = rig_with(&config, source);
    let interval = rig.pipeline.sampler().interval();

    assert!(rig.pipeline.run_cycle().is_ok());
    assert!(rig.pipeline.run_cycle().is_err());

    for _ in 0..5 {
        let before = rig.pipeline.sampler().clock().now();
        assert!(rig.pipeline.run_cycle().is_err());
        assert_eq!(rig.pipeline.sampler().clock().now() - before, interval);
    }
    assert_eq!(rig.pipeline.telemetry().stats().cycles_aborted, 6);
}

#[test]
fn test_run_gives_up_on_dead_sensor() {
    let config = Config::default();
    let source = DyingSource {
        inner: SyntheticAccelerometer::new(Waveform::Rest, 64.0),
        healthy: 40,
        reads: 0,
    };
    let mut rig = rig_with(&config, source);
    let start = rig.pipeline.sampler().clock().now();

    let running = AtomicBool::new(true);
    assert_eq!(rig.pipeline.run(&running, Some(5)), 1);

    let stats = rig.pipeline.telemetry().stats();
    assert_eq!(stats.cycles_completed, 1);
    assert_eq!(stats.cycles_aborted, MAX_CONSECUTIVE_ABORTS as u64);

    // 40 good reads plus one slot per abandoned cycle
    let reads = 40 + MAX_CONSECUTIVE_ABORTS;
    let elapsed = rig.pipeline.sampler().clock().now() - start;
    assert_eq!(elapsed, rig.pipeline.sampler().interval() * (reads - 1));
}

#[test]
fn test_run_keeps_going_through_intermittent_faults() {
    let config = Config::default();
    let source = FlakySource {
        inner: SyntheticAccelerometer::new(Waveform::Rest, 64.0),
        fail_on: 33,
        reads: 0,
    };
    let mut rig = rig_with(&config, source);

    let running = AtomicBool::new(true);
    assert_eq!(rig.pipeline.run(&running, Some(4)), 4);
    assert_eq!(rig.pipeline.telemetry().stats().cycles_aborted, 1);
}

#[test]
fn test_non_finite_reading_does_not_poison_filters() {
    let mut config = Config::default();
    config.detection.realtime_on_start = true;
    let mut samples = vec![Acceleration::new(0.0, 0.0, 9.8); 256];
    samples[10] = Acceleration::new(f64::NAN, 0.0, 9.8);
    let mut rig = rig_with(&config, ReplayAccelerometer::from_samples(samples));

    assert!(matches!(
        rig.pipeline.run_cycle(),
        Err(SensorError::ReadFailed(_))
    ));
    assert_eq!(rig.transport.attempts(), 0);

    for _ in 0..3 {
        let report = rig.pipeline.run_cycle().unwrap();
        assert!(report.band_energy.is_finite());
        assert!(report.accl_mag.is_finite());
        assert!(report.published());
    }
    assert!(rig.pipeline.state().filters.outputs().is_finite());

    for message in rig.transport.messages() {
        let record = EventRecord::decode(&message.payload).unwrap();
        assert!(record.accl_mag.is_finite());
    }
}

#[test]
fn test_missing_sensor_is_fatal_at_start() {
    let result = Sampler::start(SyntheticAccelerometer::unavailable(), ManualClock::new(), 64.0);
    assert!(matches!(result, Err(SensorError::Unavailable(_))));
}
