//! Offline simulation of the motion sensor pipeline.
//!
//! This example shows how to:
//! 1. Drive the pipeline from a synthetic accelerometer on a simulated clock
//! 2. Watch band energy stay quiet at rest and rise under vibration
//! 3. Force realtime reporting with a control message
//! 4. Inspect the published payloads and session telemetry
//!
//! Run with: cargo run --example simulate_demo

use motion_sensor_agent::{
    config::Config,
    control::{ControlMailbox, ControlMessage},
    core::{ManualClock, Pipeline, Sampler},
    publisher::{MemoryTransport, NoFeedback, Publisher},
    sensor::{AccelerationSource, SyntheticAccelerometer, Waveform},
    telemetry::create_shared_log,
};

fn run_scenario<S: AccelerationSource>(label: &str, source: S, cycles: usize, toggle_at: Option<usize>) {
    let config = Config::default();
    let transport = MemoryTransport::new();
    let telemetry = create_shared_log();

    let sampler = match Sampler::start(source, ManualClock::new(), config.sampling.sample_rate_hz) {
        Ok(sampler) => sampler,
        Err(e) => {
            eprintln!("Error starting source: {e}");
            return;
        }
    };
    let publisher = Publisher::new(
        transport.clone(),
        NoFeedback,
        config.transport.publish_topic.clone(),
        config.payload.budget(),
        config.feedback.tone(),
    );
    let mut pipeline = match Pipeline::new(
        &config,
        sampler,
        publisher,
        ControlMailbox::new(),
        telemetry.clone(),
    ) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    println!("=== {label} ===");
    for cycle in 0..cycles {
        if toggle_at == Some(cycle) {
            println!("  -> sending control message");
            pipeline
                .mailbox()
                .sender()
                .deliver(ControlMessage::new(config.transport.control_topic.clone(), "toggle"));
        }

        match pipeline.run_cycle() {
            Ok(report) => println!(
                "  cycle {:>2}: energy {:>7.3}  realtime {:<5}  publish {:<5}  ({:.1} Hz)",
                cycle,
                report.band_energy,
                report.realtime_reporting,
                report.published(),
                report.timing.achieved_rate_hz
            ),
            Err(e) => println!("  cycle {cycle:>2}: abandoned ({e})"),
        }
    }

    if let Some(message) = transport.messages().first() {
        println!();
        println!("  First payload on '{}':", message.topic);
        println!("    {}", String::from_utf8_lossy(&message.payload));
    }
    println!();
    println!("{}", telemetry.summary());
    println!();
}

fn main() {
    println!("Motion Sensor Agent - Simulation Demo");
    println!("=====================================");
    println!();

    let rate = Config::default().sampling.sample_rate_hz;

    run_scenario(
        "Device at rest",
        SyntheticAccelerometer::new(Waveform::Rest, rate),
        6,
        None,
    );

    if let Some(shaking) = Waveform::from_name("sine") {
        run_scenario(
            "5 Hz vibration, 1 g peak",
            SyntheticAccelerometer::new(shaking, rate),
            6,
            None,
        );
    }

    run_scenario(
        "Silent device with realtime reporting toggled on",
        SyntheticAccelerometer::new(Waveform::Silence, rate),
        6,
        Some(3),
    );

    println!("Demo complete!");
}
