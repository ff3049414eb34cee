//! Motion Sensor Agent - accelerometer vibration-event detector.
//!
//! This library samples a three-axis accelerometer at a fixed rate, smooths
//! each axis with a single-pole low-pass filter, measures vibration energy in
//! a low-frequency band of the windowed spectrum and publishes a small JSON
//! event whenever that energy crosses a threshold.
//!
//! # Guarantees
//!
//! - **Fixed cadence**: samples are spaced from the previous acquisition and
//!   late samples never compound drift
//! - **Exactly N samples**: every analysis window holds exactly `N` samples
//! - **One decision per cycle**: at most one publish attempt per window
//! - **Best effort**: a disconnected or failing transport drops the event,
//!   it never stalls or retries within the cycle
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Motion Sensor Agent                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐   │
//! │  │ Sampler  │──▶│ Low-pass │──▶│ Window   │──▶│ Hamming+FFT  │   │
//! │  │ (64 Hz)  │   │ (10 Hz)  │   │ (N = 32) │   │ band energy  │   │
//! │  └──────────┘   └──────────┘   └──────────┘   └──────────────┘   │
//! │                                                      │           │
//! │  ┌──────────┐                                        ▼           │
//! │  │ Control  │────── realtime flag ──────────▶ ┌──────────────┐   │
//! │  │ mailbox  │                                 │   Decision   │   │
//! │  └──────────┘                                 └──────────────┘   │
//! │       ▲                                              │           │
//! │       │                                              ▼           │
//! │  ┌──────────┐                                 ┌──────────────┐   │
//! │  │  Server  │                                 │  Publisher   │   │
//! │  └──────────┘                                 └──────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use motion_sensor_agent::core::{ManualClock, Pipeline, Sampler};
//! use motion_sensor_agent::publisher::{LogTransport, NoFeedback, Publisher};
//! use motion_sensor_agent::sensor::{SyntheticAccelerometer, Waveform};
//! use motion_sensor_agent::{create_shared_log, Config, ControlMailbox};
//!
//! let config = Config::default();
//! let source = SyntheticAccelerometer::new(Waveform::from_name("sine").unwrap(), 64.0);
//! let sampler = Sampler::start(source, ManualClock::new(), 64.0).expect("sensor");
//! let publisher = Publisher::new(
//!     LogTransport,
//!     NoFeedback,
//!     config.transport.publish_topic.clone(),
//!     config.payload.budget(),
//!     config.feedback.tone(),
//! );
//! let mut pipeline = Pipeline::new(
//!     &config,
//!     sampler,
//!     publisher,
//!     ControlMailbox::new(),
//!     create_shared_log(),
//! )
//! .expect("valid config");
//!
//! let report = pipeline.run_cycle().expect("cycle");
//! println!("band energy {:.2}", report.band_energy);
//! ```

pub mod config;
pub mod control;
pub mod core;
pub mod publisher;
pub mod sensor;
pub mod telemetry;

#[cfg(feature = "gateway")]
pub mod gateway;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use control::{ControlMailbox, ControlMessage, ControlSender};
pub use core::{CycleReport, Decision, EventRecord, Pipeline, PipelineState};
pub use publisher::{Ack, PublishFault, Publisher, Transport};
pub use sensor::{Acceleration, AccelerationSource, SensorError};
pub use telemetry::{create_shared_log, SharedTelemetryLog, TelemetryLog, TelemetryStats};

// Gateway re-exports (when enabled)
#[cfg(feature = "gateway")]
pub use gateway::{GatewayClient, GatewayConfig, GatewayError, GatewayTransport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
