//! Acceleration sources for the motion sensor agent.
//!
//! The pipeline only needs the [`AccelerationSource`] capability. Physical
//! drivers plug in behind it; this crate ships a synthetic generator and a
//! recording player.

pub mod replay;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use replay::ReplayAccelerometer;
pub use synthetic::{Axis, SyntheticAccelerometer, Waveform};
pub use types::{Acceleration, AccelerationSource, SensorError, SensorSpec, STANDARD_GRAVITY};
