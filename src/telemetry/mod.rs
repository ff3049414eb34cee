//! Telemetry for the motion sensor agent.
//!
//! Counters and cycle timing that make degraded operation observable:
//! late samples, dropped events and failed publishes never raise errors.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, LastCycle, SharedTelemetryLog,
    TelemetryLog, TelemetryStats,
};
