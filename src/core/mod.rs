//! Core signal path for the motion sensor agent.
//!
//! This module contains:
//! - Fixed-cadence sampling against an injectable clock
//! - Per-axis low-pass filtering
//! - The fixed-length analysis window and its timing
//! - Hamming taper, FFT and band energy
//! - The publish decision and the event record it produces
//! - The cycle controller tying the stages together

pub mod decision;
pub mod event;
pub mod filter;
pub mod pipeline;
pub mod sampler;
pub mod spectrum;
pub mod windowing;

// Re-export commonly used types
pub use decision::{decide, Decision};
pub use event::{encode, EncodedPayload, EventRecord, PayloadBudget};
pub use filter::{FilterBank, LowPassFilter};
pub use pipeline::{CycleReport, Pipeline, PipelineState, MAX_CONSECUTIVE_ABORTS};
pub use sampler::{Clock, ManualClock, Sampler, SystemClock, TimedSample};
pub use spectrum::{band_energy, band_magnitudes, SpectralAnalyzer};
pub use windowing::{AnalysisWindow, CycleTiming};
