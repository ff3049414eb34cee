//! Best-effort event publishing.
//!
//! The publisher serializes an [`EventRecord`] within the payload budget and
//! hands it to a [`Transport`]. Nothing is queued or retried: if the transport
//! is down or rejects the message the event is dropped and the next cycle
//! gets an independent chance.

use crate::core::event::{encode, EventRecord, PayloadBudget};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Message transport capability.
pub trait Transport {
    /// Whether the transport currently has a session with the broker.
    fn connected(&self) -> bool;

    /// Publish `payload` on `topic`. Returns false if the broker rejected it.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool;

    /// One service step: reconnect when due and deliver inbound messages.
    fn service(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connected(&self) -> bool {
        (**self).connected()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        (**self).publish(topic, payload)
    }

    fn service(&mut self) {
        (**self).service()
    }
}

/// Audible/visual signal raised on genuine threshold crossings.
pub trait Feedback {
    fn signal(&mut self, duration: Duration);
}

impl<F: FnMut(Duration)> Feedback for F {
    fn signal(&mut self, duration: Duration) {
        self(duration)
    }
}

/// Feedback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl Feedback for NoFeedback {
    fn signal(&mut self, _duration: Duration) {}
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl Feedback for TerminalBell {
    fn signal(&mut self, duration: Duration) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
        tracing::debug!(tone_ms = duration.as_millis() as u64, "feedback tone");
    }
}

/// Successful hand-off to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Payload size in bytes
    pub bytes: usize,
    /// Spectrum bins trimmed to fit the budget
    pub dropped_bins: usize,
    /// Whether the feedback tone fired
    pub feedback: bool,
}

/// Why an event was not delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishFault {
    /// Transport had no session; the event was dropped
    NotConnected,
    /// Transport refused the message
    Rejected { bytes: usize },
    /// The record could not be serialized
    Encode(String),
}

impl std::fmt::Display for PublishFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishFault::NotConnected => write!(f, "transport not connected, event dropped"),
            PublishFault::Rejected { bytes } => {
                write!(f, "transport rejected {bytes}-byte payload")
            }
            PublishFault::Encode(e) => write!(f, "payload encoding failed: {e}"),
        }
    }
}

impl std::error::Error for PublishFault {}

/// Serializes records and publishes them on a fixed topic.
pub struct Publisher<T, F> {
    transport: T,
    feedback: F,
    topic: String,
    budget: PayloadBudget,
    tone: Duration,
}

impl<T: Transport, F: Feedback> Publisher<T, F> {
    pub fn new(
        transport: T,
        feedback: F,
        topic: impl Into<String>,
        budget: PayloadBudget,
        tone: Duration,
    ) -> Self {
        Self {
            transport,
            feedback,
            topic: topic.into(),
            budget,
            tone,
        }
    }

    /// Publish one record. The feedback tone fires only when the record was
    /// accepted and the cycle genuinely crossed the energy threshold.
    pub fn publish(&mut self, record: &EventRecord, threshold_crossed: bool) -> Result<Ack, PublishFault> {
        if !self.transport.connected() {
            tracing::warn!(topic = %self.topic, "not connected, dropping event");
            return Err(PublishFault::NotConnected);
        }

        let encoded =
            encode(record, self.budget).map_err(|e| PublishFault::Encode(e.to_string()))?;
        if encoded.dropped_bins > 0 {
            tracing::warn!(
                dropped_bins = encoded.dropped_bins,
                max_bytes = self.budget.max_bytes,
                "spectrum trimmed to fit payload budget"
            );
        }
        if encoded.over_budget {
            tracing::warn!(
                bytes = encoded.bytes.len(),
                max_bytes = self.budget.max_bytes,
                "required fields exceed payload budget"
            );
        }

        let bytes = encoded.bytes.len();
        if !self.transport.publish(&self.topic, &encoded.bytes) {
            tracing::warn!(
                topic = %self.topic,
                payload = %String::from_utf8_lossy(&encoded.bytes),
                "publish failed"
            );
            return Err(PublishFault::Rejected { bytes });
        }

        tracing::info!(
            topic = %self.topic,
            payload = %String::from_utf8_lossy(&encoded.bytes),
            "published event"
        );

        if threshold_crossed {
            self.feedback.signal(self.tone);
        }

        Ok(Ack {
            bytes,
            dropped_bins: encoded.dropped_bins,
            feedback: threshold_crossed,
        })
    }

    /// Give the transport its service step.
    pub fn service(&mut self) {
        self.transport.service();
    }

    pub fn connected(&self) -> bool {
        self.transport.connected()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Transport that writes payloads to the log. Always connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl Transport for LogTransport {
    fn connected(&self) -> bool {
        true
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        println!("[{topic}] {}", String::from_utf8_lossy(payload));
        true
    }
}

/// A message captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    reject: bool,
    attempts: usize,
    services: usize,
    messages: Vec<PublishedMessage>,
}

/// In-memory transport for simulation and tests. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                connected: true,
                ..MemoryState::default()
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn set_connected(&self, connected: bool) {
        self.with_state(|s| s.connected = connected);
    }

    /// Make the broker refuse every publish.
    pub fn set_reject(&self, reject: bool) {
        self.with_state(|s| s.reject = reject);
    }

    /// Accepted messages, oldest first.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.with_state(|s| s.messages.clone())
    }

    /// Every publish call that reached the transport, accepted or not.
    pub fn attempts(&self) -> usize {
        self.with_state(|s| s.attempts)
    }

    pub fn service_calls(&self) -> usize {
        self.with_state(|s| s.services)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn connected(&self) -> bool {
        self.with_state(|s| s.connected)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        self.with_state(|s| {
            s.attempts += 1;
            if s.reject || !s.connected {
                return false;
            }
            s.messages.push(PublishedMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            });
            true
        })
    }

    fn service(&mut self) {
        self.with_state(|s| s.services += 1);
    }
}
