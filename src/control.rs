//! Inbound control messages.
//!
//! Any message arriving on the control topic toggles realtime reporting. The
//! transport's delivery callback only records the arrival; the pipeline
//! drains the mailbox once per cycle, so a toggle takes effect at the next
//! decision point. Payload content is logged but never interpreted.

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// A control message as delivered by the transport.
#[derive(Debug, Clone)]
pub struct ControlMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl ControlMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Result of draining the mailbox.
#[derive(Debug, Clone, Default)]
pub struct Drained {
    /// Messages that arrived since the last drain
    pub arrivals: usize,
    /// Most recent message, if any
    pub last: Option<ControlMessage>,
}

impl Drained {
    /// Whether the net effect of all arrivals flips the mode flag.
    pub fn flips_mode(&self) -> bool {
        self.arrivals % 2 == 1
    }
}

/// Cloneable handle used by transport callbacks to deliver messages.
#[derive(Debug, Clone)]
pub struct ControlSender {
    sender: Sender<ControlMessage>,
}

impl ControlSender {
    /// Record an arrival. Never blocks.
    pub fn deliver(&self, message: ControlMessage) {
        tracing::debug!(topic = %message.topic, bytes = message.payload.len(), "control message received");
        // The receiver lives as long as the pipeline; a send after shutdown is moot.
        let _ = self.sender.send(message);
    }
}

/// Mailbox owned by the pipeline.
#[derive(Debug)]
pub struct ControlMailbox {
    sender: Sender<ControlMessage>,
    receiver: Receiver<ControlMessage>,
}

impl ControlMailbox {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Handle for the transport's delivery callback.
    pub fn sender(&self) -> ControlSender {
        ControlSender {
            sender: self.sender.clone(),
        }
    }

    /// Take every pending message.
    pub fn drain(&self) -> Drained {
        let mut drained = Drained::default();
        for message in self.receiver.try_iter() {
            drained.arrivals += 1;
            drained.last = Some(message);
        }
        drained
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for ControlMailbox {
    fn default() -> Self {
        Self::new()
    }
}
