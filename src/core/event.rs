//! Event records and their wire payload.
//!
//! The payload is a compact JSON object:
//!
//! ```text
//! {"timestamp":1700000000,"accl_mag":9.81,"accl_fft":[1.2,0.4,...]}
//! ```
//!
//! `timestamp` and `accl_mag` are always present. `accl_fft` is optional and
//! is the first thing trimmed when the encoding exceeds the byte budget.

use serde::{Deserialize, Serialize};

/// A detected motion event, built once per publishing cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    /// Unfiltered acceleration norm of the last sample in the cycle
    pub accl_mag: f64,
    /// Even-bin low-band spectrum magnitudes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accl_fft: Vec<f64>,
}

impl EventRecord {
    pub fn new(timestamp: u64, accl_mag: f64) -> Self {
        Self {
            timestamp,
            accl_mag,
            accl_fft: Vec::new(),
        }
    }

    pub fn with_spectrum(mut self, bins: Vec<f64>) -> Self {
        self.accl_fft = bins;
        self
    }

    /// Decode a payload produced by [`encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Limits applied when encoding a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadBudget {
    pub max_bytes: usize,
    pub include_spectrum: bool,
}

impl Default for PayloadBudget {
    fn default() -> Self {
        Self {
            max_bytes: 1024,
            include_spectrum: true,
        }
    }
}

/// An encoded record ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub bytes: Vec<u8>,
    /// Spectrum bins removed to fit the budget
    pub dropped_bins: usize,
    /// Even the required fields alone exceed the budget
    pub over_budget: bool,
}

/// Encode `record`, trimming trailing spectrum bins until the payload fits.
pub fn encode(record: &EventRecord, budget: PayloadBudget) -> Result<EncodedPayload, serde_json::Error> {
    let mut working = record.clone();
    let original_bins = working.accl_fft.len();
    if !budget.include_spectrum {
        working.accl_fft.clear();
    }

    let mut bytes = serde_json::to_vec(&working)?;
    while bytes.len() > budget.max_bytes && !working.accl_fft.is_empty() {
        working.accl_fft.pop();
        bytes = serde_json::to_vec(&working)?;
    }

    let dropped_bins = if budget.include_spectrum {
        original_bins - working.accl_fft.len()
    } else {
        0
    };

    Ok(EncodedPayload {
        over_budget: bytes.len() > budget.max_bytes,
        bytes,
        dropped_bins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EventRecord {
        EventRecord::new(1_700_000_000, 9.80665)
            .with_spectrum(vec![12.5, 3.25, 1.0, 0.5, 0.25, 0.125, 0.0625, 0.03125, 0.015625])
    }

    #[test]
    fn test_field_names() {
        let encoded = encode(&record(), PayloadBudget::default()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded.bytes).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000u64);
        assert!(value["accl_mag"].is_f64());
        assert_eq!(value["accl_fft"].as_array().unwrap().len(), 9);
        assert_eq!(encoded.dropped_bins, 0);
        assert!(!encoded.over_budget);
    }

    #[test]
    fn test_decode_recovers_required_fields() {
        let original = record();
        let encoded = encode(&original, PayloadBudget::default()).unwrap();
        let decoded = EventRecord::decode(&encoded.bytes).unwrap();
        assert_eq!(decoded.timestamp, original.timestamp);
        assert!((decoded.accl_mag - original.accl_mag).abs() < 1e-12);
        assert_eq!(decoded.accl_fft, original.accl_fft);
    }

    #[test]
    fn test_spectrum_omitted_when_disabled() {
        let budget = PayloadBudget {
            max_bytes: 1024,
            include_spectrum: false,
        };
        let encoded = encode(&record(), budget).unwrap();
        let text = String::from_utf8(encoded.bytes).unwrap();
        assert!(!text.contains("accl_fft"));
        assert!(text.contains("timestamp"));
        assert!(text.contains("accl_mag"));
    }

    #[test]
    fn test_truncates_spectrum_to_fit() {
        let budget = PayloadBudget {
            max_bytes: 80,
            include_spectrum: true,
        };
        let encoded = encode(&record(), budget).unwrap();
        assert!(encoded.bytes.len() <= 80);
        assert!(encoded.dropped_bins > 0);
        let decoded = EventRecord::decode(&encoded.bytes).unwrap();
        assert_eq!(decoded.timestamp, 1_700_000_000);
        // Leading bins survive, trailing ones are dropped
        assert_eq!(decoded.accl_fft[..], record().accl_fft[..decoded.accl_fft.len()]);
    }

    #[test]
    fn test_required_fields_never_dropped() {
        let budget = PayloadBudget {
            max_bytes: 10,
            include_spectrum: true,
        };
        let encoded = encode(&record(), budget).unwrap();
        assert!(encoded.over_budget);
        assert_eq!(encoded.dropped_bins, 9);
        let decoded = EventRecord::decode(&encoded.bytes).unwrap();
        assert_eq!(decoded.timestamp, 1_700_000_000);
        assert!(decoded.accl_fft.is_empty());
    }
}
