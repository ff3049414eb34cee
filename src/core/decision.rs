//! Per-cycle publish decision.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Decision {
    /// An event record should be published this cycle
    pub publish: bool,
    /// Band energy reached the threshold (drives the feedback tone)
    pub threshold_crossed: bool,
}

impl Decision {
    /// Publishing only because realtime reporting is forced.
    pub fn is_forced(&self) -> bool {
        self.publish && !self.threshold_crossed
    }
}

/// Decide whether to publish. Re-evaluated from scratch every cycle.
pub fn decide(band_energy: f64, energy_threshold: f64, realtime_reporting: bool) -> Decision {
    let threshold_crossed = band_energy >= energy_threshold;
    Decision {
        publish: threshold_crossed || realtime_reporting,
        threshold_crossed,
    }
}
