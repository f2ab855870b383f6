// src/scheduler/telemetry.rs

//! Status records for external broadcast.

use super::Rates;
use crate::arming::ArmingState;
use crate::pid::PidTerms;
use crate::types::{AttitudeEstimate, MixerOutput};

/// Snapshot of the control core published at a bounded rate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetryRecord {
    /// Time the record was produced, microseconds.
    pub timestamp_us: u64,
    /// Current attitude estimate.
    pub attitude: AttitudeEstimate,
    /// Pitch controller contributions.
    pub pitch: PidTerms,
    /// Roll controller contributions.
    pub roll: PidTerms,
    /// Yaw controller contributions.
    pub yaw: PidTerms,
    /// Last mixer output.
    pub motors: MixerOutput,
    /// Arming state.
    pub arming: ArmingState,
    /// Rates of the last diagnostics window.
    pub rates: Rates,
}

/// Limits publishing to one record per interval.
#[derive(Debug, Clone)]
pub struct TelemetryGate {
    interval_us: u64,
    last_us: Option<u64>,
}

impl TelemetryGate {
    /// Creates a gate that opens at most once every `interval_us`.
    pub fn new(interval_us: u64) -> Self {
        Self {
            interval_us,
            last_us: None,
        }
    }

    /// Returns `true`, and restarts the interval, when a record is due.
    pub fn due(&mut self, now_us: u64) -> bool {
        match self.last_us {
            Some(last) if now_us.saturating_sub(last) < self.interval_us => false,
            _ => {
                self.last_us = Some(now_us);
                true
            }
        }
    }
}
