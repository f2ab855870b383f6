// src/pid/shaping.rs

//! Output shaping applied to the raw PID sum before it leaves the controller.

use crate::error::ConfigError;

/// Transfer function from raw PID sum to controller output.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputShaping {
    /// Pass the sum through unchanged.
    Identity,
    /// Saturate symmetrically at `±limit`.
    Saturate {
        /// Largest output magnitude.
        limit: f32,
    },
}

impl Default for OutputShaping {
    fn default() -> Self {
        OutputShaping::Saturate { limit: 400.0 }
    }
}

impl OutputShaping {
    /// Applies the transfer function.
    pub fn apply(&self, value: f32) -> f32 {
        match *self {
            OutputShaping::Identity => value,
            OutputShaping::Saturate { limit } => value.clamp(-limit, limit),
        }
    }

    /// Checks that a saturation limit is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            OutputShaping::Identity => Ok(()),
            OutputShaping::Saturate { limit } if limit.is_finite() && limit > 0.0 => Ok(()),
            OutputShaping::Saturate { limit } => {
                Err(ConfigError::InvalidOutputLimit { value: limit })
            }
        }
    }
}
