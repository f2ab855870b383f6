// src/error.rs

//! # Error Types
//!
//! Errors reported by the hardware interfaces, configuration validation and
//! the command channel, plus the reasons that drive the arming state
//! machine into `Faulted`.

use crate::types::Motor;
use thiserror::Error;

/// Failure reported by the sensor interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// No sample arrived within the bounded read timeout.
    #[error("sensor read timed out")]
    Timeout,
    /// The bus transaction failed.
    #[error("sensor bus error")]
    Bus,
    /// The sensor was read before `initialize` succeeded.
    #[error("sensor not initialized")]
    NotInitialized,
}

/// Failure reported by the actuator interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorError {
    /// Hardware refused the command.
    #[error("actuator {motor:?} rejected command {command}")]
    Rejected {
        /// Motor the command was addressed to.
        motor: Motor,
        /// Rejected pulse width.
        command: u16,
    },
    /// The command lies outside the range declared by the hardware.
    #[error("actuator {motor:?} command {command} out of range")]
    OutOfRange {
        /// Motor the command was addressed to.
        motor: Motor,
        /// Offending pulse width.
        command: u16,
    },
}

/// Invalid configuration detected at start-up. Always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A PID gain is not a finite number.
    #[error("gain {value} is not finite")]
    InvalidGain {
        /// Offending gain.
        value: f32,
    },
    /// The integral limit must be finite and positive.
    #[error("integral limit {value} must be finite and positive")]
    InvalidIntegralLimit {
        /// Offending limit.
        value: f32,
    },
    /// The deadband width must be finite and non-negative.
    #[error("deadband {value} must be finite and non-negative")]
    InvalidDeadband {
        /// Offending width.
        value: f32,
    },
    /// Output saturation must be finite and positive.
    #[error("output limit {value} must be finite and positive")]
    InvalidOutputLimit {
        /// Offending limit.
        value: f32,
    },
    /// A period or time step must be finite and positive.
    #[error("time step {value} must be finite and positive")]
    InvalidTimeStep {
        /// Offending step in seconds.
        value: f32,
    },
    /// The actuator range is empty or inverted.
    #[error("command range {min}..={max} is empty")]
    InvalidCommandRange {
        /// Lower bound.
        min: u16,
        /// Upper bound.
        max: u16,
    },
    /// A fixed command lies outside the actuator range.
    #[error("command {value} outside actuator range")]
    CommandOutOfRange {
        /// Offending command.
        value: u16,
    },
    /// Sensor sensitivity must be finite and positive.
    #[error("sensor scale {value} must be finite and positive")]
    InvalidScale {
        /// Offending sensitivity.
        value: f32,
    },
    /// A fusion weight or noise constant is outside its valid range.
    #[error("filter parameter {value} out of range")]
    InvalidFilterParameter {
        /// Offending value.
        value: f32,
    },
    /// The motor pulse order does not name every motor exactly once.
    #[error("motor pulse order must name every motor once")]
    InvalidPulseOrder,
    /// The accelerometer acceptance band is empty.
    #[error("acceleration band {low}..{high} is empty")]
    InvalidAccelBand {
        /// Lower bound, g.
        low: f32,
        /// Upper bound, g.
        high: f32,
    },
}

/// Failure to hand a command to the control context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// The update carried a NaN or infinite value and was dropped whole.
    #[error("command value is not a finite number")]
    NonFinite,
}

/// Reason the arming state machine entered `Faulted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultReason {
    /// Sensor reads kept failing beyond the configured threshold.
    #[error("persistent sensor failure")]
    SensorFailure,
    /// An actuator write failed.
    #[error("actuator write failure")]
    ActuatorFailure,
    /// The sensor could not be initialized.
    #[error("sensor initialization failed")]
    SensorInit,
    /// An external fault request.
    #[error("external fault request")]
    External,
}
