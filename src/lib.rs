// src/lib.rs

//! # Quad-X Flight Control Core
//!
//! This crate turns raw inertial samples into stabilized motor commands for a
//! quadrotor in an X frame. It provides attitude estimation (complementary,
//! per-axis Kalman and Madgwick fusion behind one interface), per-axis PID
//! control with deadband and anti-windup, a quad-X motor mixer, an arming
//! sequence that gates actuator output, and a fixed-period scheduler that ties
//! them together.
//!
//! Hardware access is supplied by the caller through the traits in
//! [`interfaces`]. The crate is `no_std` and performs no heap allocation.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

#[macro_use]
mod logging;

pub mod arming;
pub mod calibration;
pub mod config;
pub mod error;
pub mod estimator;
pub mod interfaces;
pub mod mixer;
pub mod pid;
pub mod scheduler;
pub mod types;
pub mod units;

#[doc(inline)]
pub use arming::{ArmingMachine, ArmingState, RampPhase};
#[doc(inline)]
pub use config::FlightConfig;
#[doc(inline)]
pub use error::{ActuatorError, CommandError, ConfigError, FaultReason, SensorError};
#[doc(inline)]
pub use estimator::{AttitudeEstimator, Estimator};
#[doc(inline)]
pub use interfaces::{Actuators, ImuSensor, TelemetrySink};
#[doc(inline)]
pub use mixer::MotorMixer;
#[doc(inline)]
pub use pid::AxisPid;
#[doc(inline)]
pub use scheduler::{CommandChannel, CommandUpdate, ControlScheduler};
#[doc(inline)]
pub use types::*;

#[cfg(test)]
mod test_utils;
