// src/pid.rs

//! # PID Control Module
//!
//! This module provides the compute function, control data structure and the
//! stateful per-axis controller used for pitch, roll and yaw stabilization,
//! together with the output shaping applied to the controller result.

pub mod axis;
pub use axis::*;
pub mod shaping;
pub use shaping::*;
