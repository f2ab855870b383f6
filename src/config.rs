// src/config.rs

//! # Flight Configuration
//!
//! All tunables of the control core in one record. Each part has a
//! `Default` holding values that fly the reference airframe, and a
//! `validate` method. The scheduler refuses to start from a configuration
//! that does not validate, so the vehicle can never arm with missing or
//! nonsensical gains or ranges.

use crate::arming::ArmingConfig;
use crate::calibration::ImuOffsets;
use crate::error::ConfigError;
use crate::estimator::EstimatorConfig;
use crate::mixer::MixerConfig;
use crate::pid::PidConfig;
use crate::types::Axis;
use crate::units::ImuScale;

/// Sign corrections for how the sensor is mounted on the frame.
///
/// A set flag negates the measured angle before it reaches the controller
/// for that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MountingConfig {
    /// Negate measured pitch.
    pub invert_pitch: bool,
    /// Negate measured roll.
    pub invert_roll: bool,
    /// Negate measured yaw.
    pub invert_yaw: bool,
}

impl MountingConfig {
    /// Applies the mounting sign for one axis.
    pub fn adjust(&self, axis: Axis, value: f32) -> f32 {
        let invert = match axis {
            Axis::Pitch => self.invert_pitch,
            Axis::Roll => self.invert_roll,
            Axis::Yaw => self.invert_yaw,
        };
        if invert {
            -value
        } else {
            value
        }
    }
}

/// Timing and fault thresholds of the control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerConfig {
    /// Tick period in seconds; substituted when dt is zero or unknown.
    pub nominal_dt: f32,
    /// Smallest dt accepted from sample timestamps, seconds.
    pub min_dt: f32,
    /// Largest dt accepted from sample timestamps, seconds.
    pub max_dt: f32,
    /// Consecutive failed sensor reads tolerated before faulting.
    pub max_sensor_failures: u32,
    /// Minimum spacing of telemetry records, microseconds.
    pub telemetry_interval_us: u64,
    /// Window of the rate counters, microseconds.
    pub diagnostics_window_us: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            nominal_dt: 0.0025,
            min_dt: 0.0005,
            max_dt: 0.1,
            max_sensor_failures: 10,
            telemetry_interval_us: 100_000,
            diagnostics_window_us: 1_000_000,
        }
    }
}

impl SchedulerConfig {
    /// Checks the time steps for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for value in [self.nominal_dt, self.min_dt, self.max_dt] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidTimeStep { value });
            }
        }
        if self.max_dt < self.min_dt {
            return Err(ConfigError::InvalidTimeStep { value: self.max_dt });
        }
        Ok(())
    }

    /// Tick period in microseconds.
    pub fn nominal_period_us(&self) -> u64 {
        (self.nominal_dt * 1_000_000.0) as u64
    }
}

/// Complete configuration of the flight core.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlightConfig {
    /// Sensor sensitivities.
    pub scale: ImuScale,
    /// Sensor offsets subtracted before conversion.
    pub offsets: ImuOffsets,
    /// Fusion strategy and its constants.
    pub estimator: EstimatorConfig,
    /// Pitch controller.
    pub pitch: PidConfig,
    /// Roll controller.
    pub roll: PidConfig,
    /// Yaw controller.
    pub yaw: PidConfig,
    /// Motor mixer range and idle command.
    pub mixer: MixerConfig,
    /// Start-up sequence timing.
    pub arming: ArmingConfig,
    /// Sensor mounting signs.
    pub mounting: MountingConfig,
    /// Loop timing and fault thresholds.
    pub scheduler: SchedulerConfig,
}

impl FlightConfig {
    /// Creates a configuration with default values for all parameters.
    ///
    /// Example Usage
    /// ```
    /// use quad_flight_core::config::FlightConfig;
    /// use quad_flight_core::pid::PidGains;
    ///
    /// let mut config = FlightConfig::new();
    ///
    /// // Tune the attitude controllers.
    /// config.pitch.gains = PidGains::new(2.0, 0.001, 300.0);
    /// config.roll.gains = config.pitch.gains;
    /// config.yaw.gains = PidGains::new(1.0, 0.0, 0.0);
    ///
    /// // Limit the integral term to prevent windup.
    /// config.pitch.integral_limit = 500.0;
    ///
    /// // The sensor is mounted with roll reversed.
    /// config.mounting.invert_roll = true;
    ///
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every part of the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for value in [self.scale.gyro_lsb_per_dps, self.scale.accel_lsb_per_g] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidScale { value });
            }
        }
        self.estimator.validate()?;
        self.pitch.validate()?;
        self.roll.validate()?;
        self.yaw.validate()?;
        self.mixer.validate()?;
        self.arming.validate(&self.mixer)?;
        self.scheduler.validate()
    }

    /// Controller configuration for one axis.
    pub fn pid(&self, axis: Axis) -> &PidConfig {
        match axis {
            Axis::Pitch => &self.pitch,
            Axis::Roll => &self.roll,
            Axis::Yaw => &self.yaw,
        }
    }
}
