// src/mixer.rs

//! # Quad-X Motor Mixer
//!
//! Maps the three attitude corrections plus collective throttle onto the four
//! motors of an X frame:
//!
//! ```text
//! front_right = -roll - pitch - yaw + throttle
//! back_right  = -roll + pitch + yaw + throttle
//! front_left  =  roll - pitch + yaw + throttle
//! back_left   =  roll + pitch - yaw + throttle
//! ```
//!
//! Every command is clamped into the actuator range. At or below the
//! throttle floor all four motors receive the idle command, whatever the
//! attitude terms say.

use crate::error::ConfigError;
use crate::types::MixerOutput;
use num_traits::Float;

/// Actuator range and idle behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MixerConfig {
    /// Smallest valid command, pulse width in microseconds.
    pub min_command: u16,
    /// Largest valid command, pulse width in microseconds.
    pub max_command: u16,
    /// Command that keeps a motor stopped.
    pub idle_command: u16,
    /// Throttle commands at or below this value idle all motors.
    pub throttle_floor: u16,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            min_command: 1000,
            max_command: 2000,
            idle_command: 1000,
            throttle_floor: 1000,
        }
    }
}

impl MixerConfig {
    /// Checks that the range is non-empty and holds the idle command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_command >= self.max_command {
            return Err(ConfigError::InvalidCommandRange {
                min: self.min_command,
                max: self.max_command,
            });
        }
        for value in [self.idle_command, self.throttle_floor] {
            if !self.in_range(value) {
                return Err(ConfigError::CommandOutOfRange { value });
            }
        }
        Ok(())
    }

    /// Returns `true` if `command` lies within `[min_command, max_command]`.
    pub fn in_range(&self, command: u16) -> bool {
        (self.min_command..=self.max_command).contains(&command)
    }
}

/// Quad-X mixer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorMixer {
    config: MixerConfig,
}

impl MotorMixer {
    /// Creates a mixer for a validated range.
    pub fn new(config: MixerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The mixer range.
    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// All motors idle.
    pub fn idle(&self) -> MixerOutput {
        MixerOutput::uniform(self.config.idle_command)
    }

    /// Converts a throttle percentage into a command across the full range.
    pub fn throttle_command(&self, percent: f32) -> f32 {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let min = f32::from(self.config.min_command);
        let span = f32::from(self.config.max_command) - min;
        min + span * percent / 100.0
    }

    /// Mixes the controller outputs with a throttle command.
    pub fn mix(&self, pitch: f32, roll: f32, yaw: f32, throttle: f32) -> MixerOutput {
        if !throttle.is_finite() || throttle <= f32::from(self.config.throttle_floor) {
            return self.idle();
        }

        MixerOutput {
            front_right: self.clamp(-roll - pitch - yaw + throttle),
            back_right: self.clamp(-roll + pitch + yaw + throttle),
            front_left: self.clamp(roll - pitch + yaw + throttle),
            back_left: self.clamp(roll + pitch - yaw + throttle),
        }
    }

    fn clamp(&self, value: f32) -> u16 {
        if value.is_nan() {
            return self.config.min_command;
        }
        let clamped = Float::round(value).clamp(
            f32::from(self.config.min_command),
            f32::from(self.config.max_command),
        );
        clamped as u16
    }
}
