// src/test_utils.rs

//! This module contains utilities for testing: float comparison helpers and
//! scripted stand-ins for the hardware interfaces.

use crate::error::{ActuatorError, SensorError};
use crate::interfaces::{Actuators, ImuSensor, TelemetrySink};
use crate::scheduler::TelemetryRecord;
use crate::types::{MixerOutput, Motor, RawImuSample};
use std::collections::VecDeque;

/// A constant defining the tolerance within which floating-point values
/// are considered close enough to be equal.
pub const TEST_TOLERANCE: f32 = 1e-5;

/// Checks if two floating point numbers are close enough to be considered
/// equal.
///
/// # Arguments
/// * `target` - The target value.
/// * `value` - The value to compare against the target.
///
/// # Returns
/// `true` if the absolute difference between `target` and `value` is less than
/// `TEST_TOLERANCE`, otherwise `false`.
pub fn value_close(target: f32, value: f32) -> bool {
    (target - value).abs() < TEST_TOLERANCE
}

/// Checks if two floating point numbers are not close enough to be
/// considered equal.
///
/// # Arguments
/// * `target` - The target value.
/// * `value` - The value to compare against the target.
///
/// # Returns
/// `true` if the absolute difference between `target` and `value` exceeds
/// `TEST_TOLERANCE`, otherwise `false`.
pub fn value_not_close(target: f32, value: f32) -> bool {
    TEST_TOLERANCE <= (target - value).abs()
}

/// Checks if each of the components in a vector is close enough to
/// be considered equal.
///
/// # Arguments
/// * `target` - The target vector as a tuple of three `f32` values.
/// * `value` - The vector to compare against the target.
///
/// # Returns
/// `true` if each component of `target` and `value` is close as per `value_close`,
/// otherwise `false`.
pub fn vector_close(target: (f32, f32, f32), value: (f32, f32, f32)) -> bool {
    value_close(target.0, value.0)
        && value_close(target.1, value.1)
        && value_close(target.2, value.2)
}

/// Checks if each of the components in a vector is not close enough
/// to be considered equal.
///
/// # Arguments
/// * `target` - The target vector as a tuple of three `f32` values.
/// * `value` - The vector to compare against the target.
///
/// # Returns
/// `true` if any component of `target` and `value` is not close as per `value_not_close`,
/// otherwise `false`.
pub fn vector_not_close(target: (f32, f32, f32), value: (f32, f32, f32)) -> bool {
    value_not_close(target.0, value.0)
        && value_not_close(target.1, value.1)
        && value_not_close(target.2, value.2)
}

/// A sensor that replays a script of read results.
///
/// Once the script runs out the last good sample is returned again, the way
/// real hardware keeps returning its latched value.
pub struct ScriptedSensor {
    script: VecDeque<Result<RawImuSample, SensorError>>,
    latched: Option<RawImuSample>,
    init_result: Result<(), SensorError>,
    pub initialized: bool,
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            latched: None,
            init_result: Ok(()),
            initialized: false,
        }
    }

    pub fn failing_init(error: SensorError) -> Self {
        Self {
            init_result: Err(error),
            ..Self::new()
        }
    }

    /// Queues one read result.
    pub fn push(&mut self, result: Result<RawImuSample, SensorError>) {
        self.script.push_back(result);
    }

    /// Queues a level, still sample with a unique gyro value.
    pub fn push_level(&mut self, noise: i16, timestamp_us: u64) {
        self.push(Ok(RawImuSample::new(
            [noise, 0, 0],
            [0, 0, 16384],
            timestamp_us,
        )));
    }
}

impl ImuSensor for ScriptedSensor {
    fn initialize(&mut self) -> Result<(), SensorError> {
        self.initialized = self.init_result.is_ok();
        self.init_result
    }

    fn read_raw_motion(&mut self) -> Result<RawImuSample, SensorError> {
        match self.script.pop_front() {
            Some(Ok(sample)) => {
                self.latched = Some(sample);
                Ok(sample)
            }
            Some(Err(error)) => Err(error),
            None => self.latched.ok_or(SensorError::Timeout),
        }
    }
}

/// Actuators that record every write and can be told to reject them.
pub struct RecordingActuators {
    pub writes: Vec<(Motor, u16)>,
    pub rejected: Vec<(Motor, u16)>,
    pub reject: bool,
}

impl RecordingActuators {
    pub fn new() -> Self {
        Self {
            writes: Vec::new(),
            rejected: Vec::new(),
            reject: false,
        }
    }

    /// Command most recently written to each motor.
    pub fn latest(&self) -> Option<MixerOutput> {
        let mut output = MixerOutput::default();
        for motor in Motor::ALL {
            let (_, command) = self.writes.iter().rev().find(|(m, _)| *m == motor)?;
            output.set(motor, *command);
        }
        Some(output)
    }
}

impl Actuators for RecordingActuators {
    fn write(&mut self, motor: Motor, command: u16) -> Result<(), ActuatorError> {
        if self.reject {
            self.rejected.push((motor, command));
            return Err(ActuatorError::Rejected { motor, command });
        }
        self.writes.push((motor, command));
        Ok(())
    }
}

/// Telemetry sink that keeps every record.
#[derive(Default)]
pub struct RecordingSink {
    pub records: Vec<TelemetryRecord>,
}

impl TelemetrySink for RecordingSink {
    fn publish(&mut self, record: &TelemetryRecord) {
        self.records.push(*record);
    }
}
