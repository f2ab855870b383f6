// src/types.rs

//! # Shared Data Model
//!
//! Plain data records passed between the estimator, the controllers, the
//! mixer and the scheduler. None of these types carries behavior beyond
//! small accessors; ownership rules are documented per type.

/// One raw six-axis sample as read from the inertial sensor.
///
/// Values are raw sensor counts. The timestamp is a monotonic time in
/// microseconds taken when the sample was read. A sample is immutable once
/// produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawImuSample {
    /// Angular rate around the sensor X axis, raw counts.
    pub gyro_x: i16,
    /// Angular rate around the sensor Y axis, raw counts.
    pub gyro_y: i16,
    /// Angular rate around the sensor Z axis, raw counts.
    pub gyro_z: i16,
    /// Acceleration along the sensor X axis, raw counts.
    pub accel_x: i16,
    /// Acceleration along the sensor Y axis, raw counts.
    pub accel_y: i16,
    /// Acceleration along the sensor Z axis, raw counts.
    pub accel_z: i16,
    /// Monotonic read time in microseconds.
    pub timestamp_us: u64,
}

impl RawImuSample {
    /// Creates a sample from gyro and accelerometer triples.
    pub fn new(gyro: [i16; 3], accel: [i16; 3], timestamp_us: u64) -> Self {
        Self {
            gyro_x: gyro[0],
            gyro_y: gyro[1],
            gyro_z: gyro[2],
            accel_x: accel[0],
            accel_y: accel[1],
            accel_z: accel[2],
            timestamp_us,
        }
    }

    /// The six measurement axes in gyro-then-accel order.
    pub fn axes(&self) -> [i16; 6] {
        [
            self.gyro_x,
            self.gyro_y,
            self.gyro_z,
            self.accel_x,
            self.accel_y,
            self.accel_z,
        ]
    }

    /// Returns `true` when both samples carry the same value on every axis.
    ///
    /// The timestamp is ignored: a sensor that has not produced a new
    /// measurement keeps returning its latched value with a fresh read time.
    pub fn same_axes(&self, other: &RawImuSample) -> bool {
        self.axes() == other.axes()
    }
}

/// Attitude in degrees, derived from one accepted [`RawImuSample`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttitudeEstimate {
    /// Rotation about the sensor X axis, degrees.
    pub pitch: f32,
    /// Rotation about the sensor -Y axis, degrees.
    pub roll: f32,
    /// Heading, degrees. Drifts without an absolute reference.
    pub yaw: f32,
    /// Timestamp of the sample the estimate derives from.
    pub timestamp_us: u64,
}

/// Operator set points read once per control tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlTarget {
    /// Desired pitch, degrees.
    pub target_pitch: f32,
    /// Desired roll, degrees.
    pub target_roll: f32,
    /// Desired yaw relative to the captured yaw reference, degrees.
    pub target_yaw: f32,
    /// Collective throttle, percent in `[0, 100]`.
    pub throttle_percent: f32,
}

impl ControlTarget {
    /// Sets the throttle, clamping it into `[0, 100]`.
    ///
    /// A non-finite value is treated as zero throttle.
    pub fn set_throttle(&mut self, percent: f32) {
        self.throttle_percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
    }

    /// Returns the target for one axis.
    pub fn target(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Pitch => self.target_pitch,
            Axis::Roll => self.target_roll,
            Axis::Yaw => self.target_yaw,
        }
    }
}

/// One of the three controlled rotation axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    /// Rotation about the sensor X axis.
    Pitch,
    /// Rotation about the sensor -Y axis.
    Roll,
    /// Rotation about the sensor Z axis.
    Yaw,
}

impl Axis {
    /// All axes in controller order.
    pub const ALL: [Axis; 3] = [Axis::Pitch, Axis::Roll, Axis::Yaw];
}

/// Motor position on a quad-X frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Motor {
    /// Front left motor.
    FrontLeft,
    /// Front right motor.
    FrontRight,
    /// Back left motor.
    BackLeft,
    /// Back right motor.
    BackRight,
}

impl Motor {
    /// All motors in output order.
    pub const ALL: [Motor; 4] = [
        Motor::FrontLeft,
        Motor::FrontRight,
        Motor::BackLeft,
        Motor::BackRight,
    ];
}

/// Four actuator commands in pulse-width microseconds.
///
/// Recomputed every tick; never carries state between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MixerOutput {
    /// Front left command.
    pub front_left: u16,
    /// Front right command.
    pub front_right: u16,
    /// Back left command.
    pub back_left: u16,
    /// Back right command.
    pub back_right: u16,
}

impl MixerOutput {
    /// The same command on all four motors.
    pub const fn uniform(command: u16) -> Self {
        Self {
            front_left: command,
            front_right: command,
            back_left: command,
            back_right: command,
        }
    }

    /// Command for one motor.
    pub fn get(&self, motor: Motor) -> u16 {
        match motor {
            Motor::FrontLeft => self.front_left,
            Motor::FrontRight => self.front_right,
            Motor::BackLeft => self.back_left,
            Motor::BackRight => self.back_right,
        }
    }

    /// Replaces the command for one motor.
    pub fn set(&mut self, motor: Motor, command: u16) {
        match motor {
            Motor::FrontLeft => self.front_left = command,
            Motor::FrontRight => self.front_right = command,
            Motor::BackLeft => self.back_left = command,
            Motor::BackRight => self.back_right = command,
        }
    }

    /// Motor and command pairs in output order.
    pub fn commands(&self) -> [(Motor, u16); 4] {
        Motor::ALL.map(|motor| (motor, self.get(motor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that a latched sample with a new read time counts as identical.
    #[test]
    fn test_same_axes_ignores_timestamp() {
        let first = RawImuSample::new([1, 2, 3], [4, 5, 16384], 1_000);
        let latched = RawImuSample {
            timestamp_us: 3_500,
            ..first
        };
        let fresh = RawImuSample {
            gyro_z: 4,
            ..latched
        };

        assert!(first.same_axes(&latched), "Only the timestamp differs.");
        assert!(!first.same_axes(&fresh), "One axis changed.");
    }

    /// Test that throttle is clamped into the percent range.
    #[test]
    fn test_control_target_throttle_clamp() {
        let mut target = ControlTarget::default();
        target.set_throttle(150.0);
        assert_eq!(target.throttle_percent, 100.0);
        target.set_throttle(-3.0);
        assert_eq!(target.throttle_percent, 0.0);
        target.set_throttle(f32::NAN);
        assert_eq!(target.throttle_percent, 0.0);
    }

    /// Test per-motor access on the mixer output record.
    #[test]
    fn test_mixer_output_accessors() {
        let mut output = MixerOutput::uniform(1000);
        output.set(Motor::BackRight, 1500);
        assert_eq!(output.get(Motor::BackRight), 1500);
        assert_eq!(output.get(Motor::FrontLeft), 1000);
        assert_eq!(output.commands()[3], (Motor::BackRight, 1500));
    }
}
