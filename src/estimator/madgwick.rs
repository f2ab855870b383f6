// src/estimator/madgwick.rs

//! Quaternion AHRS using Madgwick's gradient-descent correction.
//!
//! The orientation quaternion is propagated with the gyro rate in rad/s and
//! nudged toward the attitude that explains the measured gravity direction.
//! `beta` sets how hard the accelerometer pulls: smaller values trust the
//! gyro more and give a smoother but slower estimate.
//!
//! The quaternion heading wraps at ±180°. It is unwrapped into a continuous
//! yaw, so yaw behaves like the integrated gyro of the other strategies.

use super::{AttitudeEstimator, EulerAngles};
use crate::error::ConfigError;
use crate::units::{rad_to_deg, wrap_degrees, ImuReading};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Constants of the Madgwick filter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MadgwickConfig {
    /// Convergence rate of the gradient step, rad/s.
    pub beta: f32,
}

impl Default for MadgwickConfig {
    fn default() -> Self {
        Self { beta: 0.1 }
    }
}

impl MadgwickConfig {
    /// Checks that `beta` is finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(ConfigError::InvalidFilterParameter { value: self.beta });
        }
        Ok(())
    }
}

/// Madgwick AHRS state.
#[derive(Debug, Clone)]
pub struct MadgwickAhrs {
    quat: UnitQuaternion<f32>,
    beta: f32,
    // Wrapped heading of the last update and its unwrapped sum, degrees.
    heading: f32,
    yaw: f32,
}

impl MadgwickAhrs {
    /// Creates the filter at identity orientation.
    pub fn new(config: MadgwickConfig) -> Self {
        Self {
            quat: UnitQuaternion::identity(),
            beta: config.beta,
            heading: 0.0,
            yaw: 0.0,
        }
    }

    /// Current orientation.
    pub fn quaternion(&self) -> &UnitQuaternion<f32> {
        &self.quat
    }

    /// Normalized objective gradient for the measured gravity direction, or
    /// `None` when there is nothing to correct.
    fn gradient(&self, accel: &Vector3<f32>) -> Option<Quaternion<f32>> {
        let a = accel.try_normalize(f32::EPSILON)?;
        let q = self.quat.quaternion();
        let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);

        let f1 = 2.0 * (q1 * q3 - q0 * q2) - a.x;
        let f2 = 2.0 * (q0 * q1 + q2 * q3) - a.y;
        let f3 = 2.0 * (0.5 - q1 * q1 - q2 * q2) - a.z;

        let step = Quaternion::new(
            -2.0 * q2 * f1 + 2.0 * q1 * f2,
            2.0 * q3 * f1 + 2.0 * q0 * f2 - 4.0 * q1 * f3,
            -2.0 * q0 * f1 + 2.0 * q3 * f2 - 4.0 * q2 * f3,
            2.0 * q1 * f1 + 2.0 * q2 * f2,
        );
        let norm = step.norm();
        if norm > f32::EPSILON {
            Some(step / norm)
        } else {
            None
        }
    }

    fn euler(&self) -> EulerAngles {
        let (about_x, about_y, about_z) = self.quat.euler_angles();
        EulerAngles {
            pitch: rad_to_deg(about_x),
            roll: -rad_to_deg(about_y),
            yaw: rad_to_deg(about_z),
        }
    }
}

impl AttitudeEstimator for MadgwickAhrs {
    fn update(&mut self, reading: &ImuReading, dt: f32) -> EulerAngles {
        let gyro = Quaternion::from_imag(Vector3::from(reading.gyro_rads));
        let accel = Vector3::from(reading.accel);

        let q = *self.quat.quaternion();

        let mut rate = q * gyro * 0.5;
        if let Some(step) = self.gradient(&accel) {
            rate -= step * self.beta;
        }

        let integrated = q + rate * dt;
        if let Some(quat) = UnitQuaternion::try_new(integrated, f32::EPSILON) {
            self.quat = quat;
        }

        let mut angles = self.euler();
        self.yaw += wrap_degrees(angles.yaw - self.heading);
        self.heading = angles.yaw;
        angles.yaw = self.yaw;
        angles
    }

    fn reset(&mut self) {
        self.quat = UnitQuaternion::identity();
        self.heading = 0.0;
        self.yaw = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::deg_to_rad;

    fn reading(gyro_rads: [f32; 3], accel: [f32; 3]) -> ImuReading {
        ImuReading {
            pitch_rate: 0.0,
            roll_rate: 0.0,
            yaw_rate: 0.0,
            accel,
            gyro_rads,
        }
    }

    /// Test convergence to a tilt about X and about Y.
    #[test]
    fn test_madgwick_tilt_convergence() {
        let mut filter = MadgwickAhrs::new(MadgwickConfig { beta: 0.5 });
        let mut angles = EulerAngles::default();
        // 30 degrees of pitch.
        for _ in 0..4000 {
            angles = filter.update(&reading([0.0; 3], [0.0, 0.5, 0.866_025_4]), 0.0025);
        }
        assert!((angles.pitch - 30.0).abs() < 0.5);
        assert!(angles.roll.abs() < 0.5);

        filter.reset();
        // 30 degrees of roll.
        for _ in 0..4000 {
            angles = filter.update(&reading([0.0; 3], [0.5, 0.0, 0.866_025_4]), 0.0025);
        }
        assert!((angles.roll - 30.0).abs() < 0.5);
        assert!(angles.pitch.abs() < 0.5);
    }

    /// Test that heading follows the integrated yaw rate.
    #[test]
    fn test_madgwick_heading_integration() {
        let mut filter = MadgwickAhrs::new(MadgwickConfig::default());
        let rate = deg_to_rad(10.0);
        let mut angles = EulerAngles::default();
        for _ in 0..400 {
            angles = filter.update(&reading([0.0, 0.0, rate], [0.0, 0.0, 1.0]), 0.0025);
        }
        assert!((angles.yaw - 10.0).abs() < 0.1);
        assert!(angles.pitch.abs() < 0.1);
    }

    /// Test that yaw stays continuous through the ±180° heading wrap.
    #[test]
    fn test_madgwick_yaw_continuous_past_half_turn() {
        let mut filter = MadgwickAhrs::new(MadgwickConfig::default());
        let rate = deg_to_rad(100.0);
        let mut last_yaw = 0.0;
        let mut max_step: f32 = 0.0;
        // 300 degrees in 3 seconds.
        for _ in 0..1200 {
            let angles = filter.update(&reading([0.0, 0.0, rate], [0.0, 0.0, 1.0]), 0.0025);
            max_step = max_step.max((angles.yaw - last_yaw).abs());
            last_yaw = angles.yaw;
        }
        assert!(max_step < 1.0, "Yaw jumped by {}", max_step);
        assert!((last_yaw - 300.0).abs() < 1.0);

        filter.reset();
        let angles = filter.update(&reading([0.0; 3], [0.0, 0.0, 1.0]), 0.0025);
        assert!(angles.yaw.abs() < 0.1);
    }

    /// Test that a zero accelerometer vector leaves a finite estimate.
    #[test]
    fn test_madgwick_zero_accel() {
        let mut filter = MadgwickAhrs::new(MadgwickConfig::default());
        let angles = filter.update(&reading([0.1, 0.0, 0.0], [0.0; 3]), 0.0025);
        assert!(angles.pitch.is_finite() && angles.roll.is_finite() && angles.yaw.is_finite());
        assert!(angles.pitch > 0.0, "Gyro alone still integrates.");
    }
}
