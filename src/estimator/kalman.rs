// src/estimator/kalman.rs

//! Per-axis Kalman filter.
//!
//! Each tilt axis tracks the state `[angle, gyro_bias]` with a 2x2 error
//! covariance. The gyro rate drives the prediction and the accelerometer
//! tilt is the measurement. Yaw is not observable from the accelerometer
//! and is integrated from the gyro alone.

use super::{AttitudeEstimator, EulerAngles};
use crate::error::ConfigError;
use crate::units::ImuReading;
use nalgebra::{Matrix2, Vector2};

/// Noise constants of the Kalman filter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KalmanConfig {
    /// Process noise of the angle.
    pub q_angle: f32,
    /// Process noise of the gyro bias.
    pub q_bias: f32,
    /// Measurement noise of the accelerometer angle.
    pub r_measure: f32,
    /// Added to the yaw rate to cancel a known platform bias, deg/s.
    pub yaw_drift_dps: f32,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            q_angle: 0.001,
            q_bias: 0.003,
            r_measure: 0.0003,
            yaw_drift_dps: 0.0,
        }
    }
}

impl KalmanConfig {
    /// Checks that every noise term is finite and positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for value in [self.q_angle, self.q_bias, self.r_measure] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidFilterParameter { value });
            }
        }
        if !self.yaw_drift_dps.is_finite() {
            return Err(ConfigError::InvalidFilterParameter {
                value: self.yaw_drift_dps,
            });
        }
        Ok(())
    }
}

/// Kalman filter for one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanAxis {
    /// `[angle, bias]`, degrees and deg/s.
    state: Vector2<f32>,
    /// Error covariance.
    p: Matrix2<f32>,
    q_angle: f32,
    q_bias: f32,
    r_measure: f32,
}

impl KalmanAxis {
    /// Creates a filter at zero angle and bias with zero covariance.
    pub fn new(config: &KalmanConfig) -> Self {
        Self {
            state: Vector2::zeros(),
            p: Matrix2::zeros(),
            q_angle: config.q_angle,
            q_bias: config.q_bias,
            r_measure: config.r_measure,
        }
    }

    /// Runs one predict/correct cycle and returns the angle.
    ///
    /// `measured_angle` is in degrees, `rate` in deg/s, `dt` in seconds.
    pub fn update(&mut self, measured_angle: f32, rate: f32, dt: f32) -> f32 {
        // Predict
        let unbiased_rate = rate - self.state[1];
        self.state[0] += unbiased_rate * dt;

        let transition = Matrix2::new(1.0, -dt, 0.0, 1.0);
        let process_noise = Matrix2::new(self.q_angle, 0.0, 0.0, self.q_bias) * dt;
        self.p = transition * self.p * transition.transpose() + process_noise;

        // Correct
        let innovation_covariance = self.p[(0, 0)] + self.r_measure;
        let gain = Vector2::new(self.p[(0, 0)], self.p[(1, 0)]) / innovation_covariance;
        let innovation = measured_angle - self.state[0];

        self.state += gain * innovation;
        let first_row = self.p.row(0).into_owned();
        self.p -= gain * first_row;

        self.state[0]
    }

    /// Estimated angle, degrees.
    pub fn angle(&self) -> f32 {
        self.state[0]
    }

    /// Estimated gyro bias, deg/s.
    pub fn bias(&self) -> f32 {
        self.state[1]
    }

    /// Error covariance.
    pub fn covariance(&self) -> &Matrix2<f32> {
        &self.p
    }

    /// Clears the state and the covariance.
    pub fn reset(&mut self) {
        self.state = Vector2::zeros();
        self.p = Matrix2::zeros();
    }
}

/// Kalman filters for pitch and roll plus integrated yaw.
#[derive(Debug, Clone)]
pub struct KalmanEstimator {
    pitch: KalmanAxis,
    roll: KalmanAxis,
    yaw: f32,
    yaw_drift_dps: f32,
}

impl KalmanEstimator {
    /// Creates the estimator at level attitude.
    pub fn new(config: KalmanConfig) -> Self {
        Self {
            pitch: KalmanAxis::new(&config),
            roll: KalmanAxis::new(&config),
            yaw: 0.0,
            yaw_drift_dps: config.yaw_drift_dps,
        }
    }

    /// Pitch axis filter.
    pub fn pitch_axis(&self) -> &KalmanAxis {
        &self.pitch
    }

    /// Roll axis filter.
    pub fn roll_axis(&self) -> &KalmanAxis {
        &self.roll
    }
}

impl AttitudeEstimator for KalmanEstimator {
    fn update(&mut self, reading: &ImuReading, dt: f32) -> EulerAngles {
        let pitch = self
            .pitch
            .update(reading.accel_pitch(), reading.pitch_rate, dt);
        let roll = self.roll.update(reading.accel_roll(), reading.roll_rate, dt);
        self.yaw += (reading.yaw_rate + self.yaw_drift_dps) * dt;

        EulerAngles {
            pitch,
            roll,
            yaw: self.yaw,
        }
    }

    fn reset(&mut self) {
        self.pitch.reset();
        self.roll.reset();
        self.yaw = 0.0;
    }
}
