// src/estimator.rs

//! # Attitude Estimation
//!
//! Fuses gyro and accelerometer samples into pitch, roll and yaw in degrees.
//!
//! Three fusion strategies are provided, each implementing
//! [`AttitudeEstimator`]:
//!
//! - [`ComplementaryFilter`]: integrated gyro blended toward the
//!   accelerometer tilt with fixed weights.
//! - [`KalmanEstimator`]: a two-state (angle, gyro bias) Kalman filter per
//!   tilt axis.
//! - [`MadgwickAhrs`]: quaternion gradient-descent fusion.
//!
//! [`Estimator`] owns the strategy chosen by [`EstimatorConfig`] together
//! with the unit conversion, the sensor offsets and the stale-sample guard.
//! Yaw has no absolute reference in any strategy and drifts; re-zeroing is
//! left to the caller.

pub mod complementary;
pub use complementary::*;
pub mod kalman;
pub use kalman::*;
pub mod madgwick;
pub use madgwick::*;

use crate::calibration::ImuOffsets;
use crate::error::ConfigError;
use crate::types::{AttitudeEstimate, RawImuSample};
use crate::units::{convert, ImuReading, ImuScale};

/// Pitch, roll and yaw in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EulerAngles {
    /// Rotation about sensor X.
    pub pitch: f32,
    /// Rotation about sensor -Y.
    pub roll: f32,
    /// Rotation about sensor Z.
    pub yaw: f32,
}

/// Contract shared by every fusion strategy.
pub trait AttitudeEstimator {
    /// Advances the filter by one converted sample.
    ///
    /// `dt` is in seconds and is always positive; callers substitute the
    /// nominal period for missing or degenerate steps.
    fn update(&mut self, reading: &ImuReading, dt: f32) -> EulerAngles;

    /// Returns the filter to its initial state.
    fn reset(&mut self);
}

/// Fusion strategy and its constants, picked at configuration time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EstimatorConfig {
    /// Complementary filter.
    Complementary(ComplementaryConfig),
    /// Per-axis Kalman filter.
    Kalman(KalmanConfig),
    /// Quaternion AHRS.
    Madgwick(MadgwickConfig),
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig::Kalman(KalmanConfig::default())
    }
}

impl EstimatorConfig {
    /// Checks the constants of the chosen strategy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            EstimatorConfig::Complementary(config) => config.validate(),
            EstimatorConfig::Kalman(config) => config.validate(),
            EstimatorConfig::Madgwick(config) => config.validate(),
        }
    }
}

/// The instantiated fusion strategy.
#[derive(Debug, Clone)]
pub enum FusionStrategy {
    /// Complementary filter.
    Complementary(ComplementaryFilter),
    /// Per-axis Kalman filter.
    Kalman(KalmanEstimator),
    /// Quaternion AHRS.
    Madgwick(MadgwickAhrs),
}

impl FusionStrategy {
    /// Builds the strategy described by `config`.
    pub fn new(config: &EstimatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(match *config {
            EstimatorConfig::Complementary(config) => {
                FusionStrategy::Complementary(ComplementaryFilter::new(config))
            }
            EstimatorConfig::Kalman(config) => FusionStrategy::Kalman(KalmanEstimator::new(config)),
            EstimatorConfig::Madgwick(config) => {
                FusionStrategy::Madgwick(MadgwickAhrs::new(config))
            }
        })
    }
}

impl AttitudeEstimator for FusionStrategy {
    fn update(&mut self, reading: &ImuReading, dt: f32) -> EulerAngles {
        match self {
            FusionStrategy::Complementary(filter) => filter.update(reading, dt),
            FusionStrategy::Kalman(filter) => filter.update(reading, dt),
            FusionStrategy::Madgwick(filter) => filter.update(reading, dt),
        }
    }

    fn reset(&mut self) {
        match self {
            FusionStrategy::Complementary(filter) => filter.reset(),
            FusionStrategy::Kalman(filter) => filter.reset(),
            FusionStrategy::Madgwick(filter) => filter.reset(),
        }
    }
}

/// Raw-sample front end of the attitude estimator.
///
/// Applies offsets and unit conversion, substitutes the nominal period for a
/// missing or degenerate `dt`, and ignores samples identical on every axis to
/// the last consumed one.
#[derive(Debug, Clone)]
pub struct Estimator {
    strategy: FusionStrategy,
    scale: ImuScale,
    offsets: ImuOffsets,
    nominal_dt: f32,
    last_sample: Option<RawImuSample>,
    estimate: AttitudeEstimate,
}

impl Estimator {
    /// Creates an estimator for the given strategy and sensor calibration.
    pub fn new(
        config: &EstimatorConfig,
        scale: ImuScale,
        offsets: ImuOffsets,
        nominal_dt: f32,
    ) -> Result<Self, ConfigError> {
        if !nominal_dt.is_finite() || nominal_dt <= 0.0 {
            return Err(ConfigError::InvalidTimeStep { value: nominal_dt });
        }
        Ok(Self {
            strategy: FusionStrategy::new(config)?,
            scale,
            offsets,
            nominal_dt,
            last_sample: None,
            estimate: AttitudeEstimate::default(),
        })
    }

    /// Returns `true` unless `sample` repeats the last consumed sample.
    pub fn is_new(&self, sample: &RawImuSample) -> bool {
        match &self.last_sample {
            Some(last) => !last.same_axes(sample),
            None => true,
        }
    }

    /// Consumes one raw sample and returns the resulting estimate.
    ///
    /// A stale sample returns the previous estimate unchanged.
    pub fn update(&mut self, sample: RawImuSample, dt: Option<f32>) -> AttitudeEstimate {
        if !self.is_new(&sample) {
            return self.estimate;
        }

        let dt = match dt {
            Some(dt) if dt.is_finite() && dt > 0.0 => dt,
            _ => self.nominal_dt,
        };
        let (gyro, accel) = self.offsets.apply(&sample);
        let reading = convert(gyro, accel, &self.scale);
        let angles = self.strategy.update(&reading, dt);

        self.last_sample = Some(sample);
        self.estimate = AttitudeEstimate {
            pitch: angles.pitch,
            roll: angles.roll,
            yaw: angles.yaw,
            timestamp_us: sample.timestamp_us,
        };
        self.estimate
    }

    /// The last estimate produced.
    pub fn estimate(&self) -> AttitudeEstimate {
        self.estimate
    }

    /// The last consumed sample.
    pub fn last_sample(&self) -> Option<&RawImuSample> {
        self.last_sample.as_ref()
    }

    /// Installs new offsets and resets the filter state.
    pub fn recalibrate(&mut self, offsets: ImuOffsets) {
        self.offsets = offsets;
        self.reset();
    }

    /// Clears the filter state, the estimate and the stale-sample memory.
    pub fn reset(&mut self) {
        self.strategy.reset();
        self.last_sample = None;
        self.estimate = AttitudeEstimate::default();
    }

    /// The fusion strategy in use.
    pub fn strategy(&self) -> &FusionStrategy {
        &self.strategy
    }
}
