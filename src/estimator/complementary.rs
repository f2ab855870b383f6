// src/estimator/complementary.rs

//! Complementary filter.
//!
//! The gyro rate is integrated into the running angle, which is then pulled
//! toward the accelerometer tilt whenever the accelerometer looks like it is
//! measuring gravity alone.

use super::{AttitudeEstimator, EulerAngles};
use crate::error::ConfigError;
use crate::units::ImuReading;

/// Constants of the complementary filter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComplementaryConfig {
    /// Weight of the integrated gyro angle; the accelerometer gets the rest.
    pub gyro_weight: f32,
    /// Smallest accepted sum of absolute accelerations, g.
    pub accel_band_low: f32,
    /// Largest accepted sum of absolute accelerations, g.
    pub accel_band_high: f32,
    /// Added to the yaw rate to cancel a known platform bias, deg/s.
    pub yaw_drift_dps: f32,
}

impl Default for ComplementaryConfig {
    fn default() -> Self {
        Self {
            gyro_weight: 0.97,
            accel_band_low: 0.5,
            accel_band_high: 2.0,
            yaw_drift_dps: 0.0,
        }
    }
}

impl ComplementaryConfig {
    /// Checks the weight, the band and the drift rate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gyro_weight > 0.0 && self.gyro_weight <= 1.0) {
            return Err(ConfigError::InvalidFilterParameter {
                value: self.gyro_weight,
            });
        }
        if !self.accel_band_low.is_finite()
            || !self.accel_band_high.is_finite()
            || self.accel_band_low >= self.accel_band_high
        {
            return Err(ConfigError::InvalidAccelBand {
                low: self.accel_band_low,
                high: self.accel_band_high,
            });
        }
        if !self.yaw_drift_dps.is_finite() {
            return Err(ConfigError::InvalidFilterParameter {
                value: self.yaw_drift_dps,
            });
        }
        Ok(())
    }
}

/// Complementary filter state.
#[derive(Debug, Clone)]
pub struct ComplementaryFilter {
    config: ComplementaryConfig,
    angles: EulerAngles,
}

impl ComplementaryFilter {
    /// Creates a filter at level attitude.
    pub fn new(config: ComplementaryConfig) -> Self {
        Self {
            config,
            angles: EulerAngles::default(),
        }
    }

    fn accel_trusted(&self, reading: &ImuReading) -> bool {
        let magnitude = reading.accel_abs_sum();
        magnitude > self.config.accel_band_low && magnitude < self.config.accel_band_high
    }
}

impl AttitudeEstimator for ComplementaryFilter {
    fn update(&mut self, reading: &ImuReading, dt: f32) -> EulerAngles {
        let mut pitch = self.angles.pitch + reading.pitch_rate * dt;
        let mut roll = self.angles.roll + reading.roll_rate * dt;

        if self.accel_trusted(reading) {
            let accel_weight = 1.0 - self.config.gyro_weight;
            pitch = pitch * self.config.gyro_weight + reading.accel_pitch() * accel_weight;
            roll = roll * self.config.gyro_weight + reading.accel_roll() * accel_weight;
        }

        self.angles = EulerAngles {
            pitch,
            roll,
            yaw: self.angles.yaw + (reading.yaw_rate + self.config.yaw_drift_dps) * dt,
        };
        self.angles
    }

    fn reset(&mut self) {
        self.angles = EulerAngles::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn reading(rates: [f32; 3], accel: [f32; 3]) -> ImuReading {
        ImuReading {
            pitch_rate: rates[0],
            roll_rate: rates[1],
            yaw_rate: rates[2],
            accel,
            gyro_rads: [0.0; 3],
        }
    }

    /// Test the blend of one update from level.
    #[test]
    fn test_complementary_blend() {
        let mut filter = ComplementaryFilter::new(ComplementaryConfig::default());
        // 45 degree accelerometer pitch, 10 deg/s gyro pitch rate.
        let angles = filter.update(&reading([10.0, 0.0, 0.0], [0.0, 0.7, 0.7]), 0.1);
        assert!(value_close(0.97 * 1.0 + 0.03 * 45.0, angles.pitch));
        assert!(value_close(0.0, angles.roll));
    }

    /// Test that a shock-loaded accelerometer is ignored.
    #[test]
    fn test_complementary_rejects_out_of_band_accel() {
        let mut filter = ComplementaryFilter::new(ComplementaryConfig::default());
        let angles = filter.update(&reading([0.0, 10.0, 0.0], [3.0, 0.0, 3.0]), 0.1);
        assert!(value_close(1.0, angles.roll), "Gyro only.");

        let angles = filter.update(&reading([0.0, 0.0, 0.0], [0.0, 0.0, 0.1]), 0.1);
        assert!(value_close(1.0, angles.roll), "Free fall is ignored too.");
    }

    /// Test that yaw integrates the gyro plus the drift compensation.
    #[test]
    fn test_complementary_yaw_drift() {
        let config = ComplementaryConfig {
            yaw_drift_dps: 2.0,
            ..ComplementaryConfig::default()
        };
        let mut filter = ComplementaryFilter::new(config);
        let mut angles = EulerAngles::default();
        for _ in 0..10 {
            angles = filter.update(&reading([0.0, 0.0, -2.0], [0.0, 0.0, 1.0]), 0.1);
        }
        assert!(value_close(0.0, angles.yaw), "Drift term cancels the bias.");

        filter.reset();
        let angles = filter.update(&reading([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]), 0.5);
        assert!(value_close(1.0, angles.yaw));
    }

    /// Test that the filter settles on a constant tilt.
    #[test]
    fn test_complementary_converges() {
        let mut filter = ComplementaryFilter::new(ComplementaryConfig::default());
        let mut angles = EulerAngles::default();
        for _ in 0..1000 {
            angles = filter.update(&reading([0.0; 3], [0.5, 0.0, 0.866_025_4]), 0.0025);
        }
        assert!((angles.roll - 30.0).abs() < 0.01);
    }

    /// Test config validation.
    #[test]
    fn test_complementary_config_validate() {
        let mut config = ComplementaryConfig::default();
        assert!(config.validate().is_ok());
        config.accel_band_low = 3.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAccelBand { .. })
        ));
        config = ComplementaryConfig {
            gyro_weight: 1.5,
            ..ComplementaryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
