// src/calibration.rs

//! # Sensor Offset Calibration
//!
//! Raw sensors carry a constant per-axis offset. Offsets are measured by
//! averaging samples while the vehicle sits level and still, then subtracted
//! from every sample before unit conversion.

use crate::types::RawImuSample;
use crate::units::ImuScale;

/// Per-axis offsets in raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImuOffsets {
    /// Gyro offsets `[x, y, z]`.
    pub gyro: [f32; 3],
    /// Accelerometer offsets `[x, y, z]`.
    pub accel: [f32; 3],
}

impl ImuOffsets {
    /// Subtracts the offsets from a raw sample, returning `(gyro, accel)` counts.
    pub fn apply(&self, sample: &RawImuSample) -> ([f32; 3], [f32; 3]) {
        let gyro = [
            f32::from(sample.gyro_x) - self.gyro[0],
            f32::from(sample.gyro_y) - self.gyro[1],
            f32::from(sample.gyro_z) - self.gyro[2],
        ];
        let accel = [
            f32::from(sample.accel_x) - self.accel[0],
            f32::from(sample.accel_y) - self.accel[1],
            f32::from(sample.accel_z) - self.accel[2],
        ];
        (gyro, accel)
    }
}

/// Accumulates stationary samples into [`ImuOffsets`].
///
/// The vehicle must be level: the accelerometer Z offset is computed so that
/// the corrected Z axis still reads one g.
#[derive(Debug, Clone)]
pub struct GyroCalibrator {
    gyro_sum: [i64; 3],
    accel_sum: [i64; 3],
    count: u32,
    required: u32,
    one_g: f32,
}

impl GyroCalibrator {
    /// Creates a calibrator that completes after `required` samples.
    ///
    /// A request for zero samples is treated as one.
    pub fn new(required: u32, scale: &ImuScale) -> Self {
        Self {
            gyro_sum: [0; 3],
            accel_sum: [0; 3],
            count: 0,
            required: required.max(1),
            one_g: scale.accel_lsb_per_g,
        }
    }

    /// Number of samples accumulated so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Adds one sample. Returns the offsets once enough samples were seen.
    pub fn push(&mut self, sample: &RawImuSample) -> Option<ImuOffsets> {
        let axes = sample.axes();
        for i in 0..3 {
            self.gyro_sum[i] += i64::from(axes[i]);
            self.accel_sum[i] += i64::from(axes[i + 3]);
        }
        self.count += 1;

        if self.count < self.required {
            return None;
        }

        let n = self.count as f32;
        let mut offsets = ImuOffsets {
            gyro: self.gyro_sum.map(|sum| sum as f32 / n),
            accel: self.accel_sum.map(|sum| sum as f32 / n),
        };
        offsets.accel[2] -= self.one_g;
        Some(offsets)
    }

    /// Discards accumulated samples.
    pub fn reset(&mut self) {
        self.gyro_sum = [0; 3];
        self.accel_sum = [0; 3];
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    /// Test that offsets are the per-axis average with one g kept on Z.
    #[test]
    fn test_calibrator_average() {
        let scale = ImuScale::default();
        let mut calibrator = GyroCalibrator::new(2, &scale);

        let first = RawImuSample::new([10, -20, 4], [100, -50, 16400], 0);
        let second = RawImuSample::new([12, -22, 6], [102, -52, 16402], 2_500);

        assert_eq!(calibrator.push(&first), None);
        let offsets = calibrator.push(&second).expect("calibration completes");

        assert!(vector_close((11.0, -21.0, 5.0), offsets.gyro.into()));
        assert!(vector_not_close((0.0, 0.0, 0.0), offsets.gyro.into()));
        assert!(vector_close((101.0, -51.0, 17.0), offsets.accel.into()));
    }

    /// Test that applying offsets removes the bias from a raw sample.
    #[test]
    fn test_offsets_apply() {
        let offsets = ImuOffsets {
            gyro: [11.0, -21.0, 5.0],
            accel: [101.0, -51.0, 17.0],
        };
        let sample = RawImuSample::new([11, -21, 5], [101, -51, 16401], 0);
        let (gyro, accel) = offsets.apply(&sample);

        assert!(vector_close((0.0, 0.0, 0.0), gyro.into()));
        assert!(vector_close((0.0, 0.0, 16384.0), accel.into()));
    }
}
