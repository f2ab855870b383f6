// src/units.rs

//! # Unit Conversion
//!
//! Pure functions mapping raw sensor counts to physical units. No state.
//!
//! Gyro counts become degrees per second by dividing by the sensitivity of the
//! configured full-scale range, accelerometer counts become g the same way.
//! Accelerometer tilt angles come from `atan2` of two orthogonal axes.

use num_traits::Float;

/// Gyro sensitivity for the ±2000 deg/s range, LSB per deg/s.
pub const GYRO_LSB_PER_DPS_2000: f32 = 16.4;
/// Gyro sensitivity for the ±250 deg/s range, LSB per deg/s.
pub const GYRO_LSB_PER_DPS_250: f32 = 131.0;
/// Accelerometer sensitivity for the ±2 g range, LSB per g.
pub const ACCEL_LSB_PER_G_2: f32 = 16384.0;

/// Sensitivities of the configured sensor ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImuScale {
    /// Gyro counts per deg/s.
    pub gyro_lsb_per_dps: f32,
    /// Accelerometer counts per g.
    pub accel_lsb_per_g: f32,
}

impl Default for ImuScale {
    fn default() -> Self {
        Self {
            gyro_lsb_per_dps: GYRO_LSB_PER_DPS_2000,
            accel_lsb_per_g: ACCEL_LSB_PER_G_2,
        }
    }
}

/// Converts radians to degrees.
pub fn rad_to_deg(radians: f32) -> f32 {
    Float::to_degrees(radians)
}

/// Converts degrees to radians.
pub fn deg_to_rad(degrees: f32) -> f32 {
    Float::to_radians(degrees)
}

/// Wraps an angle in degrees into `(-180, 180]`.
pub fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees - 360.0 * Float::floor((degrees + 180.0) / 360.0);
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Converts raw gyro counts to deg/s.
pub fn gyro_to_dps(raw: f32, scale: &ImuScale) -> f32 {
    raw / scale.gyro_lsb_per_dps
}

/// Converts raw gyro counts to rad/s.
pub fn gyro_to_rads(raw: f32, scale: &ImuScale) -> f32 {
    deg_to_rad(gyro_to_dps(raw, scale))
}

/// Converts raw accelerometer counts to g.
pub fn accel_to_g(raw: f32, scale: &ImuScale) -> f32 {
    raw / scale.accel_lsb_per_g
}

/// Tilt angle in degrees from two orthogonal accelerometer axes.
///
/// Rotating about one axis moves gravity onto the axis orthogonal to it, so
/// `accel_angle_deg(accel_y, accel_z)` is the rotation about X.
pub fn accel_angle_deg(a: f32, b: f32) -> f32 {
    rad_to_deg(Float::atan2(a, b))
}

/// One sample in physical units, in the estimator axis convention.
///
/// Pitch is rotation about sensor X, roll is rotation about sensor -Y, yaw is
/// rotation about Z. Rates are deg/s, accelerations are g in the sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuReading {
    /// Pitch rate, deg/s.
    pub pitch_rate: f32,
    /// Roll rate, deg/s.
    pub roll_rate: f32,
    /// Yaw rate, deg/s.
    pub yaw_rate: f32,
    /// Sensor-frame acceleration `[x, y, z]`, g.
    pub accel: [f32; 3],
    /// Sensor-frame angular rate `[x, y, z]`, rad/s.
    pub gyro_rads: [f32; 3],
}

impl ImuReading {
    /// Pitch from gravity, degrees.
    pub fn accel_pitch(&self) -> f32 {
        accel_angle_deg(self.accel[1], self.accel[2])
    }

    /// Roll from gravity, degrees.
    pub fn accel_roll(&self) -> f32 {
        accel_angle_deg(self.accel[0], self.accel[2])
    }

    /// Sum of absolute accelerations, a cheap stand-in for the magnitude.
    pub fn accel_abs_sum(&self) -> f32 {
        Float::abs(self.accel[0]) + Float::abs(self.accel[1]) + Float::abs(self.accel[2])
    }
}

/// Converts offset-corrected raw counts into an [`ImuReading`].
pub fn convert(gyro: [f32; 3], accel: [f32; 3], scale: &ImuScale) -> ImuReading {
    let dps = gyro.map(|raw| gyro_to_dps(raw, scale));
    ImuReading {
        pitch_rate: dps[0],
        roll_rate: -dps[1],
        yaw_rate: dps[2],
        accel: accel.map(|raw| accel_to_g(raw, scale)),
        gyro_rads: dps.map(deg_to_rad),
    }
}
