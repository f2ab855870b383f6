// src/pid/axis.rs

//! # Axis PID Control Module
//!
//! This module provides a compute function and control data structure to
//! perform attitude PID (Proportional-Integral-Derivative) control for one
//! rotation axis, and [`AxisPid`], the stateful controller that owns the
//! accumulated integral, the previous error and the live gains.
//!
//! Error inside the deadband is treated as exactly zero and therefore never
//! accumulates into the integral. The integral is clamped to
//! `[-integral_limit, integral_limit]` after every update.

use super::OutputShaping;
use crate::error::ConfigError;
use num_traits::Float;
use piddiy::PidController;

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f32,
    /// Integral gain.
    pub ki: f32,
    /// Derivative gain.
    pub kd: f32,
}

impl PidGains {
    /// Creates a gain set.
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }

    /// Checks that every gain is a finite number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for value in [self.kp, self.ki, self.kd] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidGain { value });
            }
        }
        Ok(())
    }
}

/// Configuration of one axis controller.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidConfig {
    /// Initial gains.
    pub gains: PidGains,
    /// Upper limit for the integral term to prevent windup.
    pub integral_limit: f32,
    /// Half width of the zero-error band.
    pub deadband: f32,
    /// Transfer function applied to the output.
    pub output: OutputShaping,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            gains: PidGains::new(0.1, 0.0, 0.0),
            integral_limit: 1000.0,
            deadband: 0.5,
            output: OutputShaping::default(),
        }
    }
}

impl PidConfig {
    /// Checks gains, limits and output shaping.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gains.validate()?;
        if !self.integral_limit.is_finite() || self.integral_limit <= 0.0 {
            return Err(ConfigError::InvalidIntegralLimit {
                value: self.integral_limit,
            });
        }
        if !self.deadband.is_finite() || self.deadband < 0.0 {
            return Err(ConfigError::InvalidDeadband {
                value: self.deadband,
            });
        }
        self.output.validate()
    }
}

/// Control data for the axis PID compute callback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisControlData {
    /// The measured angle.
    pub measurement: f32,
    /// The time delta since the last computation. Must be positive.
    pub dt: f32,
    /// Errors with a magnitude below this value count as zero.
    pub deadband: f32,
    /// The maximum allowed value for the integral term, used to prevent integral windup.
    pub integral_limit: f32,
}

/// Axis PID compute callback.
///
/// Returns `(error, integral, derivative)`; the controller combines them with
/// its gains.
pub fn compute_axis(
    pid: &mut PidController<f32, AxisControlData>,
    data: AxisControlData,
) -> (f32, f32, f32) {
    let mut error = pid.set_point - data.measurement;
    if Float::abs(error) < data.deadband {
        error = 0.0;
    }
    let integral =
        (pid.integral + error * data.dt).clamp(-data.integral_limit, data.integral_limit);
    let derivative = (error - pid.error) / data.dt;

    (error, integral, derivative)
}

/// Weighted contributions of the last update, for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidTerms {
    /// `kp * error`.
    pub p: f32,
    /// `ki * integral`.
    pub i: f32,
    /// `kd * derivative`.
    pub d: f32,
}

/// Snapshot of a controller's persistent state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidState {
    /// Gains in effect.
    pub gains: PidGains,
    /// Accumulated `error * dt`.
    pub integral_accumulator: f32,
    /// Error of the last update.
    pub last_error: f32,
    /// Timestamp passed to the last [`AxisPid::update_at`] call.
    pub last_update_us: Option<u64>,
    /// Bound on the magnitude of the integral accumulator.
    pub integral_limit: f32,
}

/// Closed-loop controller for one rotation axis.
pub struct AxisPid {
    pid: PidController<f32, AxisControlData>,
    config: PidConfig,
    nominal_dt: f32,
    terms: PidTerms,
    last_update_us: Option<u64>,
    invalid_outputs: u32,
}

impl AxisPid {
    /// Creates a controller with a zero target.
    ///
    /// `nominal_dt` replaces a zero, negative or non-finite time step.
    pub fn new(config: PidConfig, nominal_dt: f32) -> Result<Self, ConfigError> {
        config.validate()?;
        if !nominal_dt.is_finite() || nominal_dt <= 0.0 {
            return Err(ConfigError::InvalidTimeStep { value: nominal_dt });
        }

        let mut pid = PidController::new();
        pid.compute_fn(compute_axis)
            .set_point(0.0)
            .kp(config.gains.kp)
            .ki(config.gains.ki)
            .kd(config.gains.kd);

        Ok(AxisPid {
            pid,
            config,
            nominal_dt,
            terms: PidTerms::default(),
            last_update_us: None,
            invalid_outputs: 0,
        })
    }

    /// Sets the desired angle.
    pub fn set_target(&mut self, target: f32) {
        self.pid.set_point(target);
    }

    /// The desired angle.
    pub fn target(&self) -> f32 {
        self.pid.set_point
    }

    /// Gains in effect.
    pub fn gains(&self) -> PidGains {
        self.config.gains
    }

    /// Replaces the gains. Takes effect on the next update; accumulated state
    /// is kept as is.
    pub fn set_gains(&mut self, gains: PidGains) -> Result<(), ConfigError> {
        gains.validate()?;
        self.config.gains = gains;
        self.pid.kp(gains.kp).ki(gains.ki).kd(gains.kd);
        Ok(())
    }

    /// Runs one control step and returns the shaped output.
    ///
    /// A non-finite result is never returned: it is counted, logged, the
    /// accumulated state is cleared and zero is returned instead.
    pub fn update(&mut self, measured: f32, dt: f32) -> f32 {
        let dt = if dt.is_finite() && dt > 0.0 {
            dt
        } else {
            self.nominal_dt
        };

        let previous_error = self.pid.error;
        let data = AxisControlData {
            measurement: measured,
            dt,
            deadband: self.config.deadband,
            integral_limit: self.config.integral_limit,
        };
        let raw = self.pid.compute(data);

        if !raw.is_finite() {
            self.invalid_outputs = self.invalid_outputs.saturating_add(1);
            log_warn!(
                "invalid PID output for measurement {}, substituting zero",
                measured
            );
            self.clear_accumulators();
            self.terms = PidTerms::default();
            return 0.0;
        }

        let gains = self.config.gains;
        let derivative = (self.pid.error - previous_error) / dt;
        self.terms = PidTerms {
            p: gains.kp * self.pid.error,
            i: gains.ki * self.pid.integral,
            d: gains.kd * derivative,
        };

        self.config.output.apply(raw)
    }

    /// Runs one control step with dt derived from the previous call's
    /// timestamp. The first call after creation or reset uses the nominal
    /// period.
    pub fn update_at(&mut self, measured: f32, timestamp_us: u64) -> f32 {
        let dt = match self.last_update_us {
            Some(last) if timestamp_us > last => (timestamp_us - last) as f32 / 1_000_000.0,
            _ => self.nominal_dt,
        };
        self.last_update_us = Some(timestamp_us);
        self.update(measured, dt)
    }

    /// Clears the integral, the previous error and the last update time.
    pub fn reset(&mut self) {
        self.clear_accumulators();
        self.last_update_us = None;
        self.terms = PidTerms::default();
    }

    /// Contributions of the last update.
    pub fn terms(&self) -> PidTerms {
        self.terms
    }

    /// Number of non-finite outputs replaced by zero.
    pub fn invalid_outputs(&self) -> u32 {
        self.invalid_outputs
    }

    /// Snapshot of the persistent state.
    pub fn state(&self) -> PidState {
        PidState {
            gains: self.config.gains,
            integral_accumulator: self.pid.integral,
            last_error: self.pid.error,
            last_update_us: self.last_update_us,
            integral_limit: self.config.integral_limit,
        }
    }

    fn clear_accumulators(&mut self) {
        self.pid.integral = 0.0;
        self.pid.error = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn data(measurement: f32, dt: f32) -> AxisControlData {
        AxisControlData {
            measurement,
            dt,
            deadband: 0.5,
            integral_limit: 100.0,
        }
    }

    fn controller(kp: f32, ki: f32, kd: f32) -> AxisPid {
        let config = PidConfig {
            gains: PidGains::new(kp, ki, kd),
            integral_limit: 100.0,
            deadband: 0.5,
            output: OutputShaping::Identity,
        };
        AxisPid::new(config, 0.0025).expect("valid config")
    }

    /// Test that the integral term is clamped to the specified limit.
    #[test]
    fn test_pid_axis_integral_clamping() {
        let mut pid = PidController::new();
        pid.compute_fn(compute_axis)
            .set_point(50.0)
            .kp(1.0)
            .ki(5.0)
            .kd(0.1);

        // This would normally push integral way over 100 if not clamped
        for _ in 0..10 {
            let _ = pid.compute(data(0.0, 1.0));
        }

        let (_, integral, _) = compute_axis(&mut pid, data(0.0, 1.0));
        assert!(
            value_close(100.0, integral),
            "Integral should be clamped to 100."
        );
    }

    /// Test that error inside the deadband is zero and does not accumulate.
    #[test]
    fn test_pid_axis_deadband() {
        let mut pid = PidController::new();
        pid.compute_fn(compute_axis)
            .set_point(10.0)
            .kp(1.0)
            .ki(1.0)
            .kd(0.0);

        let _ = pid.compute(data(0.0, 1.0));
        let (error, integral, derivative) = compute_axis(&mut pid, data(9.7, 1.0));

        assert!(value_close(0.0, error), "Error inside deadband is zero.");
        assert!(
            value_close(10.0, integral),
            "Integral should not grow inside the deadband."
        );
        assert!(
            value_close(-10.0, derivative),
            "Derivative sees the error drop to zero."
        );
    }

    /// Test the proportional-only scenario: kp=1, target=10, measured=0, dt=1.
    #[test]
    fn test_pid_axis_proportional_output() {
        let mut pid = controller(1.0, 0.0, 0.0);
        pid.set_target(10.0);
        let output = pid.update(0.0, 1.0);
        assert_eq!(10.0, output, "Output should be exactly kp * error.");
    }

    /// Test PID response with non-zero set point and zero measurement.
    #[test]
    fn test_pid_axis_response() {
        let mut pid = controller(1.0, 1.0, 1.0);
        pid.set_target(10.0);

        let output = pid.update(0.0, 1.0);
        assert!(
            value_close(30.0, output),
            "Output should be the sum of terms."
        );
        let terms = pid.terms();
        assert!(value_close(10.0, terms.p));
        assert!(value_close(10.0, terms.i));
        assert!(value_close(10.0, terms.d));

        // Call again to test accumulation
        let output = pid.update(0.0, 1.0);
        assert!(
            value_close(30.0, output),
            "Integral grows while derivative drops to zero."
        );
        assert!(value_close(20.0, pid.state().integral_accumulator));
        assert!(value_close(0.0, pid.terms().d));
    }

    /// Test that the integral contribution is frozen while inside the deadband.
    #[test]
    fn test_pid_axis_deadband_holds_integral_contribution() {
        let mut pid = controller(1.0, 0.5, 0.0);
        pid.set_target(5.0);
        let _ = pid.update(0.0, 0.1);
        let held = pid.terms().i;

        for measured in [4.6, 5.3, 4.9, 5.0, 5.49] {
            let _ = pid.update(measured, 0.1);
            assert!(
                value_close(held, pid.terms().i),
                "Integral contribution must not change inside the deadband."
            );
        }
    }

    /// Test that the integral invariant holds for arbitrary error sequences.
    #[test]
    fn test_pid_axis_integral_bound_invariant() {
        let mut pid = controller(0.3, 4.0, 0.1);
        pid.set_target(0.0);
        for step in 0..500u32 {
            let measured = ((step * 37) % 200) as f32 - 100.0;
            let dt = 0.001 + (step % 7) as f32 * 0.3;
            let _ = pid.update(measured, dt);
            let state = pid.state();
            assert!(
                state.integral_accumulator.abs() <= state.integral_limit,
                "Integral must stay within the limit."
            );
        }
    }

    /// Test that a zero dt is replaced by the nominal period.
    #[test]
    fn test_pid_axis_zero_dt_uses_nominal() {
        let mut pid = controller(0.0, 1.0, 1.0);
        pid.set_target(10.0);
        let output = pid.update(0.0, 0.0);
        assert!(output.is_finite(), "Zero dt must not produce a non-number.");
        assert!(value_close(0.025, pid.state().integral_accumulator));
    }

    /// Test that a non-finite result is replaced by zero and counted.
    #[test]
    fn test_pid_axis_invalid_output_substituted() {
        let mut pid = controller(1.0, 1.0, 0.0);
        pid.set_target(10.0);
        let _ = pid.update(0.0, 1.0);

        let output = pid.update(f32::NAN, 1.0);
        assert_eq!(0.0, output);
        assert_eq!(1, pid.invalid_outputs());
        assert_eq!(0.0, pid.state().integral_accumulator);

        let output = pid.update(0.0, 1.0);
        assert!(value_close(20.0, output), "Controller recovers afterwards.");
    }

    /// Test that reset clears the accumulated state and the update time.
    #[test]
    fn test_pid_axis_reset() {
        let mut pid = controller(1.0, 1.0, 0.0);
        pid.set_target(10.0);
        let _ = pid.update_at(0.0, 1_000);
        let _ = pid.update_at(0.0, 2_000);
        assert_eq!(Some(2_000), pid.state().last_update_us);

        pid.reset();
        let state = pid.state();
        assert_eq!(0.0, state.integral_accumulator);
        assert_eq!(0.0, state.last_error);
        assert_eq!(None, state.last_update_us);
        assert!(value_close(10.0, pid.target()), "Target survives reset.");
    }

    /// Test that update_at derives dt from consecutive timestamps.
    #[test]
    fn test_pid_axis_update_at_dt() {
        let mut pid = controller(0.0, 1.0, 0.0);
        pid.set_target(10.0);
        let _ = pid.update_at(0.0, 10_000);
        assert!(value_close(0.025, pid.state().integral_accumulator));
        let _ = pid.update_at(0.0, 20_000);
        assert!(value_close(0.125, pid.state().integral_accumulator));
    }

    /// Test that new gains apply from the next update without touching the integral.
    #[test]
    fn test_pid_axis_live_gain_update() {
        let mut pid = controller(1.0, 1.0, 0.0);
        pid.set_target(10.0);
        let _ = pid.update(0.0, 1.0);

        pid.set_gains(PidGains::new(2.0, 0.0, 0.0))
            .expect("finite gains");
        assert!(value_close(10.0, pid.state().integral_accumulator));

        let output = pid.update(0.0, 1.0);
        assert!(value_close(20.0, output));
        assert!(pid.set_gains(PidGains::new(f32::INFINITY, 0.0, 0.0)).is_err());
        assert_eq!(PidGains::new(2.0, 0.0, 0.0), pid.gains());
    }
}
