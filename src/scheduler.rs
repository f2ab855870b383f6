// src/scheduler.rs

//! # Control Scheduler
//!
//! The fixed-period driver of the control core. Each call to
//! [`ControlScheduler::tick`]:
//!
//! 1. applies the [`PendingCommands`] merged since the last tick, as a whole;
//! 2. advances the arming sequence by at most one state;
//! 3. reads one sample, and when it differs from the last consumed sample
//!    runs the estimator, the three axis controllers and the mixer;
//! 4. writes the arming command, or when armed the mixer output, to the
//!    actuators;
//! 5. updates the rate counters and publishes telemetry when due.
//!
//! The tick takes `&mut self`, so two ticks can never run at once. Only the
//! [`CommandChannel`] is shared with other contexts.

pub mod command;
pub use command::*;
pub mod stats;
pub use stats::*;
pub mod telemetry;
pub use telemetry::*;

use crate::arming::{ArmingMachine, ArmingState};
use crate::calibration::ImuOffsets;
use crate::config::{FlightConfig, MountingConfig, SchedulerConfig};
use crate::error::{ConfigError, FaultReason, SensorError};
use crate::estimator::Estimator;
use crate::interfaces::{Actuators, ImuSensor, TelemetrySink};
use crate::mixer::MotorMixer;
use crate::pid::AxisPid;
use crate::types::{AttitudeEstimate, Axis, ControlTarget, MixerOutput};

/// What happened to the sensor sample of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleOutcome {
    /// A new sample was fused and the controllers ran.
    Fresh,
    /// The sample repeated the last one; fusion and control were skipped.
    Stale,
    /// The sensor read failed.
    Failed(SensorError),
}

/// Summary of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Sensor sample outcome.
    pub sample: SampleOutcome,
    /// Number of command updates merged into what the tick applied.
    pub commands_applied: usize,
    /// Arming state after the tick.
    pub arming: ArmingState,
    /// Commands written to the actuators, if any.
    pub written: Option<MixerOutput>,
}

/// Owns the control state and drives it from the sensor to the actuators.
pub struct ControlScheduler<'a, S, A, T = ()> {
    sensor: S,
    actuators: A,
    telemetry: T,
    commands: &'a CommandChannel,
    estimator: Estimator,
    pitch: AxisPid,
    roll: AxisPid,
    yaw: AxisPid,
    mixer: MotorMixer,
    arming: ArmingMachine,
    mounting: MountingConfig,
    config: SchedulerConfig,
    target: ControlTarget,
    yaw_offset: Option<f32>,
    last_sample_us: Option<u64>,
    sensor_failures: u32,
    mixed: MixerOutput,
    rates: RateCounters,
    telemetry_gate: TelemetryGate,
}

impl<'a, S, A, T> ControlScheduler<'a, S, A, T>
where
    S: ImuSensor,
    A: Actuators,
    T: TelemetrySink,
{
    /// Builds the control core from a validated configuration.
    ///
    /// Fails on any invalid configuration value, so a scheduler that exists
    /// can always be armed.
    pub fn new(
        config: &FlightConfig,
        sensor: S,
        actuators: A,
        telemetry: T,
        commands: &'a CommandChannel,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let nominal_dt = config.scheduler.nominal_dt;
        let mixer = MotorMixer::new(config.mixer)?;

        Ok(Self {
            sensor,
            actuators,
            telemetry,
            commands,
            estimator: Estimator::new(
                &config.estimator,
                config.scale,
                config.offsets,
                nominal_dt,
            )?,
            pitch: AxisPid::new(config.pitch, nominal_dt)?,
            roll: AxisPid::new(config.roll, nominal_dt)?,
            yaw: AxisPid::new(config.yaw, nominal_dt)?,
            mixer,
            arming: ArmingMachine::new(config.arming, config.mixer)?,
            mounting: config.mounting,
            config: config.scheduler,
            target: ControlTarget::default(),
            yaw_offset: None,
            last_sample_us: None,
            sensor_failures: 0,
            mixed: mixer.idle(),
            rates: RateCounters::new(config.scheduler.diagnostics_window_us),
            telemetry_gate: TelemetryGate::new(config.scheduler.telemetry_interval_us),
        })
    }

    /// Initializes the sensor and starts the arming sequence.
    ///
    /// A sensor that fails to initialize faults the vehicle.
    pub fn start(&mut self, now_us: u64) -> Result<(), SensorError> {
        if let Err(error) = self.sensor.initialize() {
            log_error!("sensor initialization failed: {:?}", error);
            self.arming.fault(FaultReason::SensorInit);
            return Err(error);
        }
        self.arming.begin(now_us);
        Ok(())
    }

    /// Runs one control tick at time `now_us`.
    pub fn tick(&mut self, now_us: u64) -> TickReport {
        let commands_applied = match self.commands.take() {
            Some(pending) => {
                self.apply_pending(&pending);
                pending.updates
            }
            None => 0,
        };

        self.arming.update(now_us);

        let sample = self.process_sample();
        let written = self.drive_actuators(sample);

        let yaw = self.estimator.estimate().yaw;
        if let Some(rates) = self.rates.record(now_us, sample == SampleOutcome::Fresh, yaw) {
            log_debug!(
                "loop {} Hz, sensor {} Hz, yaw drift {} deg/s",
                rates.tick_hz,
                rates.sensor_hz,
                rates.yaw_drift_dps
            );
        }

        if self.telemetry_gate.due(now_us) {
            let record = self.telemetry_record(now_us);
            self.telemetry.publish(&record);
        }

        TickReport {
            sample,
            commands_applied,
            arming: self.arming.state(),
            written,
        }
    }

    /// Applies one command update as a whole.
    pub fn apply_update(&mut self, update: &CommandUpdate) {
        self.apply_pending(&PendingCommands::from_update(update));
    }

    /// Applies merged command updates as a whole.
    ///
    /// Pending updates from the [`CommandChannel`] are applied through this
    /// at the start of each tick.
    pub fn apply_pending(&mut self, pending: &PendingCommands) {
        let mut target = self.target;

        if let Some(throttle) = pending.throttle {
            target.set_throttle(throttle);
        }
        for axis in Axis::ALL {
            if let Some(degrees) = pending.target(axis) {
                match axis {
                    Axis::Pitch => target.target_pitch = degrees,
                    Axis::Roll => target.target_roll = degrees,
                    Axis::Yaw => target.target_yaw = degrees,
                }
            }

            let update = pending.gains(axis);
            if !update.is_empty() {
                let pid = self.pid_mut(axis);
                let gains = update.over(pid.gains());
                if let Err(error) = pid.set_gains(gains) {
                    log_warn!("rejected gains for {:?}: {:?}", axis, error);
                }
            }
        }

        let was_idle = self.target.throttle_percent <= 0.0 || pending.throttle_cut;
        let taking_off = was_idle && target.throttle_percent > 0.0;
        self.target = target;
        if taking_off {
            log_info!("throttle up, resetting controllers and yaw reference");
            self.reset_controllers();
            self.yaw_offset = None;
        }
    }

    /// Captures a new yaw reference from the next fresh sample and resets
    /// the yaw controller.
    pub fn rezero_yaw(&mut self) {
        log_info!("yaw reference cleared");
        self.yaw_offset = None;
        self.yaw.reset();
    }

    /// Installs new sensor offsets and resets the estimator.
    pub fn recalibrate(&mut self, offsets: ImuOffsets) {
        log_info!("sensor offsets replaced, estimator reset");
        self.estimator.recalibrate(offsets);
        self.last_sample_us = None;
        self.yaw_offset = None;
        self.reset_controllers();
    }

    /// Forces the vehicle into `Faulted`.
    pub fn fault(&mut self, reason: FaultReason) {
        self.arming.fault(reason);
    }

    /// Clears a fault and returns to `Unpowered`. Call [`Self::start`] to
    /// run the arming sequence again.
    pub fn reset_fault(&mut self) {
        self.arming.reset();
        self.sensor_failures = 0;
        self.reset_controllers();
    }

    /// Current arming state.
    pub fn arming_state(&self) -> ArmingState {
        self.arming.state()
    }

    /// Reason of the active fault, if any.
    pub fn fault_reason(&self) -> Option<FaultReason> {
        self.arming.fault_reason()
    }

    /// Operator set points in effect.
    pub fn target(&self) -> &ControlTarget {
        &self.target
    }

    /// Latest attitude estimate.
    pub fn attitude(&self) -> AttitudeEstimate {
        self.estimator.estimate()
    }

    /// Yaw reference subtracted before the yaw controller.
    pub fn yaw_offset(&self) -> Option<f32> {
        self.yaw_offset
    }

    /// Rates of the last diagnostics window.
    pub fn rates(&self) -> Rates {
        self.rates.rates()
    }

    /// Last mixer output, whether or not it reached the actuators.
    pub fn mixed(&self) -> MixerOutput {
        self.mixed
    }

    /// Controller of one axis.
    pub fn pid(&self, axis: Axis) -> &AxisPid {
        match axis {
            Axis::Pitch => &self.pitch,
            Axis::Roll => &self.roll,
            Axis::Yaw => &self.yaw,
        }
    }

    /// The sensor interface.
    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// The sensor interface, mutably.
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// The actuator interface.
    pub fn actuators(&self) -> &A {
        &self.actuators
    }

    /// The actuator interface, mutably.
    pub fn actuators_mut(&mut self) -> &mut A {
        &mut self.actuators
    }

    /// The telemetry sink.
    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    fn pid_mut(&mut self, axis: Axis) -> &mut AxisPid {
        match axis {
            Axis::Pitch => &mut self.pitch,
            Axis::Roll => &mut self.roll,
            Axis::Yaw => &mut self.yaw,
        }
    }

    fn reset_controllers(&mut self) {
        self.pitch.reset();
        self.roll.reset();
        self.yaw.reset();
    }

    fn process_sample(&mut self) -> SampleOutcome {
        let sample = match self.sensor.read_raw_motion() {
            Ok(sample) => sample,
            Err(error) => {
                self.sensor_failures = self.sensor_failures.saturating_add(1);
                log_warn!(
                    "sensor read failed ({} in a row): {:?}",
                    self.sensor_failures,
                    error
                );
                if self.sensor_failures > self.config.max_sensor_failures {
                    self.arming.fault(FaultReason::SensorFailure);
                }
                return SampleOutcome::Failed(error);
            }
        };
        self.sensor_failures = 0;

        if !self.estimator.is_new(&sample) {
            return SampleOutcome::Stale;
        }

        let dt = match self.last_sample_us {
            Some(last) if sample.timestamp_us > last => {
                let seconds = (sample.timestamp_us - last) as f32 / 1_000_000.0;
                Some(seconds.clamp(self.config.min_dt, self.config.max_dt))
            }
            _ => None,
        };
        self.last_sample_us = Some(sample.timestamp_us);

        let estimate = self.estimator.update(sample, dt);
        let dt = dt.unwrap_or(self.config.nominal_dt);
        let yaw_offset = *self.yaw_offset.get_or_insert(estimate.yaw);

        let pitch_measured = self.mounting.adjust(Axis::Pitch, estimate.pitch);
        let roll_measured = self.mounting.adjust(Axis::Roll, estimate.roll);
        let yaw_measured = self.mounting.adjust(Axis::Yaw, estimate.yaw - yaw_offset);

        self.pitch.set_target(self.target.target_pitch);
        self.roll.set_target(self.target.target_roll);
        self.yaw.set_target(self.target.target_yaw);

        let pitch = self.pitch.update(pitch_measured, dt);
        let roll = self.roll.update(roll_measured, dt);
        let yaw = self.yaw.update(yaw_measured, dt);

        let throttle = self.mixer.throttle_command(self.target.throttle_percent);
        self.mixed = self.mixer.mix(pitch, roll, yaw, throttle);
        SampleOutcome::Fresh
    }

    fn drive_actuators(&mut self, sample: SampleOutcome) -> Option<MixerOutput> {
        let output = match self.arming.command() {
            Some(command) => command,
            None if self.throttle_idle() => self.mixer.idle(),
            None if sample == SampleOutcome::Fresh => self.mixed,
            None => return None,
        };

        for (motor, command) in output.commands() {
            if let Err(error) = self.actuators.write(motor, command) {
                log_error!("actuator write failed: {:?}", error);
                self.arming.fault(FaultReason::ActuatorFailure);
                let idle = self.mixer.idle();
                for (motor, command) in idle.commands() {
                    if let Err(error) = self.actuators.write(motor, command) {
                        log_error!("idle write to {:?} failed: {:?}", motor, error);
                    }
                }
                return None;
            }
        }
        Some(output)
    }

    fn throttle_idle(&self) -> bool {
        let throttle = self.mixer.throttle_command(self.target.throttle_percent);
        throttle <= f32::from(self.mixer.config().throttle_floor)
    }

    fn telemetry_record(&self, now_us: u64) -> TelemetryRecord {
        TelemetryRecord {
            timestamp_us: now_us,
            attitude: self.estimator.estimate(),
            pitch: self.pitch.terms(),
            roll: self.roll.terms(),
            yaw: self.yaw.terms(),
            motors: self.mixed,
            arming: self.arming.state(),
            rates: self.rates.rates(),
        }
    }
}
