// src/interfaces.rs

//! # Hardware Interfaces
//!
//! Traits implemented by the caller to connect the control core to the
//! sensor bus, the motor outputs and a telemetry transport. Implementations
//! must not block beyond a bounded latency: they are called from the control
//! tick.

use crate::error::{ActuatorError, SensorError};
use crate::scheduler::TelemetryRecord;
use crate::types::{Motor, RawImuSample};

/// Six-axis inertial sensor.
pub trait ImuSensor {
    /// Prepares the sensor for reading.
    fn initialize(&mut self) -> Result<(), SensorError>;

    /// Returns the most recently latched sample.
    ///
    /// A sensor that has not produced a new measurement since the last call
    /// returns the same axis values again.
    fn read_raw_motion(&mut self) -> Result<RawImuSample, SensorError>;
}

/// Motor command outputs.
pub trait Actuators {
    /// Sends one pulse-width command to one motor.
    ///
    /// Must report an error rather than drop a command the hardware refused.
    fn write(&mut self, motor: Motor, command: u16) -> Result<(), ActuatorError>;
}

/// Receiver of periodic status records.
pub trait TelemetrySink {
    /// Publishes one record. Must not block.
    fn publish(&mut self, record: &TelemetryRecord);
}

/// Discards every record.
impl TelemetrySink for () {
    fn publish(&mut self, _record: &TelemetryRecord) {}
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn publish(&mut self, record: &TelemetryRecord) {
        (**self).publish(record)
    }
}

impl<S: ImuSensor + ?Sized> ImuSensor for &mut S {
    fn initialize(&mut self) -> Result<(), SensorError> {
        (**self).initialize()
    }

    fn read_raw_motion(&mut self) -> Result<RawImuSample, SensorError> {
        (**self).read_raw_motion()
    }
}

impl<A: Actuators + ?Sized> Actuators for &mut A {
    fn write(&mut self, motor: Motor, command: u16) -> Result<(), ActuatorError> {
        (**self).write(motor, command)
    }
}
