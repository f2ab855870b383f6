// demos/hover.rs

use quad_flight_core::interfaces::{Actuators, ImuSensor, TelemetrySink};
use quad_flight_core::pid::PidGains;
use quad_flight_core::scheduler::{CommandChannel, CommandUpdate, ControlScheduler, TelemetryRecord};
use quad_flight_core::{
    ActuatorError, ArmingState, FlightConfig, Motor, RawImuSample, SensorError,
};

const PERIOD_US: u64 = 2_500;
const GYRO_LSB_PER_DPS: f32 = 16.4;
const ACCEL_LSB_PER_G: f32 = 16384.0;

static COMMANDS: CommandChannel = CommandChannel::new();

/// A crude airframe: each motor pair's thrust difference rotates the frame.
struct SimulatedFrame {
    pitch: f32,
    roll: f32,
    pitch_rate: f32,
    roll_rate: f32,
    motors: [u16; 4],
    now_us: u64,
}

impl SimulatedFrame {
    fn new() -> Self {
        Self {
            pitch: 5.0,
            roll: -3.0,
            pitch_rate: 0.0,
            roll_rate: 0.0,
            motors: [1000; 4],
            now_us: 0,
        }
    }

    fn step(&mut self, now_us: u64) {
        let dt = (now_us - self.now_us) as f32 / 1_000_000.0;
        self.now_us = now_us;
        let [front_left, front_right, back_left, back_right] = self.motors.map(f32::from);

        let pitch_torque = (back_left + back_right) - (front_left + front_right);
        let roll_torque = (front_left + back_left) - (front_right + back_right);
        self.pitch_rate += pitch_torque * 0.05 * dt;
        self.roll_rate += roll_torque * 0.05 * dt;
        self.pitch_rate *= 0.98;
        self.roll_rate *= 0.98;
        self.pitch += self.pitch_rate * dt;
        self.roll += self.roll_rate * dt;
    }
}

impl ImuSensor for SimulatedFrame {
    fn initialize(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read_raw_motion(&mut self) -> Result<RawImuSample, SensorError> {
        let (pitch, roll) = (self.pitch.to_radians(), self.roll.to_radians());
        let accel = [
            roll.sin() * ACCEL_LSB_PER_G,
            pitch.sin() * ACCEL_LSB_PER_G,
            pitch.cos() * roll.cos() * ACCEL_LSB_PER_G,
        ];
        let gyro = [
            self.pitch_rate * GYRO_LSB_PER_DPS,
            -self.roll_rate * GYRO_LSB_PER_DPS,
            0.0,
        ];
        Ok(RawImuSample::new(
            gyro.map(|v| v as i16),
            accel.map(|v| v as i16),
            self.now_us,
        ))
    }
}

impl Actuators for SimulatedFrame {
    fn write(&mut self, motor: Motor, command: u16) -> Result<(), ActuatorError> {
        let index = match motor {
            Motor::FrontLeft => 0,
            Motor::FrontRight => 1,
            Motor::BackLeft => 2,
            Motor::BackRight => 3,
        };
        self.motors[index] = command;
        Ok(())
    }
}

/// Prints every record it receives.
struct Console;

impl TelemetrySink for Console {
    fn publish(&mut self, record: &TelemetryRecord) {
        if record.arming != ArmingState::Armed {
            return;
        }
        println!("t = {:.3}", record.timestamp_us as f32 / 1_000_000.0);
        println!(
            "    Attitude:  pitch {:-8.3}, roll {:-8.3}, yaw {:-8.3}",
            record.attitude.pitch, record.attitude.roll, record.attitude.yaw
        );
        println!(
            "    Pitch PID: {:-8.3}, {:-8.3}, {:-8.3}",
            record.pitch.p, record.pitch.i, record.pitch.d
        );
        println!(
            "    Roll PID:  {:-8.3}, {:-8.3}, {:-8.3}",
            record.roll.p, record.roll.i, record.roll.d
        );
        println!(
            "    Motors:    FL {}, FR {}, BL {}, BR {}",
            record.motors.front_left,
            record.motors.front_right,
            record.motors.back_left,
            record.motors.back_right
        );
    }
}

/// Sensor and actuators share one simulated frame.
struct Shared<'a>(&'a std::cell::RefCell<SimulatedFrame>);

impl ImuSensor for Shared<'_> {
    fn initialize(&mut self) -> Result<(), SensorError> {
        self.0.borrow_mut().initialize()
    }

    fn read_raw_motion(&mut self) -> Result<RawImuSample, SensorError> {
        self.0.borrow_mut().read_raw_motion()
    }
}

impl Actuators for Shared<'_> {
    fn write(&mut self, motor: Motor, command: u16) -> Result<(), ActuatorError> {
        self.0.borrow_mut().write(motor, command)
    }
}

fn main() {
    let mut config = FlightConfig::new();

    // Set the PID gains for pitch, roll and yaw.
    config.pitch.gains = PidGains::new(2.0, 0.05, 0.0);
    config.roll.gains = config.pitch.gains;
    config.yaw.gains = PidGains::new(1.0, 0.0, 0.0);

    // Shorten the start-up sequence for the simulation.
    config.arming.unpowered_ms = 10;
    config.arming.ramp_min_ms = 10;
    config.arming.ramp_max_ms = 10;
    config.arming.ramp_return_ms = 10;

    let frame = std::cell::RefCell::new(SimulatedFrame::new());
    let mut scheduler =
        match ControlScheduler::new(&config, Shared(&frame), Shared(&frame), Console, &COMMANDS) {
            Ok(scheduler) => scheduler,
            Err(error) => {
                eprintln!("invalid configuration: {}", error);
                return;
            }
        };

    if let Err(error) = scheduler.start(0) {
        eprintln!("sensor failed: {}", error);
        return;
    }

    let mut now = 0;
    while scheduler.arming_state() != ArmingState::Armed {
        now += PERIOD_US;
        scheduler.tick(now);
    }
    println!("armed at t = {:.3}", now as f32 / 1_000_000.0);

    // Hover at half throttle, level.
    if let Err(error) = COMMANDS.apply_command(CommandUpdate::from_query("throttle=50&pitch=0&roll=0")) {
        eprintln!("command rejected: {}", error);
    }

    for _ in 0..400 {
        now += PERIOD_US;
        frame.borrow_mut().step(now);
        scheduler.tick(now);
    }

    println!("rates: {:?}", scheduler.rates());
}
