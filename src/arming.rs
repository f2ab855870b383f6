// src/arming.rs

//! # Arming State Machine
//!
//! Start-up self test that must complete before stabilization output may
//! reach the motors:
//!
//! ```text
//! Unpowered -> RampTest(Minimum -> Maximum -> Return)
//!           -> MotorPulseTest(0) -> ... -> MotorPulseTest(3) -> Armed
//! ```
//!
//! Each state holds for a configured dwell time. Any state can be forced into
//! `Faulted`, which stays until [`ArmingMachine::reset`] is called. Outside
//! `Armed` the machine supplies the command the motors must receive.

use crate::error::{ConfigError, FaultReason};
use crate::mixer::MixerConfig;
use crate::types::{MixerOutput, Motor};

/// Step of the full-range actuator sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RampPhase {
    /// All motors at the minimum command.
    Minimum,
    /// All motors at the maximum command.
    Maximum,
    /// Back to the minimum command.
    Return,
}

/// Arming state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArmingState {
    /// Motors idle, sequence not yet running or holding before the ramp.
    Unpowered,
    /// Full-range sweep of all four actuators.
    RampTest(RampPhase),
    /// Pulse of the motor at this index of the pulse order.
    MotorPulseTest(u8),
    /// Stabilization output reaches the motors.
    Armed,
    /// Outputs held at idle until reset.
    Faulted,
}

/// Dwell times and commands of the start-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmingConfig {
    /// Hold in `Unpowered` after the sequence starts, milliseconds.
    pub unpowered_ms: u32,
    /// Dwell at the ramp minimum, milliseconds.
    pub ramp_min_ms: u32,
    /// Dwell at the ramp maximum, milliseconds.
    pub ramp_max_ms: u32,
    /// Dwell after returning to the minimum, milliseconds.
    pub ramp_return_ms: u32,
    /// Length of each motor pulse, milliseconds.
    pub pulse_ms: u32,
    /// Command of the pulsed motor.
    pub pulse_command: u16,
    /// Order in which motors are pulsed.
    pub pulse_order: [Motor; 4],
}

impl Default for ArmingConfig {
    fn default() -> Self {
        Self {
            unpowered_ms: 1000,
            ramp_min_ms: 1000,
            ramp_max_ms: 1000,
            ramp_return_ms: 1500,
            pulse_ms: 100,
            pulse_command: 1050,
            pulse_order: [
                Motor::FrontLeft,
                Motor::FrontRight,
                Motor::BackRight,
                Motor::BackLeft,
            ],
        }
    }
}

impl ArmingConfig {
    /// Checks the pulse command against the mixer range and the pulse order.
    pub fn validate(&self, mixer: &MixerConfig) -> Result<(), ConfigError> {
        if !mixer.in_range(self.pulse_command) {
            return Err(ConfigError::CommandOutOfRange {
                value: self.pulse_command,
            });
        }
        for motor in Motor::ALL {
            if !self.pulse_order.contains(&motor) {
                return Err(ConfigError::InvalidPulseOrder);
            }
        }
        Ok(())
    }
}

/// Drives the start-up sequence and holds the fault latch.
#[derive(Debug, Clone)]
pub struct ArmingMachine {
    config: ArmingConfig,
    mixer: MixerConfig,
    state: ArmingState,
    fault: Option<FaultReason>,
    entered_us: Option<u64>,
}

impl ArmingMachine {
    /// Creates a machine in `Unpowered` with the sequence not started.
    pub fn new(config: ArmingConfig, mixer: MixerConfig) -> Result<Self, ConfigError> {
        mixer.validate()?;
        config.validate(&mixer)?;
        Ok(Self {
            config,
            mixer,
            state: ArmingState::Unpowered,
            fault: None,
            entered_us: None,
        })
    }

    /// Current state.
    pub fn state(&self) -> ArmingState {
        self.state
    }

    /// Reason of the active fault, if any.
    pub fn fault_reason(&self) -> Option<FaultReason> {
        self.fault
    }

    /// Returns `true` when stabilization output may reach the motors.
    pub fn is_armed(&self) -> bool {
        self.state == ArmingState::Armed
    }

    /// Starts the sequence from `Unpowered`. Has no effect in any other
    /// state or when already started.
    pub fn begin(&mut self, now_us: u64) {
        if self.state == ArmingState::Unpowered && self.entered_us.is_none() {
            log_info!("arming sequence started");
            self.entered_us = Some(now_us);
        }
    }

    /// Advances at most one state once the current dwell has elapsed.
    ///
    /// Returns the new state on a transition.
    pub fn update(&mut self, now_us: u64) -> Option<ArmingState> {
        let entered = self.entered_us?;
        let dwell_ms = match self.state {
            ArmingState::Unpowered => self.config.unpowered_ms,
            ArmingState::RampTest(RampPhase::Minimum) => self.config.ramp_min_ms,
            ArmingState::RampTest(RampPhase::Maximum) => self.config.ramp_max_ms,
            ArmingState::RampTest(RampPhase::Return) => self.config.ramp_return_ms,
            ArmingState::MotorPulseTest(_) => self.config.pulse_ms,
            ArmingState::Armed | ArmingState::Faulted => return None,
        };
        if now_us.saturating_sub(entered) < u64::from(dwell_ms) * 1_000 {
            return None;
        }

        let next = match self.state {
            ArmingState::Unpowered => ArmingState::RampTest(RampPhase::Minimum),
            ArmingState::RampTest(RampPhase::Minimum) => ArmingState::RampTest(RampPhase::Maximum),
            ArmingState::RampTest(RampPhase::Maximum) => ArmingState::RampTest(RampPhase::Return),
            ArmingState::RampTest(RampPhase::Return) => ArmingState::MotorPulseTest(0),
            ArmingState::MotorPulseTest(index) if usize::from(index) + 1 < Motor::ALL.len() => {
                ArmingState::MotorPulseTest(index + 1)
            }
            _ => ArmingState::Armed,
        };
        log_info!("arming: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.entered_us = Some(now_us);
        Some(next)
    }

    /// Command the motors must receive in the current state, or `None` when
    /// armed and the mixer output applies.
    pub fn command(&self) -> Option<MixerOutput> {
        let idle = MixerOutput::uniform(self.mixer.idle_command);
        match self.state {
            ArmingState::Armed => None,
            ArmingState::Unpowered | ArmingState::Faulted => Some(idle),
            ArmingState::RampTest(RampPhase::Maximum) => {
                Some(MixerOutput::uniform(self.mixer.max_command))
            }
            ArmingState::RampTest(_) => Some(MixerOutput::uniform(self.mixer.min_command)),
            ArmingState::MotorPulseTest(index) => {
                let mut output = idle;
                if let Some(&motor) = self.config.pulse_order.get(usize::from(index)) {
                    output.set(motor, self.config.pulse_command);
                }
                Some(output)
            }
        }
    }

    /// Forces `Faulted`. The first reason is kept until reset.
    pub fn fault(&mut self, reason: FaultReason) {
        if self.state != ArmingState::Faulted {
            log_error!("arming faulted: {:?}", reason);
            self.state = ArmingState::Faulted;
            self.fault = Some(reason);
            self.entered_us = None;
        }
    }

    /// Returns to `Unpowered` with the sequence not started and the fault
    /// cleared.
    pub fn reset(&mut self) {
        log_info!("arming reset from {:?}", self.state);
        self.state = ArmingState::Unpowered;
        self.fault = None;
        self.entered_us = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ArmingMachine {
        ArmingMachine::new(ArmingConfig::default(), MixerConfig::default())
            .expect("valid arming config")
    }

    /// Runs the machine from `begin` until it arms, ticking every `step_us`,
    /// and returns every state visited in order.
    fn run_to_armed(machine: &mut ArmingMachine, step_us: u64) -> Vec<ArmingState> {
        let mut visited = vec![machine.state()];
        machine.begin(0);
        let mut now = 0;
        let mut updates = 0;
        while !machine.is_armed() {
            now += step_us;
            updates += 1;
            if let Some(state) = machine.update(now) {
                visited.push(state);
            }
            assert!(updates < 100_000, "Sequence never completed.");
        }
        visited
    }

    /// Test that arming passes through the full sequence in order.
    #[test]
    fn test_full_sequence() {
        let mut machine = machine();
        let visited = run_to_armed(&mut machine, 2_500);
        assert_eq!(
            visited,
            vec![
                ArmingState::Unpowered,
                ArmingState::RampTest(RampPhase::Minimum),
                ArmingState::RampTest(RampPhase::Maximum),
                ArmingState::RampTest(RampPhase::Return),
                ArmingState::MotorPulseTest(0),
                ArmingState::MotorPulseTest(1),
                ArmingState::MotorPulseTest(2),
                ArmingState::MotorPulseTest(3),
                ArmingState::Armed,
            ]
        );
    }

    /// Test that a huge time jump still advances only one state per update.
    #[test]
    fn test_one_transition_per_update() {
        let mut machine = machine();
        let visited = run_to_armed(&mut machine, 10_000_000);
        assert_eq!(visited.len(), 9);
    }

    /// Test that nothing happens before the sequence is started.
    #[test]
    fn test_unstarted_machine_holds() {
        let mut machine = machine();
        assert_eq!(machine.update(100_000_000), None);
        assert_eq!(machine.state(), ArmingState::Unpowered);
    }

    /// Test the commands issued during the sequence.
    #[test]
    fn test_sequence_commands() {
        let mut machine = machine();
        assert_eq!(machine.command(), Some(MixerOutput::uniform(1000)));

        machine.begin(0);
        machine.update(1_000_000);
        assert_eq!(machine.command(), Some(MixerOutput::uniform(1000)));
        machine.update(2_000_000);
        assert_eq!(machine.command(), Some(MixerOutput::uniform(2000)));
        machine.update(3_000_000);
        assert_eq!(machine.command(), Some(MixerOutput::uniform(1000)));

        let mut expected = MixerOutput::uniform(1000);
        expected.front_left = 1050;
        machine.update(4_500_000);
        assert_eq!(machine.state(), ArmingState::MotorPulseTest(0));
        assert_eq!(machine.command(), Some(expected));

        let mut expected = MixerOutput::uniform(1000);
        expected.back_right = 1050;
        machine.update(4_600_000);
        machine.update(4_700_000);
        assert_eq!(machine.state(), ArmingState::MotorPulseTest(2));
        assert_eq!(machine.command(), Some(expected));

        machine.update(4_800_000);
        machine.update(4_900_000);
        assert!(machine.is_armed());
        assert_eq!(machine.command(), None);
    }

    /// Test that a fault from any state latches until reset.
    #[test]
    fn test_fault_latches_until_reset() {
        let mut reference = machine();
        let states = run_to_armed(&mut reference, 50_000);

        for &target in &states {
            let mut machine = machine();
            machine.begin(0);
            let mut now = 0;
            while machine.state() != target {
                now += 50_000;
                machine.update(now);
            }

            machine.fault(FaultReason::ActuatorFailure);
            assert_eq!(machine.state(), ArmingState::Faulted);
            assert_eq!(machine.command(), Some(MixerOutput::uniform(1000)));

            machine.fault(FaultReason::SensorFailure);
            assert_eq!(machine.fault_reason(), Some(FaultReason::ActuatorFailure));
            for later in 1..100 {
                assert_eq!(machine.update(now + later * 1_000_000), None);
                machine.begin(now + later * 1_000_000);
                assert_eq!(machine.state(), ArmingState::Faulted);
            }

            machine.reset();
            assert_eq!(machine.state(), ArmingState::Unpowered);
            assert_eq!(machine.fault_reason(), None);
        }
    }

    /// Test that re-arming after a reset needs the full sequence again.
    #[test]
    fn test_rearm_requires_full_sequence() {
        let mut machine = machine();
        run_to_armed(&mut machine, 2_500);
        machine.fault(FaultReason::External);
        machine.reset();
        let visited = run_to_armed(&mut machine, 2_500);
        assert_eq!(visited.len(), 9);
    }

    /// Test pulse order validation.
    #[test]
    fn test_config_validate() {
        let config = ArmingConfig {
            pulse_order: [Motor::FrontLeft; 4],
            ..ArmingConfig::default()
        };
        assert_eq!(
            config.validate(&MixerConfig::default()),
            Err(ConfigError::InvalidPulseOrder)
        );
        let config = ArmingConfig {
            pulse_command: 2500,
            ..ArmingConfig::default()
        };
        assert!(config.validate(&MixerConfig::default()).is_err());
    }
}
