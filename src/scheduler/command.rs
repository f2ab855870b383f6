// src/scheduler/command.rs

//! Operator commands and their handoff into the control context.
//!
//! A [`CommandUpdate`] is one complete key/value update. The command source
//! hands it to a [`CommandChannel`], which merges it whole into a
//! [`PendingCommands`] record: later values replace earlier ones field by
//! field, and gains stay attached to the axes named in their own update. The
//! scheduler takes the record at the start of its next tick, so the tick
//! never sees a partially written target and the latest write is never lost.

use crate::error::CommandError;
use crate::pid::PidGains;
use crate::types::Axis;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Most key/value pairs read from one query string.
pub const MAX_QUERY_PAIRS: usize = 16;

/// One operator update. Absent fields leave the current value unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandUpdate {
    /// Throttle, percent.
    pub throttle: Option<f32>,
    /// Pitch target, degrees.
    pub pitch: Option<f32>,
    /// Roll target, degrees.
    pub roll: Option<f32>,
    /// Yaw target, degrees.
    pub yaw: Option<f32>,
    /// Proportional gain for the named axes.
    pub kp: Option<f32>,
    /// Integral gain for the named axes.
    pub ki: Option<f32>,
    /// Derivative gain for the named axes.
    pub kd: Option<f32>,
    /// Axes whose key appeared in the update, in pitch, roll, yaw order.
    ///
    /// Gains apply to these axes only.
    pub named: [bool; 3],
}

impl CommandUpdate {
    /// An update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the throttle.
    pub fn with_throttle(mut self, percent: f32) -> Self {
        self.throttle = Some(percent);
        self
    }

    /// Sets the target of one axis and names it for gain updates.
    pub fn with_target(mut self, axis: Axis, degrees: f32) -> Self {
        *self.target_mut(axis) = Some(degrees);
        self.named[axis_index(axis)] = true;
        self
    }

    /// Names an axis for gain updates without changing its target.
    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.named[axis_index(axis)] = true;
        self
    }

    /// Sets the proportional gain of the named axes.
    pub fn with_kp(mut self, kp: f32) -> Self {
        self.kp = Some(kp);
        self
    }

    /// Sets the integral gain of the named axes.
    pub fn with_ki(mut self, ki: f32) -> Self {
        self.ki = Some(ki);
        self
    }

    /// Sets the derivative gain of the named axes.
    pub fn with_kd(mut self, kd: f32) -> Self {
        self.kd = Some(kd);
        self
    }

    /// Target carried for one axis.
    pub fn target(&self, axis: Axis) -> Option<f32> {
        match axis {
            Axis::Pitch => self.pitch,
            Axis::Roll => self.roll,
            Axis::Yaw => self.yaw,
        }
    }

    /// Returns `true` if the axis key appeared in the update.
    pub fn names(&self, axis: Axis) -> bool {
        self.named[axis_index(axis)]
    }

    /// Returns `true` if the update carries any gain.
    pub fn has_gains(&self) -> bool {
        self.kp.is_some() || self.ki.is_some() || self.kd.is_some()
    }

    /// Returns `true` if every value carried is a finite number.
    pub fn is_finite(&self) -> bool {
        [
            self.throttle,
            self.pitch,
            self.roll,
            self.yaw,
            self.kp,
            self.ki,
            self.kd,
        ]
        .into_iter()
        .flatten()
        .all(|value| value.is_finite())
    }

    /// Builds an update from key/value pairs.
    ///
    /// Recognized keys are `throttle`, `pitch`, `roll`, `yaw`, `pgain`,
    /// `igain` and `dgain`. A value that does not parse as a finite number is
    /// ignored. An axis key with a non-empty value names its axis for gain
    /// updates even when the value does not parse.
    ///
    /// ```
    /// use quad_flight_core::scheduler::CommandUpdate;
    /// use quad_flight_core::Axis;
    ///
    /// let update = CommandUpdate::from_pairs([("roll", "x"), ("pgain", "1.5")]);
    /// assert_eq!(update.roll, None);
    /// assert!(update.names(Axis::Roll));
    /// assert_eq!(update.kp, Some(1.5));
    /// ```
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut update = Self::new();
        for (key, value) in pairs {
            let number = parse_number(value);
            match key.trim() {
                "throttle" => update.throttle = number.or(update.throttle),
                "pitch" => update.set_axis(Axis::Pitch, value, number),
                "roll" => update.set_axis(Axis::Roll, value, number),
                "yaw" => update.set_axis(Axis::Yaw, value, number),
                "pgain" => update.kp = number.or(update.kp),
                "igain" => update.ki = number.or(update.ki),
                "dgain" => update.kd = number.or(update.kd),
                _ => log_debug!("ignoring unknown command key"),
            }
        }
        update
    }

    /// Builds an update from a query string such as `throttle=50&pitch=10`.
    ///
    /// At most [`MAX_QUERY_PAIRS`] pairs are read; the rest are dropped.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut pairs: heapless::Vec<(&str, &str), MAX_QUERY_PAIRS> = heapless::Vec::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if pairs.push((key, value)).is_err() {
                log_warn!("command query has more than {} pairs", MAX_QUERY_PAIRS);
                break;
            }
        }
        Self::from_pairs(pairs)
    }

    fn set_axis(&mut self, axis: Axis, value: &str, number: Option<f32>) {
        if value.trim().is_empty() {
            return;
        }
        self.named[axis_index(axis)] = true;
        if number.is_some() {
            *self.target_mut(axis) = number;
        }
    }

    fn target_mut(&mut self, axis: Axis) -> &mut Option<f32> {
        match axis {
            Axis::Pitch => &mut self.pitch,
            Axis::Roll => &mut self.roll,
            Axis::Yaw => &mut self.yaw,
        }
    }
}

fn axis_index(axis: Axis) -> usize {
    match axis {
        Axis::Pitch => 0,
        Axis::Roll => 1,
        Axis::Yaw => 2,
    }
}

fn parse_number(value: &str) -> Option<f32> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|number| number.is_finite())
}

/// Gains received for one axis. Absent gains keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GainUpdate {
    /// Proportional gain.
    pub kp: Option<f32>,
    /// Integral gain.
    pub ki: Option<f32>,
    /// Derivative gain.
    pub kd: Option<f32>,
}

impl GainUpdate {
    const NONE: Self = Self {
        kp: None,
        ki: None,
        kd: None,
    };

    /// Returns `true` if no gain was received.
    pub fn is_empty(&self) -> bool {
        self.kp.is_none() && self.ki.is_none() && self.kd.is_none()
    }

    /// The received gains laid over `current`.
    pub fn over(&self, current: PidGains) -> PidGains {
        PidGains::new(
            self.kp.unwrap_or(current.kp),
            self.ki.unwrap_or(current.ki),
            self.kd.unwrap_or(current.kd),
        )
    }
}

/// Net effect of the updates received since the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingCommands {
    /// Latest throttle, percent.
    pub throttle: Option<f32>,
    /// A throttle at or below zero was received, even if a later update
    /// raised it again.
    pub throttle_cut: bool,
    /// Latest targets in pitch, roll, yaw order, degrees.
    pub targets: [Option<f32>; 3],
    /// Latest gains per axis, in pitch, roll, yaw order.
    pub gains: [GainUpdate; 3],
    /// Number of updates merged.
    pub updates: usize,
}

impl PendingCommands {
    /// A record holding no updates.
    pub const fn new() -> Self {
        Self {
            throttle: None,
            throttle_cut: false,
            targets: [None; 3],
            gains: [GainUpdate::NONE; 3],
            updates: 0,
        }
    }

    /// A record holding exactly one update.
    pub fn from_update(update: &CommandUpdate) -> Self {
        let mut pending = Self::new();
        pending.merge(update);
        pending
    }

    /// Merges an update. Its values replace the ones already held.
    pub fn merge(&mut self, update: &CommandUpdate) {
        if let Some(throttle) = update.throttle {
            self.throttle_cut |= throttle <= 0.0;
            self.throttle = Some(throttle);
        }
        for axis in Axis::ALL {
            let index = axis_index(axis);
            if let Some(degrees) = update.target(axis) {
                self.targets[index] = Some(degrees);
            }
            if update.names(axis) {
                let gains = &mut self.gains[index];
                gains.kp = update.kp.or(gains.kp);
                gains.ki = update.ki.or(gains.ki);
                gains.kd = update.kd.or(gains.kd);
            }
        }
        self.updates = self.updates.saturating_add(1);
    }

    /// Latest target of one axis.
    pub fn target(&self, axis: Axis) -> Option<f32> {
        self.targets[axis_index(axis)]
    }

    /// Gains received for one axis.
    pub fn gains(&self, axis: Axis) -> GainUpdate {
        self.gains[axis_index(axis)]
    }

    /// Returns `true` if no update was merged.
    pub fn is_empty(&self) -> bool {
        self.updates == 0
    }
}

/// Handoff of [`CommandUpdate`]s into the control tick.
///
/// Safe to share between the command source and the control tick, including
/// across interrupt priorities. Both sides hold a critical section only for
/// the merge or the swap, and neither ever waits for the other.
pub struct CommandChannel {
    pending: Mutex<CriticalSectionRawMutex, RefCell<PendingCommands>>,
}

impl CommandChannel {
    /// Creates an empty channel. Usable in a `static`.
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(RefCell::new(PendingCommands::new())),
        }
    }

    /// Merges an update into the record the next tick will apply.
    ///
    /// An update carrying a non-finite value is rejected whole.
    pub fn apply_command(&self, update: CommandUpdate) -> Result<(), CommandError> {
        if !update.is_finite() {
            log_warn!("command with a non-finite value rejected");
            return Err(CommandError::NonFinite);
        }
        self.pending.lock(|pending| pending.borrow_mut().merge(&update));
        Ok(())
    }

    /// Takes everything merged since the last call.
    pub fn take(&self) -> Option<PendingCommands> {
        self.pending.lock(|pending| {
            let taken = pending.replace(PendingCommands::new());
            (!taken.is_empty()).then_some(taken)
        })
    }
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}
