// src/scheduler/stats.rs

//! Rolling rate counters for diagnostics.

/// Rates measured over the last completed window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rates {
    /// Control ticks per second.
    pub tick_hz: f32,
    /// Fresh sensor samples per second.
    pub sensor_hz: f32,
    /// Change of the yaw estimate per second, deg/s.
    pub yaw_drift_dps: f32,
}

/// Counts ticks and fresh samples over fixed windows.
#[derive(Debug, Clone)]
pub struct RateCounters {
    window_us: u64,
    window_start_us: Option<u64>,
    window_start_yaw: f32,
    ticks: u32,
    samples: u32,
    rates: Rates,
}

impl RateCounters {
    /// Creates counters with the given window length. A zero window is
    /// treated as one microsecond.
    pub fn new(window_us: u64) -> Self {
        Self {
            window_us: window_us.max(1),
            window_start_us: None,
            window_start_yaw: 0.0,
            ticks: 0,
            samples: 0,
            rates: Rates::default(),
        }
    }

    /// Records one tick. Returns the new rates when a window completes.
    pub fn record(&mut self, now_us: u64, fresh_sample: bool, yaw: f32) -> Option<Rates> {
        let start = match self.window_start_us {
            Some(start) => start,
            None => {
                self.window_start_us = Some(now_us);
                self.window_start_yaw = yaw;
                now_us
            }
        };

        self.ticks = self.ticks.saturating_add(1);
        if fresh_sample {
            self.samples = self.samples.saturating_add(1);
        }

        let elapsed_us = now_us.saturating_sub(start);
        if elapsed_us < self.window_us {
            return None;
        }

        let seconds = elapsed_us as f32 / 1_000_000.0;
        self.rates = Rates {
            tick_hz: self.ticks as f32 / seconds,
            sensor_hz: self.samples as f32 / seconds,
            yaw_drift_dps: (yaw - self.window_start_yaw) / seconds,
        };
        self.window_start_us = Some(now_us);
        self.window_start_yaw = yaw;
        self.ticks = 0;
        self.samples = 0;
        Some(self.rates)
    }

    /// Rates of the last completed window.
    pub fn rates(&self) -> Rates {
        self.rates
    }
}
