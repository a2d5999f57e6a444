//! Periodic clearing of the tripped-sensor set once the alarm has been
//! quiet for longer than the ignore window.

use super::logic::AlarmLogic;
use chrono::{DateTime, Utc};
use log::info;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ResetTimer {
    period: Duration,
}

impl ResetTimer {
    /// Create a timer that ticks every `period`.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Clear the active set if more than `ignore_time` has passed since the
    /// last trip. Returns true when something was cleared.
    pub fn tick(&self, alarm: &mut AlarmLogic, ignore_time: Duration, now: DateTime<Utc>) -> bool {
        let Some(last) = alarm.last_trigger() else {
            return false;
        };
        if alarm.active_sensors().is_empty() {
            return false;
        }
        // A clock stepped backwards reads as no time elapsed.
        let elapsed = (now - last).to_std().unwrap_or_default();
        if elapsed <= ignore_time {
            return false;
        }
        info!(
            "[Reset] {}s since last trigger, clearing {} active sensor(s)",
            elapsed.as_secs(),
            alarm.active_sensors().len()
        );
        alarm.clear_active();
        true
    }
}
