//! Simulation clock.
//!
//! The clock owns the step counter and the simulation time. Each step
//! advances the time by a fixed number of seconds; day boundaries are
//! derived from the calendar date, never stored.
//!
//! # Design Principles
//!
//! - All step arithmetic is checked; advancing past `u64::MAX` or the end of
//!   the representable calendar is an error, not a wrap.
//! - The clock is serializable so a snapshot restores the exact step.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use township_types::time::minute_of_day;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Step counter would overflow.
    #[error("step counter overflow: cannot advance beyond u64::MAX")]
    StepOverflow,

    /// Simulation time would leave the representable calendar.
    #[error("simulation time overflow after {current}")]
    TimeOverflow {
        /// Time at which the advance was attempted.
        current: NaiveDateTime,
    },

    /// Invalid clock configuration.
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// How the current step relates to the previous step an agent saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayChange {
    /// The agent has never been stepped before.
    FirstDay,
    /// The calendar date changed since the agent's last step.
    NewDay,
}

/// Classify `now` against the time an agent was last stepped.
pub fn day_change(previous: Option<NaiveDateTime>, now: NaiveDateTime) -> Option<DayChange> {
    match previous {
        None => Some(DayChange::FirstDay),
        Some(prev) if prev.date() != now.date() => Some(DayChange::NewDay),
        Some(_) => None,
    }
}

/// Step counter plus simulation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    /// Time at step 0.
    start_time: NaiveDateTime,
    /// Time of the current step.
    curr_time: NaiveDateTime,
    /// Current step (0-indexed).
    step: u64,
    /// Simulated seconds per step.
    sec_per_step: u32,
}

impl SimClock {
    /// A clock at step 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `sec_per_step` is 0.
    pub fn new(start_time: NaiveDateTime, sec_per_step: u32) -> Result<Self, ClockError> {
        Self::from_parts(start_time, start_time, 0, sec_per_step)
    }

    /// Rebuild a clock from saved state.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `sec_per_step` is 0 or the
    /// current time precedes the start time.
    pub fn from_parts(
        start_time: NaiveDateTime,
        curr_time: NaiveDateTime,
        step: u64,
        sec_per_step: u32,
    ) -> Result<Self, ClockError> {
        if sec_per_step == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "sec_per_step must be at least 1".to_owned(),
            });
        }
        if curr_time < start_time {
            return Err(ClockError::InvalidConfig {
                reason: format!("current time {curr_time} precedes start time {start_time}"),
            });
        }
        Ok(Self {
            start_time,
            curr_time,
            step,
            sec_per_step,
        })
    }

    /// Advance one step. Returns the new step number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::StepOverflow`] or [`ClockError::TimeOverflow`]
    /// if either counter would leave its range. The clock is unchanged on
    /// error.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        let step = self.step.checked_add(1).ok_or(ClockError::StepOverflow)?;
        let curr_time = TimeDelta::try_seconds(i64::from(self.sec_per_step))
            .and_then(|delta| self.curr_time.checked_add_signed(delta))
            .ok_or(ClockError::TimeOverflow {
                current: self.curr_time,
            })?;
        self.step = step;
        self.curr_time = curr_time;
        Ok(step)
    }

    /// Current step number.
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Time of the current step.
    pub const fn curr_time(&self) -> NaiveDateTime {
        self.curr_time
    }

    /// Time at step 0.
    pub const fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    /// Simulated seconds per step.
    pub const fn sec_per_step(&self) -> u32 {
        self.sec_per_step
    }

    /// Minutes since midnight of the current step.
    pub fn minute_of_day(&self) -> u32 {
        minute_of_day(self.curr_time)
    }
}
