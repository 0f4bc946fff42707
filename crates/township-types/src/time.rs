//! Simulation timestamp helpers.
//!
//! Simulation time is a naive local wall clock. Timestamps are rendered in
//! the long human format used by the persisted snapshot meta, e.g.
//! `February 13, 2023, 14:05:30`.

use chrono::{NaiveDateTime, TimeDelta, Timelike};

/// Format string for persisted simulation timestamps.
pub const SIM_TIME_FORMAT: &str = "%B %d, %Y, %H:%M:%S";

/// Minutes in one simulated day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Render a timestamp in [`SIM_TIME_FORMAT`].
pub fn format_sim_time(time: NaiveDateTime) -> String {
    time.format(SIM_TIME_FORMAT).to_string()
}

/// Parse a timestamp written in [`SIM_TIME_FORMAT`].
pub fn parse_sim_time(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, SIM_TIME_FORMAT)
}

/// Minutes elapsed since midnight.
pub fn minute_of_day(time: NaiveDateTime) -> u32 {
    time.hour()
        .saturating_mul(60)
        .saturating_add(time.minute())
}

/// Round up to the next whole minute. Times already on a minute boundary
/// are returned unchanged.
pub fn ceil_to_minute(time: NaiveDateTime) -> NaiveDateTime {
    if time.second() == 0 && time.nanosecond() == 0 {
        return time;
    }
    let floored = time
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time);
    add_minutes(floored, 1)
}

/// Add whole minutes, saturating at the input on overflow.
pub fn add_minutes(time: NaiveDateTime, minutes: u32) -> NaiveDateTime {
    TimeDelta::try_minutes(i64::from(minutes))
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(time)
}

/// Add whole seconds, saturating at the input on overflow.
pub fn add_seconds(time: NaiveDateTime, seconds: u32) -> NaiveDateTime {
    TimeDelta::try_seconds(i64::from(seconds))
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(time)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 2, 13)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn format_round_trip() {
        let t = at(14, 5, 30);
        let text = format_sim_time(t);
        assert_eq!(text, "February 13, 2023, 14:05:30");
        assert_eq!(parse_sim_time(&text).unwrap(), t);
    }

    #[test]
    fn ceil_leaves_whole_minutes_alone() {
        assert_eq!(ceil_to_minute(at(10, 0, 0)), at(10, 0, 0));
        assert_eq!(ceil_to_minute(at(10, 0, 10)), at(10, 1, 0));
        assert_eq!(ceil_to_minute(at(23, 59, 59)), at(23, 59, 59) + TimeDelta::seconds(1));
    }

    #[test]
    fn minute_of_day_counts_from_midnight() {
        assert_eq!(minute_of_day(at(0, 0, 0)), 0);
        assert_eq!(minute_of_day(at(10, 30, 45)), 630);
    }
}
