//! The daily schedule.
//!
//! A [`DailySchedule`] holds two lists of [`ScheduleEntry`]s for the current
//! day:
//!
//! - `hourly`: the plan as first generated (roughly hour-sized blocks), kept
//!   untouched so reaction windows can be computed against it
//! - `entries`: the working schedule, which planning decomposes into finer
//!   subtasks and reactions splice into
//!
//! Both must sum to exactly [`MINUTES_PER_DAY`]. Any edit that could break
//! the total is followed by [`DailySchedule::enforce_day_total`], which pads
//! or trims the final entries and logs the correction.

use serde::{Deserialize, Serialize};
use township_types::ScheduleEntry;
use township_types::time::MINUTES_PER_DAY;
use tracing::{debug, warn};

use crate::error::AgentError;

/// Task used to pad a day that comes up short.
const PAD_TASK: &str = "sleeping";

/// Context handed to whoever re-derives the rest of a spliced window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceRequest {
    /// Window bounds in whole hours, `[start, end)`.
    pub window_hours: (u32, u32),
    /// The entries being replaced, as they were.
    pub original: Vec<ScheduleEntry>,
    /// Completed part of the window plus the truncated displaced entry.
    pub prefix: Vec<ScheduleEntry>,
    /// The inserted reaction.
    pub inserted: ScheduleEntry,
    /// Minutes left in the window after the inserted reaction.
    pub remaining_minutes: u32,
}

/// One day's plan, in minutes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySchedule {
    entries: Vec<ScheduleEntry>,
    hourly: Vec<ScheduleEntry>,
}

/// Sum of entry durations.
pub fn total_minutes(entries: &[ScheduleEntry]) -> u32 {
    entries
        .iter()
        .fold(0_u32, |acc, e| acc.saturating_add(e.minutes))
}

/// Make `entries` sum to exactly `total`: extend the last entry (or push
/// `filler` when empty) if short, trim from the end if long. Zero-length
/// entries are dropped.
pub fn fit_to_total(entries: &mut Vec<ScheduleEntry>, total: u32, filler: &str) {
    entries.retain(|e| e.minutes > 0);
    let mut sum = total_minutes(entries);
    if sum < total {
        let missing = total.saturating_sub(sum);
        match entries.last_mut() {
            Some(last) => last.minutes = last.minutes.saturating_add(missing),
            None => entries.push(ScheduleEntry::new(filler, missing)),
        }
        return;
    }
    while sum > total {
        let Some(last) = entries.last_mut() else {
            break;
        };
        let excess = sum.saturating_sub(total);
        if last.minutes > excess {
            last.minutes = last.minutes.saturating_sub(excess);
            sum = total;
        } else {
            sum = sum.saturating_sub(last.minutes);
            entries.pop();
        }
    }
}

/// Index of the entry in progress `minute` minutes after midnight: the
/// first entry whose cumulative end lies beyond `minute`.
fn index_at(entries: &[ScheduleEntry], minute: u32) -> Option<usize> {
    let mut elapsed = 0_u32;
    for (i, entry) in entries.iter().enumerate() {
        elapsed = elapsed.saturating_add(entry.minutes);
        if elapsed > minute {
            return Some(i);
        }
    }
    None
}

/// Split `"task (detail)"` into its two halves.
fn split_detail(task: &str) -> Option<(&str, &str)> {
    let (head, rest) = task.split_once('(')?;
    let detail = rest.rsplit_once(')').map_or(rest, |(inner, _)| inner);
    Some((head.trim(), detail.trim()))
}

impl DailySchedule {
    /// A schedule from a freshly generated hourly plan. Both the hourly and
    /// working lists are forced to a full day.
    pub fn from_hourly(mut hourly: Vec<ScheduleEntry>) -> Self {
        fit_to_total(&mut hourly, MINUTES_PER_DAY, PAD_TASK);
        Self {
            entries: hourly.clone(),
            hourly,
        }
    }

    /// The working schedule.
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// The day's original hourly plan.
    pub fn hourly(&self) -> &[ScheduleEntry] {
        &self.hourly
    }

    /// Whether no plan exists yet.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total planned minutes of the working schedule.
    pub fn total_minutes(&self) -> u32 {
        total_minutes(&self.entries)
    }

    /// Check the working schedule sums to a full day.
    pub fn validate(&self) -> Result<(), AgentError> {
        let total = self.total_minutes();
        if total == MINUTES_PER_DAY {
            Ok(())
        } else {
            Err(AgentError::ScheduleInvariantViolation { total })
        }
    }

    /// Repair the working schedule to exactly one day. Returns `true` if a
    /// repair was needed.
    pub fn enforce_day_total(&mut self) -> bool {
        if let Err(e) = self.validate() {
            warn!(error = %e, "Repairing daily schedule total");
            fit_to_total(&mut self.entries, MINUTES_PER_DAY, PAD_TASK);
            return true;
        }
        false
    }

    /// Index into the working schedule of the entry in progress at
    /// `minute_of_day`.
    pub fn index_at(&self, minute_of_day: u32) -> Option<usize> {
        index_at(&self.entries, minute_of_day)
    }

    /// Index into the hourly plan of the block in progress at
    /// `minute_of_day`.
    pub fn hourly_index_at(&self, minute_of_day: u32) -> Option<usize> {
        index_at(&self.hourly, minute_of_day)
    }

    /// The working entry at `index`.
    pub fn entry(&self, index: usize) -> Option<&ScheduleEntry> {
        self.entries.get(index)
    }

    /// Minutes after midnight at which entry `index` starts.
    pub fn start_minute(&self, index: usize) -> u32 {
        total_minutes(self.entries.get(..index).unwrap_or(&self.entries))
    }

    /// Replace entry `index` with `subtasks`, labelled
    /// `"<task> (<subtask>)"` and fitted to the entry's duration.
    pub fn decompose(&mut self, index: usize, subtasks: Vec<ScheduleEntry>) {
        let Some(entry) = self.entries.get(index).cloned() else {
            return;
        };
        let mut pieces: Vec<ScheduleEntry> = subtasks
            .into_iter()
            .map(|s| ScheduleEntry::new(format!("{} ({})", entry.task, s.task), s.minutes))
            .collect();
        fit_to_total(&mut pieces, entry.minutes, &entry.task);
        self.entries.splice(index..=index, pieces);
        self.enforce_day_total();
    }

    /// The `[start, end)` hour window a reaction at `minute_of_day` may
    /// rewrite: the current hourly block, extended by the next block when
    /// the current one is shorter than two hours.
    pub fn reaction_window(&self, minute_of_day: u32) -> (u32, u32) {
        let idx = self
            .hourly_index_at(minute_of_day)
            .unwrap_or_else(|| self.hourly.len().saturating_sub(1));
        let start = total_minutes(self.hourly.get(..idx).unwrap_or(&[]));
        let current = self.hourly.get(idx).map_or(0, |e| e.minutes);
        let span = if current >= 120 {
            current
        } else if let Some(next) = self.hourly.get(idx.saturating_add(1)) {
            current.saturating_add(next.minutes)
        } else {
            120
        };
        let start_hour = start / 60;
        let end_hour = (start.saturating_add(span) / 60)
            .max(start_hour.saturating_add(1))
            .min(24);
        (start_hour, end_hour)
    }

    /// Splice a reactive task into the working schedule.
    ///
    /// Entries starting inside `window_hours` are replaced by: the entries
    /// already completed at `minute_of_day`, the displaced entry truncated
    /// to its elapsed minutes and relabelled "en route", the inserted task,
    /// and whatever `revise` proposes for the rest of the window (falling
    /// back to resuming the displaced task). The replaced span keeps its
    /// original length, so the day still sums to 1440 minutes.
    ///
    /// A window that closes before `minute_of_day` is widened to cover the
    /// running entry. At the very end of the day there is nothing to
    /// displace and the schedule is left as it is.
    pub fn splice_reaction<F>(
        &mut self,
        minute_of_day: u32,
        inserted_task: &str,
        inserted_minutes: u32,
        window_hours: (u32, u32),
        revise: F,
    ) -> Result<(), AgentError>
    where
        F: FnOnce(&SpliceRequest) -> Option<Vec<ScheduleEntry>>,
    {
        let window_start = window_hours.0.saturating_mul(60);
        let window_end = window_hours.1.saturating_mul(60).min(MINUTES_PER_DAY);

        let mut starts = Vec::with_capacity(self.entries.len());
        let mut cursor = 0_u32;
        for entry in &self.entries {
            starts.push(cursor);
            cursor = cursor.saturating_add(entry.minutes);
        }
        let first_at_or_after = |bound: u32| {
            starts
                .iter()
                .position(|s| *s >= bound)
                .unwrap_or(starts.len())
        };
        let mut start_index = first_at_or_after(window_start);
        let mut end_index = first_at_or_after(window_end).max(start_index);

        // Window starts mid-entry: pull in the entry that is running.
        if let Some(current) = self.index_at(minute_of_day)
            && current < start_index
        {
            start_index = current;
        }
        if end_index <= start_index {
            end_index = start_index.saturating_add(1).min(self.entries.len());
        }
        // Window closes at or before now: stretch it over the running entry.
        if let Some(current) = self.index_at(minute_of_day)
            && current >= end_index
        {
            debug!(
                minute_of_day,
                window_start = window_hours.0,
                window_end = window_hours.1,
                "Reaction window widened to the running entry"
            );
            end_index = current.saturating_add(1);
        }

        let original: Vec<ScheduleEntry> = self
            .entries
            .get(start_index..end_index)
            .map(<[ScheduleEntry]>::to_vec)
            .unwrap_or_default();
        let span_minutes = total_minutes(&original);

        let mut prefix = Vec::new();
        let mut displaced: Option<&ScheduleEntry> = None;
        let mut entry_start = starts.get(start_index).copied().unwrap_or(0);
        for entry in &original {
            let entry_end = entry_start.saturating_add(entry.minutes);
            if entry_end <= minute_of_day {
                prefix.push(entry.clone());
            } else {
                if entry_start <= minute_of_day {
                    let elapsed = minute_of_day.saturating_sub(entry_start);
                    let label = match split_detail(&entry.task) {
                        Some((head, detail)) => format!("{head} (en route to {detail})"),
                        None => format!("en route to {}", entry.task),
                    };
                    if elapsed > 0 {
                        prefix.push(ScheduleEntry::new(label, elapsed));
                    }
                }
                displaced = Some(entry);
                break;
            }
            entry_start = entry_end;
        }

        let room = span_minutes.saturating_sub(total_minutes(&prefix));
        if room == 0 {
            debug!(
                minute_of_day,
                task = inserted_task,
                "No minutes left for the reaction, schedule unchanged"
            );
            return Ok(());
        }
        let inserted_label = displaced
            .and_then(|d| split_detail(&d.task))
            .map_or_else(
                || inserted_task.to_owned(),
                |(head, _)| format!("{head} ({inserted_task})"),
            );
        let inserted = ScheduleEntry::new(inserted_label, inserted_minutes.min(room));
        let remaining = room.saturating_sub(inserted.minutes);
        let resume_task = displaced.map_or_else(
            || inserted_task.to_owned(),
            |d| split_detail(&d.task).map_or_else(|| d.task.clone(), |(head, _)| head.to_owned()),
        );

        let request = SpliceRequest {
            window_hours,
            original: original.clone(),
            prefix: prefix.clone(),
            inserted: inserted.clone(),
            remaining_minutes: remaining,
        };
        let mut rest = if remaining == 0 {
            Vec::new()
        } else {
            revise(&request).unwrap_or_default()
        };
        fit_to_total(&mut rest, remaining, &resume_task);

        let mut segment = prefix;
        segment.push(inserted);
        segment.append(&mut rest);
        segment.retain(|e| e.minutes > 0);

        let end_index = end_index.min(self.entries.len());
        self.entries.splice(start_index..end_index, segment);
        self.enforce_day_total();
        self.validate()
    }

    /// `HH:MM || task` lines for the working schedule, used as planning
    /// context.
    pub fn summary(&self) -> String {
        let mut elapsed = 0_u32;
        let mut lines = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            lines.push(format!(
                "{:02}:{:02} || {}",
                elapsed / 60,
                elapsed % 60,
                entry.task
            ));
            elapsed = elapsed.saturating_add(entry.minutes);
        }
        lines.join("\n")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn hourly_day() -> DailySchedule {
        DailySchedule::from_hourly(vec![
            ScheduleEntry::new("sleeping", 420),
            ScheduleEntry::new("morning routine", 60),
            ScheduleEntry::new("working at the cafe", 240),
            ScheduleEntry::new("lunch", 60),
            ScheduleEntry::new("working at the cafe", 300),
            ScheduleEntry::new("dinner", 60),
            ScheduleEntry::new("sleeping", 300),
        ])
    }

    #[test]
    fn short_plan_is_padded() {
        let schedule = DailySchedule::from_hourly(vec![ScheduleEntry::new("sleeping", 480)]);
        assert_eq!(schedule.total_minutes(), MINUTES_PER_DAY);
        assert_eq!(schedule.entries().len(), 1);
        let empty = DailySchedule::from_hourly(Vec::new());
        assert_eq!(empty.entries(), &[ScheduleEntry::new(PAD_TASK, MINUTES_PER_DAY)]);
    }

    #[test]
    fn long_plan_is_trimmed() {
        let schedule = DailySchedule::from_hourly(vec![
            ScheduleEntry::new("sleeping", 1000),
            ScheduleEntry::new("reading", 400),
            ScheduleEntry::new("party", 100),
        ]);
        assert_eq!(schedule.total_minutes(), MINUTES_PER_DAY);
        assert_eq!(schedule.entries().last().unwrap().minutes, 40);
    }

    #[test]
    fn index_uses_cumulative_end() {
        let schedule = hourly_day();
        assert_eq!(schedule.index_at(0), Some(0));
        assert_eq!(schedule.index_at(419), Some(0));
        assert_eq!(schedule.index_at(420), Some(1));
        assert_eq!(schedule.index_at(MINUTES_PER_DAY), None);
        assert_eq!(schedule.start_minute(2), 480);
    }

    #[test]
    fn decompose_keeps_total() {
        let mut schedule = hourly_day();
        schedule.decompose(
            2,
            vec![
                ScheduleEntry::new("open the register", 15),
                ScheduleEntry::new("brew coffee", 30),
            ],
        );
        assert_eq!(schedule.total_minutes(), MINUTES_PER_DAY);
        assert_eq!(
            schedule.entry(2).unwrap().task,
            "working at the cafe (open the register)"
        );
        assert_eq!(schedule.entry(3).unwrap().minutes, 225);
    }

    #[test]
    fn reaction_window_spans_long_block() {
        let schedule = hourly_day();
        assert_eq!(schedule.reaction_window(500), (8, 12));
        assert_eq!(schedule.reaction_window(430), (7, 12));
    }

    #[test]
    fn splice_preserves_day_and_marks_en_route() {
        let mut schedule = hourly_day();
        schedule.decompose(
            2,
            vec![
                ScheduleEntry::new("open the register", 30),
                ScheduleEntry::new("brew coffee", 210),
            ],
        );
        let now = 8 * 60 + 45;
        let window = schedule.reaction_window(now);
        schedule
            .splice_reaction(now, "chat with Klaus", 20, window, |request| {
                assert_eq!(request.inserted.task, "working at the cafe (chat with Klaus)");
                Some(vec![ScheduleEntry::new("working at the cafe (serve customers)", 10)])
            })
            .unwrap();

        assert_eq!(schedule.total_minutes(), MINUTES_PER_DAY);
        let tasks: Vec<&str> = schedule.entries().iter().map(|e| e.task.as_str()).collect();
        assert!(tasks.contains(&"working at the cafe (en route to brew coffee)"));
        let chat = schedule.index_at(now).unwrap();
        assert_eq!(
            schedule.entry(chat).unwrap().task,
            "working at the cafe (chat with Klaus)"
        );
    }

    #[test]
    fn splice_falls_back_when_revision_missing() {
        let mut schedule = hourly_day();
        let now = 600;
        let window = schedule.reaction_window(now);
        schedule
            .splice_reaction(now, "wait for the kettle", 10, window, |_| None)
            .unwrap();
        assert_eq!(schedule.total_minutes(), MINUTES_PER_DAY);
        let idx = schedule.index_at(now).unwrap();
        assert_eq!(schedule.entry(idx).unwrap().task, "wait for the kettle");
        let after = schedule.entry(idx + 1).unwrap();
        assert_eq!(after.task, "working at the cafe");
    }

    #[test]
    fn stale_window_is_widened_to_fit_the_reaction() {
        let mut schedule = hourly_day();
        let now = 540;
        schedule
            .splice_reaction(now, "chat with Klaus", 20, (7, 8), |_| None)
            .unwrap();
        assert_eq!(schedule.total_minutes(), MINUTES_PER_DAY);
        let chat = schedule.entry(schedule.index_at(now).unwrap()).unwrap();
        assert_eq!(chat.task, "chat with Klaus");
        assert_eq!(chat.minutes, 20);
        assert_eq!(
            schedule.entry(schedule.index_at(539).unwrap()).unwrap().task,
            "en route to working at the cafe"
        );
    }

    #[test]
    fn reaction_after_the_day_leaves_schedule_alone() {
        let mut schedule = hourly_day();
        let before = schedule.entries().to_vec();
        let window = schedule.reaction_window(MINUTES_PER_DAY);
        schedule
            .splice_reaction(MINUTES_PER_DAY, "late chat", 15, window, |_| None)
            .unwrap();
        assert_eq!(schedule.entries(), before.as_slice());
    }

    #[test]
    fn oversized_insert_is_clipped_to_window() {
        let mut schedule = hourly_day();
        let window = schedule.reaction_window(430);
        schedule
            .splice_reaction(430, "long chat", 5000, window, |_| None)
            .unwrap();
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn summary_lists_start_times() {
        let schedule = hourly_day();
        let summary = schedule.summary();
        assert!(summary.starts_with("00:00 || sleeping"));
        assert!(summary.contains("07:00 || morning routine"));
    }
}
