//! Spaced-repetition model
//!
//! A schedule is an ordered sequence of review intervals. A task's position in
//! that sequence is its *level*. Everything here is a pure function of the
//! schedule and its arguments; nothing reads action logs.

use crate::error::ScheduleError;
use crate::identity::DurationMillis;
use crate::log::RepetitionOutcome;
use serde::{Deserialize, Serialize};

pub const MINUTE_MILLIS: DurationMillis = 60 * 1000;
pub const DAY_MILLIS: DurationMillis = 24 * 60 * MINUTE_MILLIS;

/// Named built-in schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Same intervals as [`ScheduleKind::AggressiveStart`].
    #[default]
    Default,
    /// Starts at an in-text review, then spaces out from 5 days.
    AggressiveStart,
    /// Starts at 10 minutes.
    Original,
}

/// One level of a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalEntry {
    pub interval_millis: DurationMillis,
    pub label: String,
}

impl IntervalEntry {
    pub fn new(interval_millis: DurationMillis, label: impl Into<String>) -> Self {
        Self {
            interval_millis,
            label: label.into(),
        }
    }
}

/// A validated interval sequence: at least two levels, non-negative and
/// non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    entries: Vec<IntervalEntry>,
}

impl Schedule {
    pub fn new(entries: Vec<IntervalEntry>) -> Result<Self, ScheduleError> {
        if entries.len() < 2 {
            return Err(ScheduleError::TooFewLevels {
                levels: entries.len(),
            });
        }
        for (level, entry) in entries.iter().enumerate() {
            if entry.interval_millis < 0 {
                return Err(ScheduleError::NegativeInterval {
                    level,
                    interval_millis: entry.interval_millis,
                });
            }
            if level > 0 && entry.interval_millis < entries[level - 1].interval_millis {
                return Err(ScheduleError::DecreasingInterval {
                    level,
                    interval_millis: entry.interval_millis,
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn for_kind(kind: ScheduleKind) -> Self {
        let entries = match kind {
            ScheduleKind::Default | ScheduleKind::AggressiveStart => vec![
                IntervalEntry::new(0, "In-text"),
                IntervalEntry::new(5 * DAY_MILLIS, "5 days"),
                IntervalEntry::new(14 * DAY_MILLIS, "2 weeks"),
                IntervalEntry::new(31 * DAY_MILLIS, "1 month"),
                IntervalEntry::new(62 * DAY_MILLIS, "2 months"),
                IntervalEntry::new(124 * DAY_MILLIS, "Long-term"),
            ],
            ScheduleKind::Original => vec![
                IntervalEntry::new(10 * MINUTE_MILLIS, "Soon"),
                IntervalEntry::new(DAY_MILLIS, "1 day"),
                IntervalEntry::new(3 * DAY_MILLIS, "3 days"),
                IntervalEntry::new(7 * DAY_MILLIS, "1 week"),
                IntervalEntry::new(14 * DAY_MILLIS, "2 weeks"),
                IntervalEntry::new(31 * DAY_MILLIS, "1 month"),
                IntervalEntry::new(62 * DAY_MILLIS, "2 months"),
                IntervalEntry::new(124 * DAY_MILLIS, "4 months"),
            ],
        };
        Self { entries }
    }

    pub fn entries(&self) -> &[IntervalEntry] {
        &self.entries
    }

    /// Number of levels.
    pub fn levels(&self) -> usize {
        self.entries.len()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    /// Spacing assigned on first exposure: level 1, not level 0.
    pub fn initial_interval(&self) -> DurationMillis {
        self.entries[1].interval_millis
    }

    /// Interval of `level`, clamped to the last level.
    pub fn interval_for_level(&self, level: usize) -> DurationMillis {
        let level = level.min(self.entries.len() - 1);
        self.entries[level].interval_millis
    }

    /// Reverse lookup of an interval's level.
    ///
    /// An interval of 0 is always level 0 ("never yet spaced"), even when the
    /// schedule's first interval is larger. An exact match returns that level.
    /// Otherwise the largest level whose interval does not exceed `interval`.
    pub fn level_for_interval(&self, interval: DurationMillis) -> Result<usize, ScheduleError> {
        if interval == 0 {
            return Ok(0);
        }
        if let Some(level) = self
            .entries
            .iter()
            .rposition(|e| e.interval_millis == interval)
        {
            return Ok(level);
        }

        let mut closest: Option<usize> = None;
        for (level, entry) in self.entries.iter().enumerate() {
            if entry.interval_millis <= interval
                && closest.map_or(true, |c| self.entries[c].interval_millis < entry.interval_millis)
            {
                closest = Some(level);
            }
        }
        closest.ok_or(ScheduleError::IntervalBelowSchedule {
            interval_millis: interval,
        })
    }

    /// Level a task moves to after a review at `level`.
    pub fn next_level(
        &self,
        level: usize,
        outcome: RepetitionOutcome,
        currently_needs_retry: bool,
        supports_retry: bool,
    ) -> usize {
        match outcome {
            RepetitionOutcome::Remembered if currently_needs_retry && level > 0 => level,
            RepetitionOutcome::Remembered => (level + 1).min(self.entries.len() - 1),
            RepetitionOutcome::Forgotten if level <= 1 => {
                if supports_retry {
                    level
                } else {
                    1
                }
            }
            RepetitionOutcome::Forgotten => level - 1,
        }
    }

    /// Interval assigned after a review at `level`.
    pub fn next_interval(
        &self,
        level: usize,
        outcome: RepetitionOutcome,
        currently_needs_retry: bool,
        supports_retry: bool,
    ) -> DurationMillis {
        self.interval_for_level(self.next_level(
            level,
            outcome,
            currently_needs_retry,
            supports_retry,
        ))
    }

    /// Mean level of a collection of intervals. Empty input is level 0.
    pub fn average_level(&self, intervals: &[DurationMillis]) -> Result<f64, ScheduleError> {
        if intervals.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0usize;
        for interval in intervals {
            total += self.level_for_interval(*interval)?;
        }
        Ok(total as f64 / intervals.len() as f64)
    }

    /// Interval at the average level, interpolated exponentially between the
    /// neighbouring integer levels. Used for review-summary copy.
    pub fn log_average_interval(&self, intervals: &[DurationMillis]) -> Result<f64, ScheduleError> {
        Ok(self.interval_for_continuous_level(self.average_level(intervals)?))
    }

    fn interval_for_continuous_level(&self, level: f64) -> f64 {
        let last = self.entries.len() - 1;
        if level >= last as f64 {
            return self.entries[last].interval_millis as f64;
        }

        let base_level = level.floor();
        let next_level = base_level + 1.0;
        let low = self.entries[base_level as usize].interval_millis as f64;
        let high = self.entries[next_level as usize].interval_millis as f64;
        if high == low {
            return low;
        }

        // exp(level - h) + k passes through (base, low) and (next, high)
        let h = ((next_level.exp() - base_level.exp()) / (high - low)).ln();
        let k = low - (base_level - h).exp();
        (level - h).exp() + k
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::for_kind(ScheduleKind::Default)
    }
}

impl From<ScheduleKind> for Schedule {
    fn from(kind: ScheduleKind) -> Self {
        Self::for_kind(kind)
    }
}
