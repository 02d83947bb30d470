use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::error::{Result, SchedulerError};

/// A local time of day with minute resolution, written "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// 23:59, the default rollover time.
    pub const LAST_MINUTE: TimeOfDay = TimeOfDay {
        hour: 23,
        minute: 59,
    };

    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(SchedulerError::InvalidRule(format!(
                "time {hour:02}:{minute:02} is outside 00:00-23:59"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Truncate a wall-clock time to its minute.
    pub fn of(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        // hour/minute are range-checked on construction.
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for TimeOfDay {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SchedulerError::InvalidRule(format!("expected \"HH:MM\", got {s:?}"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Parse a weekday name. Accepts full English names and three-letter forms,
/// in any case.
pub fn parse_weekday(name: &str) -> Result<Weekday> {
    Weekday::from_str(name.trim())
        .map_err(|_| SchedulerError::InvalidRule(format!("unknown weekday {name:?}")))
}

/// Days of the week plus a time of day. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    /// Sorted Monday-first, no duplicates, never empty.
    days: Vec<Weekday>,
    time_of_day: TimeOfDay,
}

impl RecurrenceRule {
    pub fn new(days: impl IntoIterator<Item = Weekday>, time_of_day: TimeOfDay) -> Result<Self> {
        let mut days: Vec<Weekday> = days.into_iter().collect();
        days.sort_by_key(|d| d.num_days_from_monday());
        days.dedup();
        if days.is_empty() {
            return Err(SchedulerError::InvalidRule(
                "a rule needs at least one day".to_string(),
            ));
        }
        Ok(Self { days, time_of_day })
    }

    /// Build a rule from configuration strings, e.g. `(["monday"], "09:00")`.
    pub fn parse<S: AsRef<str>>(days: &[S], time: &str) -> Result<Self> {
        let days = days
            .iter()
            .map(|d| parse_weekday(d.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(days, time.parse()?)
    }

    pub fn days(&self) -> &[Weekday] {
        &self.days
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day
    }

    /// True once the scheduled time has passed on one of the rule's days.
    ///
    /// `>=` rather than `==` so a tick that arrives late (process asleep,
    /// coarse tick) still catches up on the same day.
    pub fn matches(&self, day: Weekday, time: TimeOfDay) -> bool {
        self.days.contains(&day) && time >= self.time_of_day
    }

    pub fn matches_at(&self, at: NaiveDateTime) -> bool {
        self.matches(at.weekday(), TimeOfDay::of(at.time()))
    }

    /// First scheduled instant strictly after `after`.
    pub fn next_occurrence(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        (0..=7).find_map(|offset| {
            let date = after.date() + Duration::days(offset);
            if !self.days.contains(&date.weekday()) {
                return None;
            }
            let candidate = date.and_time(self.time_of_day.as_naive_time());
            (candidate > after).then_some(candidate)
        })
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self
            .days
            .iter()
            .map(|d| d.to_string().to_lowercase())
            .collect();
        write!(f, "{} at {}", days.join(","), self.time_of_day)
    }
}
