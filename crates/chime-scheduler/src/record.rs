use chime_core::reminder::ReminderDef;
use chrono::{NaiveDate, NaiveDateTime};

use crate::{error::Result, rule::RecurrenceRule};

/// A live reminder: its rule plus acknowledgment and re-notify bookkeeping.
///
/// Records are owned by the [`ReminderStore`](crate::store::ReminderStore) and
/// mutated only while its lock is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRecord {
    /// Unique, human-readable identifier. Control actions address it by name.
    pub name: String,
    pub rule: RecurrenceRule,
    /// Page for the `open` action. `None` means there is nothing to open.
    pub url: Option<String>,
    /// Acknowledged for the current cycle.
    pub completed: bool,
    /// When the next re-notify is due if the reminder is still unacknowledged.
    pub next_fallback_check: Option<NaiveDateTime>,
    /// Date whose scheduled occurrence has already fired.
    pub last_occurrence: Option<NaiveDate>,
    /// Hour slot (HH:00) that has already produced a safety-net fire.
    pub last_hourly: Option<NaiveDateTime>,
    /// Total number of fires since process start.
    pub fire_count: u32,
    pub last_fired: Option<NaiveDateTime>,
}

impl ReminderRecord {
    pub fn new(name: impl Into<String>, rule: RecurrenceRule, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            rule,
            url,
            completed: false,
            next_fallback_check: None,
            last_occurrence: None,
            last_hourly: None,
            fire_count: 0,
            last_fired: None,
        }
    }

    /// Validate a configuration entry and turn it into a fresh record.
    pub fn from_def(def: &ReminderDef) -> Result<Self> {
        let rule = RecurrenceRule::parse(&def.days, &def.time)?;
        let url = def.url.clone().filter(|u| !u.trim().is_empty());
        Ok(Self::new(def.name.clone(), rule, url))
    }

    /// Mark done for this cycle. Idempotent.
    ///
    /// Returns `true` if the record was not already acknowledged.
    pub fn acknowledge(&mut self) -> bool {
        let changed = !self.completed;
        self.completed = true;
        self.next_fallback_check = None;
        changed
    }

    /// Undo an acknowledgment made at or before `now`.
    ///
    /// If today's occurrence has already fired it is re-armed, so the next
    /// tick notifies again instead of waiting for the hourly net.
    pub fn reopen(&mut self, now: NaiveDateTime) -> bool {
        if !self.completed {
            return false;
        }
        self.completed = false;
        if self.last_occurrence == Some(now.date()) {
            self.last_occurrence = None;
        }
        true
    }

    /// Daily rollover: start a new cycle.
    pub fn reset(&mut self) {
        self.completed = false;
        self.next_fallback_check = None;
    }
}
