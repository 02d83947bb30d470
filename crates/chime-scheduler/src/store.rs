use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chime_core::reminder::ReminderDef;
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, SchedulerError},
    evaluate::{self, Decision, FallbackPolicy, Trigger},
    record::ReminderRecord,
};

/// A reminder that fired during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired {
    pub name: String,
    pub trigger: Trigger,
}

/// The single canonical collection of reminder records.
///
/// Cloning the store clones the handle, not the records: the scheduler loop
/// and the control surface see the same state. One coarse lock guards the
/// whole collection, so an acknowledgment can never interleave with a
/// half-finished evaluation.
#[derive(Debug, Clone, Default)]
pub struct ReminderStore {
    records: Arc<Mutex<Vec<ReminderRecord>>>,
}

impl ReminderStore {
    pub fn new(records: Vec<ReminderRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Build records from configuration, keeping declaration order.
    ///
    /// Entries with an invalid rule or a name already taken are skipped with
    /// a warning; the rest still load.
    pub fn from_definitions(defs: &[ReminderDef]) -> Self {
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(defs.len());
        for def in defs {
            if !seen.insert(def.name.clone()) {
                let e = SchedulerError::DuplicateReminder {
                    name: def.name.clone(),
                };
                warn!(reminder = %def.name, "skipping definition: {e}");
                continue;
            }
            match ReminderRecord::from_def(def) {
                Ok(record) => {
                    info!(reminder = %record.name, rule = %record.rule, "scheduling reminder");
                    records.push(record);
                }
                Err(e) => warn!(reminder = %def.name, "skipping definition: {e}"),
            }
        }
        Self::new(records)
    }

    // Records only see plain field stores, so a poisoned lock still guards
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, Vec<ReminderRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies of every record, in declaration order.
    pub fn snapshot(&self) -> Vec<ReminderRecord> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Result<ReminderRecord> {
        self.with_record(id, |r| r.clone())
    }

    /// Run `f` against the record named `id` while holding the lock.
    pub fn with_record<T>(&self, id: &str, f: impl FnOnce(&mut ReminderRecord) -> T) -> Result<T> {
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|r| r.name == id)
            .ok_or_else(|| SchedulerError::ReminderNotFound { id: id.to_string() })?;
        Ok(f(record))
    }

    /// Acknowledge `id` for the current cycle. Calling it twice is the same
    /// as calling it once.
    pub fn mark_done(&self, id: &str) -> Result<()> {
        let changed = self.with_record(id, ReminderRecord::acknowledge)?;
        if changed {
            info!(reminder = %id, "task marked as done");
        } else {
            debug!(reminder = %id, "task already marked as done");
        }
        Ok(())
    }

    /// Withdraw an acknowledgment made earlier in the cycle.
    pub fn reopen(&self, id: &str, now: NaiveDateTime) -> Result<()> {
        if self.with_record(id, |r| r.reopen(now))? {
            info!(reminder = %id, "task reopened");
        }
        Ok(())
    }

    /// URL configured for `id`, if any.
    pub fn url_for(&self, id: &str) -> Result<Option<String>> {
        self.with_record(id, |r| r.url.clone())
    }

    /// Evaluate and commit every record against `now` under one lock
    /// acquisition. Returns the records that fired, in declaration order.
    pub fn step_all(&self, now: NaiveDateTime, policy: &FallbackPolicy) -> Vec<Fired> {
        let mut records = self.lock();
        records
            .iter_mut()
            .filter_map(|record| match evaluate::step(record, now, policy) {
                Decision::Fire(trigger) => Some(Fired {
                    name: record.name.clone(),
                    trigger,
                }),
                Decision::Skip | Decision::Reschedule(_) => None,
            })
            .collect()
    }

    /// Clear every acknowledgment and pending re-notify. Returns the number
    /// of records that were acknowledged before the reset.
    pub fn reset_all(&self) -> usize {
        let mut records = self.lock();
        let acknowledged = records.iter().filter(|r| r.completed).count();
        records.iter_mut().for_each(ReminderRecord::reset);
        acknowledged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn def(name: &str, days: &[&str], time: &str) -> ReminderDef {
        ReminderDef {
            name: name.to_string(),
            days: days.iter().map(|d| d.to_string()).collect(),
            time: time.to_string(),
            url: None,
        }
    }

    fn mon(hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    #[test]
    fn invalid_and_duplicate_definitions_are_skipped() {
        let store = ReminderStore::from_definitions(&[
            def("standup", &["monday"], "09:00"),
            def("broken", &["monday"], "9 o'clock"),
            def("standup", &["friday"], "10:00"),
            def("retro", &["friday"], "15:00"),
        ]);
        let names: Vec<String> = store.snapshot().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["standup", "retro"]);
        // First definition wins.
        assert_eq!(store.get("standup").unwrap().rule.to_string(), "mon at 09:00");
    }

    #[test]
    fn unknown_id_is_reported() {
        let store = ReminderStore::from_definitions(&[def("standup", &["monday"], "09:00")]);
        assert!(matches!(
            store.mark_done("nope"),
            Err(SchedulerError::ReminderNotFound { .. })
        ));
        assert!(store.url_for("nope").is_err());
        assert!(!store.get("standup").unwrap().completed);
    }

    #[test]
    fn clones_share_records() {
        let store = ReminderStore::from_definitions(&[def("standup", &["monday"], "09:00")]);
        let ui_handle = store.clone();
        ui_handle.mark_done("standup").unwrap();
        ui_handle.mark_done("standup").unwrap();
        assert!(store.get("standup").unwrap().completed);
    }

    #[test]
    fn step_all_fires_each_due_record_once() {
        let store = ReminderStore::from_definitions(&[
            def("standup", &["monday"], "09:00"),
            def("retro", &["friday"], "15:00"),
            def("coffee", &["monday"], "08:30"),
        ]);
        let policy = FallbackPolicy {
            hourly_safety_net: false,
            ..FallbackPolicy::default()
        };
        let fired = store.step_all(mon(9, 1), &policy);
        let names: Vec<&str> = fired.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["standup", "coffee"]);
        assert!(store.step_all(mon(9, 1), &policy).is_empty());
    }

    #[test]
    fn reset_all_clears_acknowledgments() {
        let store = ReminderStore::from_definitions(&[
            def("standup", &["monday"], "09:00"),
            def("retro", &["friday"], "15:00"),
        ]);
        store.mark_done("standup").unwrap();
        assert_eq!(store.reset_all(), 1);
        assert!(store.snapshot().iter().all(|r| !r.completed));
    }

    #[test]
    fn empty_store_is_usable() {
        let store = ReminderStore::from_definitions(&[]);
        assert!(store.is_empty());
        assert!(store
            .step_all(mon(12, 0), &FallbackPolicy::default())
            .is_empty());
        assert_eq!(store.reset_all(), 0);
    }
}
