//! Due-time evaluation: a pure function of (record, now, policy).
//!
//! Three independent triggers can make an unacknowledged reminder fire:
//!
//! | Trigger     | Condition                                                     |
//! |-------------|---------------------------------------------------------------|
//! | `Scheduled` | rule matches now, today's occurrence not fired, no fallback pending |
//! | `Fallback`  | a re-notify is pending and its time has come                  |
//! | `Hourly`    | top of the hour, safety net enabled, this hour not fired yet  |
//!
//! Whatever number of triggers hold, a single tick yields at most one
//! [`Decision::Fire`] per record.

use chime_core::config::{SchedulerConfig, MAX_RENOTIFY_AFTER_SECS};
use chrono::{Duration, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::{
    error::{Result, SchedulerError},
    record::ReminderRecord,
    rule::TimeOfDay,
};

/// Re-notify cadence and daily rollover time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    /// Delay between a fire and the next re-notify attempt.
    pub renotify_after: Duration,
    pub hourly_safety_net: bool,
    /// Local time at which every acknowledgment is cleared.
    pub rollover: TimeOfDay,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            renotify_after: Duration::minutes(1),
            hourly_safety_net: true,
            rollover: TimeOfDay::LAST_MINUTE,
        }
    }
}

impl FallbackPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        let secs = config.renotify_after_secs;
        let renotify_after = (1..=MAX_RENOTIFY_AFTER_SECS)
            .contains(&secs)
            .then(|| i64::try_from(secs).ok().and_then(Duration::try_seconds))
            .flatten()
            .ok_or_else(|| {
                SchedulerError::InvalidPolicy(format!(
                    "renotify_after_secs = {secs}, expected 1..={MAX_RENOTIFY_AFTER_SECS}"
                ))
            })?;
        Ok(Self {
            renotify_after,
            hourly_safety_net: config.hourly_safety_net,
            rollover: config.rollover.parse()?,
        })
    }
}

/// What caused a fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    Fallback,
    Hourly,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Scheduled => "scheduled",
            Trigger::Fallback => "fallback",
            Trigger::Hourly => "hourly",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one record at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do: not due yet, or acknowledged.
    Skip,
    /// Notify now.
    Fire(Trigger),
    /// Fired earlier and still unacknowledged; the next re-notify is at the
    /// given instant.
    Reschedule(NaiveDateTime),
}

/// Display classification used by listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    NotYetDue,
    Due,
    PendingRenotify,
    Done,
}

/// Which triggers hold for `record` at `now`, ignoring acknowledgment.
#[derive(Debug, Clone, Copy, Default)]
struct Triggers {
    occurrence_due: bool,
    scheduled: bool,
    fallback: bool,
    hourly: bool,
}

fn hour_slot(now: NaiveDateTime) -> NaiveDateTime {
    now.date().and_hms_opt(now.hour(), 0, 0).unwrap_or(now)
}

fn triggers(record: &ReminderRecord, now: NaiveDateTime, policy: &FallbackPolicy) -> Triggers {
    let occurrence_due =
        record.rule.matches_at(now) && record.last_occurrence != Some(now.date());
    let fallback_pending = record.next_fallback_check.is_some();
    Triggers {
        occurrence_due,
        scheduled: occurrence_due && !fallback_pending,
        fallback: record.next_fallback_check.is_some_and(|at| now >= at),
        hourly: policy.hourly_safety_net
            && now.minute() == 0
            && record.last_hourly != Some(hour_slot(now)),
    }
}

/// Decide what to do with `record` at `now`. Pure.
pub fn evaluate(record: &ReminderRecord, now: NaiveDateTime, policy: &FallbackPolicy) -> Decision {
    if record.completed {
        return Decision::Skip;
    }
    let t = triggers(record, now, policy);
    if t.scheduled {
        Decision::Fire(Trigger::Scheduled)
    } else if t.fallback {
        Decision::Fire(Trigger::Fallback)
    } else if t.hourly {
        Decision::Fire(Trigger::Hourly)
    } else if let Some(at) = record.next_fallback_check {
        Decision::Reschedule(at)
    } else {
        Decision::Skip
    }
}

/// Apply a decision's bookkeeping to `record`.
///
/// A fire consumes every trigger that held at `now`, so the same minute's
/// occurrence or hour slot cannot fire a second time. Scheduled and fallback
/// fires arm the next re-notify; a safety-net fire leaves it alone.
pub fn commit(
    record: &mut ReminderRecord,
    decision: Decision,
    now: NaiveDateTime,
    policy: &FallbackPolicy,
) {
    let Decision::Fire(trigger) = decision else {
        return;
    };
    let t = triggers(record, now, policy);
    if t.occurrence_due {
        record.last_occurrence = Some(now.date());
    }
    if now.minute() == 0 {
        record.last_hourly = Some(hour_slot(now));
    }
    if trigger != Trigger::Hourly {
        // An unrepresentable instant ends the chain.
        record.next_fallback_check = now.checked_add_signed(policy.renotify_after);
    }
    record.fire_count = record.fire_count.saturating_add(1);
    record.last_fired = Some(now);
}

/// Evaluate and commit in one step. Callers hold the store lock, so the two
/// halves are atomic with respect to acknowledgments.
pub fn step(record: &mut ReminderRecord, now: NaiveDateTime, policy: &FallbackPolicy) -> Decision {
    let decision = evaluate(record, now, policy);
    commit(record, decision, now, policy);
    decision
}

pub fn classify(record: &ReminderRecord, now: NaiveDateTime) -> ReminderStatus {
    if record.completed {
        ReminderStatus::Done
    } else if record.next_fallback_check.is_some() {
        ReminderStatus::PendingRenotify
    } else if record.rule.matches_at(now) && record.last_occurrence != Some(now.date()) {
        ReminderStatus::Due
    } else {
        ReminderStatus::NotYetDue
    }
}
