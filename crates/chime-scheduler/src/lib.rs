//! `chime-scheduler`: reminder state machine and Tokio tick loop.
//!
//! # Overview
//!
//! Each reminder is a [`ReminderRecord`] held in the shared [`ReminderStore`].
//! The [`SchedulerEngine`] reads the local wall clock on a fixed tick, runs
//! the due-time evaluator over every record under one lock, forwards a
//! notification for every fire, and clears all acknowledgments once a day at
//! the rollover time.
//!
//! # Fire triggers
//!
//! | Trigger     | Behaviour                                                   |
//! |-------------|-------------------------------------------------------------|
//! | `Scheduled` | first tick at or after the rule's day + time, once per day  |
//! | `Fallback`  | re-notify `renotify_after` after each fire until acknowledged |
//! | `Hourly`    | top of every hour for any unacknowledged reminder           |

pub mod clock;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod record;
pub mod rule;
pub mod store;

pub use clock::{Clock, LocalClock, ManualClock};
pub use engine::{SchedulerEngine, TickOutcome};
pub use error::{Result, SchedulerError};
pub use evaluate::{classify, evaluate, Decision, FallbackPolicy, ReminderStatus, Trigger};
pub use record::ReminderRecord;
pub use rule::{RecurrenceRule, TimeOfDay};
pub use store::{Fired, ReminderStore};
