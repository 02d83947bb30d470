//! `chime-core`: configuration, error type and reminder definitions shared by
//! the scheduler, the notification sinks and the daemon.

pub mod config;
pub mod error;
pub mod reminder;

pub use config::ChimeConfig;
pub use error::{ChimeError, Result};
pub use reminder::{Notification, ReminderDef};
