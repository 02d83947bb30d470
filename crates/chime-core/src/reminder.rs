//! Reminder definitions as they appear in `reminders.json`.
//!
//! ```json
//! [
//!   { "name": "standup", "days": ["monday", "friday"], "time": "09:00",
//!     "url": "https://meet.example.com/standup" }
//! ]
//! ```
//!
//! Only the structure is checked here. Day names and the time string are
//! validated when the scheduler turns a definition into a live record.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// One configured reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderDef {
    /// Unique, human-readable identifier. Also the id used by control actions.
    pub name: String,
    /// Lower-case English weekday names.
    pub days: Vec<String>,
    /// Local time of day, "HH:MM" 24-hour.
    pub time: String,
    /// Page opened by the `open` action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A fired reminder on its way from the scheduler loop to the event sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Name of the reminder that fired, used for logging.
    pub reminder: String,
    /// Notification title (the reminder name).
    pub title: String,
    /// Notification body.
    pub body: String,
    /// What caused the fire: `"scheduled"`, `"fallback"` or `"hourly"`.
    pub trigger: String,
    /// Local wall-clock time of the tick that fired it.
    pub fired_at: String,
}

impl Notification {
    pub fn for_reminder(name: &str, trigger: &str, fired_at: String) -> Self {
        Self {
            reminder: name.to_string(),
            title: name.to_string(),
            body: format!("Reminder: {name}"),
            trigger: trigger.to_string(),
            fired_at,
        }
    }
}

/// Parse a JSON array of reminder definitions.
pub fn parse_definitions(json: &str) -> Result<Vec<ReminderDef>> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse the definitions file at `path`.
pub fn load_definitions(path: impl AsRef<Path>) -> Result<Vec<ReminderDef>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    parse_definitions(&raw)
}

/// Like [`load_definitions`], but an unreadable or malformed file degrades to
/// an empty list with a logged diagnostic instead of an error.
pub fn load_definitions_or_empty(path: impl AsRef<Path>) -> Vec<ReminderDef> {
    let path = path.as_ref();
    match load_definitions(path) {
        Ok(defs) => {
            info!(path = %path.display(), count = defs.len(), "reminders loaded");
            defs
        }
        Err(e) => {
            warn!(path = %path.display(), code = e.code(), "error loading reminders: {e}");
            Vec::new()
        }
    }
}
