use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A day name or time string could not be turned into a recurrence rule.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Scheduler settings outside their supported range.
    #[error("Invalid scheduler policy: {0}")]
    InvalidPolicy(String),

    /// No reminder with the given id exists in the store.
    #[error("Reminder not found: {id}")]
    ReminderNotFound { id: String },

    /// Two definitions share the same name.
    #[error("Duplicate reminder: {name}")]
    DuplicateReminder { name: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
