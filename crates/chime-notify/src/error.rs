use thiserror::Error;

/// Errors raised while surfacing a notification or opening a URL.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The external program could not be started (missing binary, permissions).
    #[error("Spawn failed for `{program}`: {reason}")]
    SpawnFailed { program: String, reason: String },

    /// The external program ran but reported failure.
    #[error("`{program}` exited with status {code}: {stderr}")]
    CommandFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    /// The external program did not finish within its time budget.
    #[error("`{program}` timed out after {ms}ms")]
    Timeout { program: String, ms: u64 },

    /// The reminder has no URL to open.
    #[error("No URL provided for {reminder}")]
    NoUrl { reminder: String },
}
