use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chime_core::config::NotifyConfig;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::NotifyError;

/// Seconds an external notifier may run before it is killed.
const COMMAND_TIMEOUT_SECS: u64 = 10;

/// Surfaces a notification to the user.
///
/// Implementations must be `Send + Sync` so a single sink can be shared with
/// the delivery task. Delivery is fire-and-forget: the caller logs an error
/// and moves on, it never retries.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Stable lowercase identifier for logs (e.g. `"log"`, `"command"`).
    fn name(&self) -> &str;

    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log only. Used when no notifier is configured.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        info!(%title, %body, "notification");
        Ok(())
    }
}

/// Runs an external notifier such as `notify-send`, as
/// `<program> [args..] <title> <body>`.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(COMMAND_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl EventSink for CommandSink {
    fn name(&self) -> &str {
        "command"
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        debug!(program = %self.program, %title, "running notifier");
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NotifyError::SpawnFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| NotifyError::Timeout {
                program: self.program.clone(),
                ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| NotifyError::SpawnFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(NotifyError::CommandFailed {
                program: self.program.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Pick the sink described by `[notify]`: a command sink when a program is
/// configured, the log sink otherwise.
pub fn build_sink(config: &NotifyConfig) -> Box<dyn EventSink> {
    match config.command.as_deref().map(str::trim) {
        Some(program) if !program.is_empty() => {
            info!(%program, "notifications via external command");
            Box::new(CommandSink::new(program, config.args.clone()))
        }
        _ => {
            info!("no notifier configured, notifications go to the log");
            Box::new(LogSink)
        }
    }
}
