use std::process::Stdio;

use async_trait::async_trait;
use chime_core::config::BrowserConfig;
use tokio::process::Command;
use tracing::info;

use crate::error::NotifyError;

/// Opens a reminder's URL for the user.
#[async_trait]
pub trait UrlOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), NotifyError>;
}

/// Launches a browser program as `<program> [args..] <url>` and leaves it
/// running; the browser's lifetime is not tied to the daemon's.
#[derive(Debug, Clone)]
pub struct CommandOpener {
    program: String,
    args: Vec<String>,
}

impl CommandOpener {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

#[async_trait]
impl UrlOpener for CommandOpener {
    async fn open(&self, url: &str) -> Result<(), NotifyError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| NotifyError::SpawnFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;
        info!(program = %self.program, pid = child.id(), %url, "browser launched");
        Ok(())
    }
}
