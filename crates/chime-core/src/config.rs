use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_TICK_SECS: u64 = 1;
pub const DEFAULT_RENOTIFY_AFTER_SECS: u64 = 60;
/// Upper bound for `renotify_after_secs`; the daily rollover ends every
/// chain before a longer delay could elapse.
pub const MAX_RENOTIFY_AFTER_SECS: u64 = 86_400;
pub const DEFAULT_ROLLOVER: &str = "23:59";
pub const DEFAULT_BROWSER: &str = "xdg-open";

/// Top-level config (chime.toml + CHIME_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChimeConfig {
    /// JSON file holding the reminder definitions.
    #[serde(default = "default_reminders_path")]
    pub reminders_path: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

impl Default for ChimeConfig {
    fn default() -> Self {
        Self {
            reminders_path: default_reminders_path(),
            scheduler: SchedulerConfig::default(),
            notify: NotifyConfig::default(),
            browser: BrowserConfig::default(),
            control: ControlConfig::default(),
        }
    }
}

/// Tick cadence and re-notify policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between ticks. 1 for interactive use, 60 for low overhead.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Delay before an unacknowledged reminder fires again.
    #[serde(default = "default_renotify_after_secs")]
    pub renotify_after_secs: u64,
    /// Fire every incomplete reminder at the top of each hour.
    #[serde(default = "bool_true")]
    pub hourly_safety_net: bool,
    /// Local "HH:MM" at which every acknowledgment is cleared.
    #[serde(default = "default_rollover")]
    pub rollover: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            renotify_after_secs: DEFAULT_RENOTIFY_AFTER_SECS,
            hourly_safety_net: true,
            rollover: DEFAULT_ROLLOVER.to_string(),
        }
    }
}

/// Notification sink. With no command, notifications only go to the log.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    /// Program invoked as `<command> [args..] <title> <body>`, e.g. `notify-send`.
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Program invoked as `<command> [args..] <url>`.
    #[serde(default = "default_browser")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            command: default_browser(),
            args: Vec::new(),
        }
    }
}

/// Local HTTP control surface (list / done / open / stop).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}
fn default_renotify_after_secs() -> u64 {
    DEFAULT_RENOTIFY_AFTER_SECS
}
fn default_rollover() -> String {
    DEFAULT_ROLLOVER.to_string()
}
fn default_browser() -> String {
    DEFAULT_BROWSER.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_reminders_path() -> String {
    format!("{}/.chime/reminders.json", home_dir())
}

impl ChimeConfig {
    /// Load config from a TOML file with CHIME_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.chime/chime.toml
    ///
    /// A missing file is not an error; every section has defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: ChimeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CHIME_").split("__"))
            .extract()
            .map_err(|e| crate::error::ChimeError::Config(e.to_string()))?;

        config.reminders_path = expand_home(&config.reminders_path);
        if config.scheduler.tick_secs == 0 {
            return Err(crate::error::ChimeError::Config(
                "scheduler.tick_secs must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_RENOTIFY_AFTER_SECS).contains(&config.scheduler.renotify_after_secs) {
            return Err(crate::error::ChimeError::Config(format!(
                "scheduler.renotify_after_secs must be between 1 and {MAX_RENOTIFY_AFTER_SECS}"
            )));
        }
        Ok(config)
    }
}

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
}

fn default_config_path() -> String {
    format!("{}/.chime/chime.toml", home_dir())
}

/// Replace a leading `~/` with `$HOME/`.
pub fn expand_home(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => format!("{}/{}", home_dir(), rest),
        None => path.to_string(),
    }
}
