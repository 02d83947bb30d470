//! Shared fixtures for handler and action tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chime_core::config::ChimeConfig;
use chime_core::reminder::ReminderDef;
use chime_notify::{NotifyError, UrlOpener};
use chime_scheduler::{ManualClock, ReminderStore};
use chrono::NaiveDate;
use tokio::sync::watch;

use crate::app::AppState;

#[derive(Default)]
pub struct FakeOpener {
    pub opened: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl UrlOpener for FakeOpener {
    async fn open(&self, url: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::SpawnFailed {
                program: "fake-browser".to_string(),
                reason: "no display".to_string(),
            });
        }
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Two reminders, "standup" with a URL and "water" without, and a clock
/// parked at Monday 2024-01-01 09:30.
pub fn state_with(opener: Arc<dyn UrlOpener>) -> (AppState, watch::Receiver<bool>) {
    let defs = vec![
        ReminderDef {
            name: "standup".to_string(),
            days: ["mon", "tue", "wed", "thu", "fri"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            time: "09:00".to_string(),
            url: Some("https://meet.example.com/standup".to_string()),
        },
        ReminderDef {
            name: "water".to_string(),
            days: vec!["sat".to_string()],
            time: "10:00".to_string(),
            url: None,
        },
    ];
    let now = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let (tx, rx) = watch::channel(false);
    let state = AppState::new(
        ChimeConfig::default(),
        ReminderStore::from_definitions(&defs),
        opener,
        Arc::new(ManualClock::new(now)),
        tx,
    );
    (state, rx)
}
