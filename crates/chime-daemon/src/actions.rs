//! Control actions addressed by reminder id: mark done, reopen, open, stop.
//!
//! Every user-facing surface (HTTP handlers, the web page, Ctrl-C) goes
//! through these functions rather than touching records directly.

use axum::http::StatusCode;
use chime_notify::NotifyError;
use chime_scheduler::SchedulerError;
use thiserror::Error;
use tracing::{info, warn};

use crate::app::AppState;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl ActionError {
    /// HTTP status for the control surface.
    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::Scheduler(SchedulerError::ReminderNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            ActionError::Scheduler(_) => StatusCode::BAD_REQUEST,
            ActionError::Notify(NotifyError::NoUrl { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ActionError::Notify(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Acknowledge `id` for the current cycle. Idempotent.
pub fn mark_done(app: &AppState, id: &str) -> Result<(), ActionError> {
    app.store.mark_done(id).map_err(|e| {
        warn!(reminder = %id, "mark_done ignored: {e}");
        ActionError::from(e)
    })
}

/// Withdraw an acknowledgment made earlier today.
pub fn reopen(app: &AppState, id: &str) -> Result<(), ActionError> {
    app.store.reopen(id, app.clock.now()).map_err(|e| {
        warn!(reminder = %id, "reopen ignored: {e}");
        ActionError::from(e)
    })
}

/// Open the URL configured for `id` in the browser.
///
/// The store lock is released before the browser is launched.
pub async fn open(app: &AppState, id: &str) -> Result<String, ActionError> {
    let url = app.store.url_for(id).map_err(|e| {
        warn!(reminder = %id, "open ignored: {e}");
        ActionError::from(e)
    })?;
    let Some(url) = url else {
        let e = NotifyError::NoUrl {
            reminder: id.to_string(),
        };
        info!(reminder = %id, "{e}");
        return Err(e.into());
    };

    info!(reminder = %id, %url, "opening website");
    app.opener.open(&url).await.map_err(|e| {
        warn!(reminder = %id, error = %e, "error opening website");
        ActionError::from(e)
    })?;
    Ok(url)
}

/// Signal every task to stop. Safe to call more than once.
pub fn stop(app: &AppState) {
    if *app.shutdown.borrow() {
        return;
    }
    info!("stop requested");
    // send_replace never fails, even with no live receivers.
    app.shutdown.send_replace(true);
}
