use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chime_core::config::ChimeConfig;
use chime_notify::UrlOpener;
use chime_scheduler::{Clock, ReminderStore};
use tokio::sync::watch;

/// Shared state handed to every Axum handler as `Arc<AppState>`.
pub struct AppState {
    pub config: ChimeConfig,
    /// The same store the scheduler engine ticks over.
    pub store: ReminderStore,
    pub opener: Arc<dyn UrlOpener>,
    /// Wall clock used for status classification in listings.
    pub clock: Arc<dyn Clock>,
    /// Broadcasts `true` to the engine, the delivery task and the HTTP server.
    pub shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(
        config: ChimeConfig,
        store: ReminderStore,
        opener: Arc<dyn UrlOpener>,
        clock: Arc<dyn Clock>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            config,
            store,
            opener,
            clock,
            shutdown,
        }
    }
}

/// Assemble the control-surface router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::ui::ui_handler))
        .route("/health", get(crate::http::health::health_handler))
        .route("/reminders", get(crate::http::reminders::list_handler))
        .route(
            "/reminders/{name}/done",
            post(crate::http::reminders::done_handler),
        )
        .route(
            "/reminders/{name}/undo",
            post(crate::http::reminders::undo_handler),
        )
        .route(
            "/reminders/{name}/open",
            post(crate::http::reminders::open_handler),
        )
        .route("/stop", post(crate::http::control::stop_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
