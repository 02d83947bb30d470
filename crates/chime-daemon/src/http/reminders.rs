use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chime_scheduler::{classify, ReminderRecord, ReminderStatus};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{json, Value};

use crate::actions::{self, ActionError};
use crate::app::AppState;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type HandlerResult = Result<Json<Value>, (StatusCode, Json<ErrorResponse>)>;

fn reject(e: ActionError) -> (StatusCode, Json<ErrorResponse>) {
    (
        e.status(),
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// One row of `GET /reminders`.
#[derive(Debug, Serialize)]
pub struct ReminderView {
    pub name: String,
    pub schedule: String,
    pub time: String,
    pub url: Option<String>,
    pub completed: bool,
    pub status: ReminderStatus,
    pub next_fallback_check: Option<String>,
    pub fire_count: u32,
    pub last_fired: Option<String>,
}

fn fmt(at: Option<NaiveDateTime>) -> Option<String> {
    at.map(|t| t.format(TIME_FORMAT).to_string())
}

impl ReminderView {
    fn of(record: &ReminderRecord, now: NaiveDateTime) -> Self {
        Self {
            name: record.name.clone(),
            schedule: record.rule.to_string(),
            time: record.rule.time_of_day().to_string(),
            url: record.url.clone(),
            completed: record.completed,
            status: classify(record, now),
            next_fallback_check: fmt(record.next_fallback_check),
            fire_count: record.fire_count,
            last_fired: fmt(record.last_fired),
        }
    }
}

/// GET /reminders
pub async fn list_handler(State(state): State<Arc<AppState>>) -> Json<Vec<ReminderView>> {
    let now = state.clock.now();
    let views = state
        .store
        .snapshot()
        .iter()
        .map(|r| ReminderView::of(r, now))
        .collect();
    Json(views)
}

/// POST /reminders/{name}/done
pub async fn done_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> HandlerResult {
    actions::mark_done(&state, &name).map_err(reject)?;
    Ok(Json(json!({ "name": name, "completed": true })))
}

/// POST /reminders/{name}/undo
pub async fn undo_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> HandlerResult {
    actions::reopen(&state, &name).map_err(reject)?;
    Ok(Json(json!({ "name": name, "completed": false })))
}

/// POST /reminders/{name}/open
pub async fn open_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> HandlerResult {
    let url = actions::open(&state, &name).await.map_err(reject)?;
    Ok(Json(json!({ "name": name, "opened": url })))
}
