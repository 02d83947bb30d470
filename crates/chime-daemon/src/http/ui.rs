use axum::response::Html;

static INDEX_HTML: &str = include_str!("../../static/index.html");

/// Serve the reminder control page at `GET /`.
pub async fn ui_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}
