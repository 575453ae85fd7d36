//! HTTP layer -- axum routes for the HTML history view and the JSON API.

pub mod error;
mod pages;
mod routes;
pub mod state;

use self::state::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Rows per page in the history view, and the JSON API default.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Build the application router with all routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(pages::page_routes())
        .nest("/api/v1", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}
