//! JSON API route definitions.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use super::DEFAULT_PAGE_SIZE;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/results", get(list_results))
        .route("/results/{id}", get(get_result))
        .route("/applications", get(list_applications))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": state.version,
        },
        "meta": {
            "timestamp": Utc::now().to_rfc3339(),
        }
    }))
}

#[derive(Debug, Deserialize)]
struct ResultsQuery {
    page_size: Option<i64>,
    skip: Option<i64>,
    /// RFC 3339, inclusive, exact.
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    #[serde(default)]
    application: String,
}

async fn list_results(
    State(state): State<AppState>,
    query: Result<Query<ResultsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let skip = query.skip.unwrap_or(0);
    let (from, until) = (query.from, query.until);
    let application = query.application.clone();

    let page = state
        .with_store(move |store| store.get_paged_items(page_size, skip, from, until, &application))
        .await?;

    Ok(Json(json!({
        "data": page,
        "meta": {
            "page_size": page_size,
            "skip": skip,
        }
    })))
}

async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let item = state.with_store(move |store| store.get_by_id(&id)).await?;
    Ok(Json(json!({ "data": item })))
}

async fn list_applications(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let apps = state.with_store(|store| store.get_avail_apps()).await?;
    let total = apps.len();
    Ok(Json(json!({ "data": apps, "meta": { "total": total } })))
}
