//! HTML views of the result history, rendered with askama and driven by htmx.

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::ApiError;
use super::state::AppState;
use super::DEFAULT_PAGE_SIZE;
use crate::config::AppConfig;
use crate::pagination::{day_end, day_start, format_date, parse_date, PageInfo};
use crate::storage::{OperationResult, PagedResults};

/// htmx response header for client-side events, see <https://htmx.org/headers/hx-trigger/>.
const HX_TRIGGER: HeaderName = HeaderName::from_static("hx-trigger");

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(redirect_start))
        .route("/StartPage", get(start_page))
        .route("/StartPage/TableResult", get(table_result))
        .route("/StartPage/Output/{id}/{show}", get(output_detail))
        .route("/StartPage/ToggleOutput/{id}", get(toggle_output))
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

struct ResultRow {
    id: String,
    application: String,
    color: String,
    success: bool,
    created: String,
}

impl ResultRow {
    fn new(item: &OperationResult, config: &AppConfig) -> Self {
        Self {
            id: item.id.clone(),
            application: item.application.clone(),
            color: config.color_for(&item.application).to_string(),
            success: item.success,
            created: item.created.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "table_result.html")]
struct TableResultTemplate {
    rows: Vec<ResultRow>,
    total_count: i64,
    page_size: i64,
    total_pages: i64,
    /// One-based page number for display.
    page_number: i64,
    next_skip: i64,
    prev_skip: i64,
    has_prev: bool,
    has_next: bool,
    from: String,
    until: String,
    application: String,
}

impl TableResultTemplate {
    fn new(
        result: &PagedResults,
        config: &AppConfig,
        next_skip: i64,
        info: PageInfo,
        from: String,
        until: String,
        application: String,
    ) -> Self {
        let page_size = DEFAULT_PAGE_SIZE;
        Self {
            rows: result.items.iter().map(|i| ResultRow::new(i, config)).collect(),
            total_count: result.total_count,
            page_size,
            total_pages: info.total_pages,
            page_number: info.current_page + 1,
            next_skip,
            prev_skip: next_skip.saturating_sub(2 * page_size).max(0),
            has_prev: next_skip > page_size,
            has_next: next_skip < result.total_count,
            from,
            until,
            application,
        }
    }
}

#[derive(Template)]
#[template(path = "start_page.html")]
struct StartPageTemplate {
    version: String,
    applications: Vec<String>,
    table: String,
}

#[derive(Template)]
#[template(path = "output_detail.html")]
struct OutputDetailTemplate {
    id: String,
    output: String,
    expanded: bool,
}

#[derive(Template)]
#[template(path = "error_page.html")]
struct ErrorPageTemplate {
    version: String,
    message: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure rendered as an HTML error page instead of JSON.
struct PageError {
    error: ApiError,
    version: String,
}

impl PageError {
    fn from_state(state: &AppState) -> impl Fn(ApiError) -> Self + '_ {
        move |error| Self {
            error,
            version: state.version.clone(),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        tracing::error!(error = %self.error, "could not serve page");

        let page = ErrorPageTemplate {
            version: self.version,
            message: self.error.to_string(),
        };
        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(_) => (status, self.error.to_string()).into_response(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn redirect_start() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/StartPage")])
}

async fn start_page(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    info!("serving the StartPage");
    let on_err = PageError::from_state(&state);

    let skip = 0;
    let result = state
        .with_store(move |store| store.get_paged_items(DEFAULT_PAGE_SIZE, skip, None, None, ""))
        .await
        .map_err(&on_err)?;
    let applications = state
        .with_store(|store| store.get_avail_apps())
        .await
        .map_err(&on_err)?;

    let info = PageInfo::new(result.total_count, DEFAULT_PAGE_SIZE, skip);
    let next_skip = skip.saturating_add(DEFAULT_PAGE_SIZE);

    let rendered = TableResultTemplate::new(
        &result,
        &state.config,
        next_skip,
        info,
        String::new(),
        String::new(),
        String::new(),
    )
    .render()
    .and_then(|table| {
        StartPageTemplate {
            version: state.version.clone(),
            applications,
            table,
        }
        .render()
    });

    rendered.map(Html).map_err(|e| on_err(e.into()))
}

#[derive(Debug, Default, Deserialize)]
struct TableQuery {
    #[serde(default)]
    skip: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    until: String,
    #[serde(default)]
    application: String,
}

async fn table_result(
    State(state): State<AppState>,
    Query(query): Query<TableQuery>,
) -> Result<Html<String>, PageError> {
    let on_err = PageError::from_state(&state);

    let mut skip = 0;
    if !query.skip.is_empty() {
        match query.skip.parse::<i64>() {
            Ok(s) => skip = s.max(0),
            Err(e) => warn!(skip = %query.skip, error = %e, "could not parse skip param"),
        }
    }

    let from = parse_date(&query.from);
    let until = parse_date(&query.until);
    let application = query.application.clone();

    let result = state
        .with_store(move |store| {
            store.get_paged_items(
                DEFAULT_PAGE_SIZE,
                skip,
                from.map(day_start),
                until.map(day_end),
                &application,
            )
        })
        .await
        .map_err(&on_err)?;

    let next_skip = skip.saturating_add(DEFAULT_PAGE_SIZE);
    let info = PageInfo::new(result.total_count, DEFAULT_PAGE_SIZE, next_skip);

    TableResultTemplate::new(
        &result,
        &state.config,
        next_skip,
        info,
        format_date(from),
        format_date(until),
        query.application,
    )
    .render()
    .map(Html)
    .map_err(|e| on_err(e.into()))
}

async fn output_detail(
    State(state): State<AppState>,
    Path((id, show)): Path<(String, String)>,
) -> Result<Html<String>, PageError> {
    let on_err = PageError::from_state(&state);

    let item = state
        .with_store(move |store| store.get_by_id(&id))
        .await
        .map_err(&on_err)?;

    OutputDetailTemplate {
        id: item.id,
        output: item.output,
        expanded: show.eq_ignore_ascii_case("true"),
    }
    .render()
    .map(Html)
    .map_err(|e| on_err(e.into()))
}

#[derive(Serialize)]
struct ElementTarget {
    target: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowOutputTrigger {
    show_output: ElementTarget,
}

/// Answer with an `HX-Trigger` header telling the output element of `id` to toggle.
async fn toggle_output(Path(id): Path<String>) -> Response {
    let trigger = ShowOutputTrigger {
        show_output: ElementTarget {
            target: format!("#item-output-{id}"),
        },
    };

    let header_value = serde_json::to_string(&trigger)
        .ok()
        .and_then(|json| HeaderValue::from_str(&json).ok());
    match header_value {
        Some(value) => (StatusCode::OK, [(HX_TRIGGER, value)]).into_response(),
        None => {
            warn!(%id, "could not encode toggle trigger");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}
