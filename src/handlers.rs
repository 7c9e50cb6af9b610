use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tera::Context;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::controller::PhaseKind;
use crate::error::DashError;
use crate::fetcher::StatsSource;
use crate::models::{CountrySelection, MetricKind};
use crate::state::AppState;
use crate::views;

/// Query parameters for the country selector.
#[derive(Debug, Deserialize)]
pub struct CountryQuery {
    /// ISO code, or "worldwide". Missing or empty means worldwide.
    #[serde(default, deserialize_with = "empty_string_as_none_str")]
    pub code: Option<String>,
}

fn empty_string_as_none_str<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => Ok(Some(s)),
    }
}

/// Error returned from handlers: 400 for bad input, 500 otherwise.
pub struct ApiError(DashError);

impl From<DashError> for ApiError {
    fn from(e: DashError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        warn!("Request failed ({}): {}", status, self.0);
        (status, self.0.to_string()).into_response()
    }
}

fn render_template(
    tera: &tera::Tera,
    template: &str,
    context: &Context,
) -> Result<Html<String>, (StatusCode, &'static str)> {
    tera.render(template, context).map(Html).map_err(|e| {
        error!("Template render error for '{}': {}", template, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Render error")
    })
}

/// Builds the application router.
pub fn router<S: StatsSource>(state: Arc<AppState<S>>, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(index::<S>))
        .route("/country", get(select_country::<S>))
        .route("/metric/{kind}", get(select_metric::<S>))
        .route("/retry/{phase}", post(retry::<S>))
        .route("/api/state", get(api_state::<S>))
        .route("/api/series", get(api_series::<S>))
        .route("/api/map", get(api_map::<S>))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - Dashboard page.
pub async fn index<S: StatsSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Html<String>, (StatusCode, &'static str)> {
    let view = state.controller.view().await;
    let page = views::page(&view);
    let context = Context::from_serialize(&page).map_err(|e| {
        error!("Failed to build page context: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Render error")
    })?;
    render_template(&state.tera, "dashboard.html", &context)
}

/// GET /country?code=KE - Select a country (or worldwide) and reload.
pub async fn select_country<S: StatsSource>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<CountryQuery>,
) -> Redirect {
    let Ok(selection) = query
        .code
        .as_deref()
        .unwrap_or(CountrySelection::WORLDWIDE)
        .parse::<CountrySelection>();
    state.controller.select_country(selection).await;
    Redirect::to("/")
}

/// GET /metric/{kind} - Switch the active metric.
pub async fn select_metric<S: StatsSource>(
    State(state): State<Arc<AppState<S>>>,
    Path(kind): Path<String>,
) -> Result<Redirect, ApiError> {
    let metric: MetricKind = kind.parse()?;
    state.controller.select_metric(metric).await;
    Ok(Redirect::to("/"))
}

/// POST /retry/{phase} - Re-issue a failed fetch.
pub async fn retry<S: StatsSource>(
    State(state): State<Arc<AppState<S>>>,
    Path(phase): Path<String>,
) -> Result<Redirect, ApiError> {
    let phase: PhaseKind = phase.parse()?;
    state.controller.retry(phase).await;
    Ok(Redirect::to("/"))
}

/// GET /api/state - Whole dashboard state as JSON.
pub async fn api_state<S: StatsSource>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    Json(state.controller.view().await)
}

/// GET /api/series - Chart points for the active metric.
pub async fn api_series<S: StatsSource>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    let view = state.controller.view().await;
    Json(views::chart_view(&view))
}

/// GET /api/map - Markers and viewport.
pub async fn api_map<S: StatsSource>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    let view = state.controller.view().await;
    Json(views::map_view(&view))
}
