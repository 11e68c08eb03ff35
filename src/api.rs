//! HTTP API handlers.
//!
//! Every handler forwards to one [`StatesRetriever`] operation and returns
//! its envelope as JSON. Provider and transport failures surface as
//! `502 Bad Gateway`; malformed path or query parameters as `400` or `404`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::error::FetchError;
use crate::model::{AgeGroups, DeltaRecord, HistoryRecord, Metric, ResponseEnvelope, StateRecord};
use crate::regions::{self, RegionId};
use crate::retriever::StatesRetriever;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub retriever: StatesRetriever,
}

/// Build the router with every route mounted.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/states", get(get_states))
        .route("/states/recovered", get(get_recovered))
        .route("/states/new/:metric", get(get_new_events))
        .route("/states/history/:metric", get(get_history))
        .route("/states/history/:metric/:days", get(get_history_days))
        .route("/states/age-groups", get(get_age_groups))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Query parameters selecting a single state.
#[derive(Debug, Default, Deserialize)]
pub struct RegionQuery {
    /// Numeric id (`9`) or abbreviation (`BY`).
    pub id: Option<String>,
}

/// GET /states - Current totals for every state.
#[instrument(skip(state))]
pub async fn get_states(
    State(state): State<AppState>,
) -> Result<Json<ResponseEnvelope<Vec<StateRecord>>>, StatusCode> {
    match state.retriever.current_state_stats().await {
        Ok(envelope) => {
            info!(
                states = envelope.data.len(),
                last_update = %envelope.last_update,
                "States queried"
            );
            Ok(Json(envelope))
        }
        Err(e) => Err(upstream_failure("current_state_stats", &e)),
    }
}

/// GET /states/recovered - Cumulative recovered count per state.
#[instrument(skip(state))]
pub async fn get_recovered(
    State(state): State<AppState>,
) -> Result<Json<ResponseEnvelope<Vec<DeltaRecord>>>, StatusCode> {
    match state.retriever.cumulative_recovered().await {
        Ok(envelope) => {
            info!(states = envelope.data.len(), "Cumulative recovered queried");
            Ok(Json(envelope))
        }
        Err(e) => Err(upstream_failure("cumulative_recovered", &e)),
    }
}

/// GET /states/new/:metric - Events new in the latest report.
///
/// `metric` is one of `cases`, `deaths` or `recovered`.
///
/// # Response
///
/// ```json
/// {
///     "data": [{ "id": 1, "deaths": 3 }, { "id": 2, "deaths": 0 }],
///     "lastUpdate": "2021-05-01T00:00:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_new_events(
    State(state): State<AppState>,
    Path(metric): Path<String>,
) -> Result<Json<ResponseEnvelope<Vec<DeltaRecord>>>, StatusCode> {
    let metric = parse_metric(&metric)?;

    match state.retriever.new_events(metric).await {
        Ok(envelope) => {
            info!(%metric, states = envelope.data.len(), "New events queried");
            Ok(Json(envelope))
        }
        Err(e) => Err(upstream_failure("new_events", &e)),
    }
}

/// GET /states/history/:metric - Full daily series.
///
/// # Query Parameters
///
/// - `id` (optional): Restrict to one state, by id or abbreviation
#[instrument(skip(state))]
pub async fn get_history(
    State(state): State<AppState>,
    Path(metric): Path<String>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<ResponseEnvelope<Vec<HistoryRecord>>>, StatusCode> {
    history(state, &metric, None, query).await
}

/// GET /states/history/:metric/:days - Daily series over the last `days` days.
#[instrument(skip(state))]
pub async fn get_history_days(
    State(state): State<AppState>,
    Path((metric, days)): Path<(String, u32)>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<ResponseEnvelope<Vec<HistoryRecord>>>, StatusCode> {
    history(state, &metric, Some(days), query).await
}

async fn history(
    state: AppState,
    metric: &str,
    days: Option<u32>,
    query: RegionQuery,
) -> Result<Json<ResponseEnvelope<Vec<HistoryRecord>>>, StatusCode> {
    let metric = parse_metric(metric)?;
    let region = parse_region(query.id.as_deref())?;

    match state.retriever.history(metric, days, region).await {
        Ok(envelope) => {
            info!(
                %metric,
                days,
                region,
                records = envelope.data.len(),
                "History queried"
            );
            Ok(Json(envelope))
        }
        Err(e) => Err(upstream_failure("history", &e)),
    }
}

/// GET /states/age-groups - Cases and deaths by age band and sex.
///
/// # Query Parameters
///
/// - `id` (optional): Restrict to one state, by id or abbreviation
#[instrument(skip(state))]
pub async fn get_age_groups(
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<ResponseEnvelope<AgeGroups>>, StatusCode> {
    let region = parse_region(query.id.as_deref())?;

    match state.retriever.age_groups(region).await {
        Ok(envelope) => {
            info!(region, states = envelope.data.len(), "Age groups queried");
            Ok(Json(envelope))
        }
        Err(e) => Err(upstream_failure("age_groups", &e)),
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

fn parse_metric(raw: &str) -> Result<Metric, StatusCode> {
    raw.parse().map_err(|e: String| {
        warn!(metric = %raw, error = %e, "Invalid metric");
        StatusCode::BAD_REQUEST
    })
}

/// Resolve `?id=` to a state id. Absent means all states.
fn parse_region(raw: Option<&str>) -> Result<Option<RegionId>, StatusCode> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    let region = match raw.parse::<RegionId>() {
        Ok(id) => regions::by_id(id),
        Err(_) => regions::by_abbreviation(raw),
    };

    match region {
        Some(region) => Ok(Some(region.id)),
        None => {
            warn!(region = %raw, "Unknown region");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

fn upstream_failure(operation: &'static str, error: &FetchError) -> StatusCode {
    warn!(
        operation,
        url = error.url(),
        provider_error = error.is_provider_error(),
        error = %error,
        "Failed to fetch from feature service"
    );
    StatusCode::BAD_GATEWAY
}
