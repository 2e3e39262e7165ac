//! HTTP API the dashboard reads from: dataset rows, queries and chart data.
use crate::cache::DatasetCache;
use crate::chart::{Chart, ChartData, Metric};
use crate::config::ServeConfig;
use crate::dataset::{Dataset, DatasetError, Record};
use crate::query;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct AppState {
    cache: Arc<Mutex<DatasetCache>>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

pub async fn run(
    config: &ServeConfig,
    cache: DatasetCache,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset_path = cache.path().to_path_buf();
    let app = router(cache);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(dataset = %dataset_path.display(), "serve listening on {local_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(cache: DatasetCache) -> Router {
    let state = AppState {
        cache: Arc::new(Mutex::new(cache)),
    };

    Router::new()
        .route("/api/health", get(health))
        .route("/api/runs", get(api_runs))
        .route("/api/query", post(api_query))
        .route("/api/charts/scatter", get(api_scatter))
        .route("/api/charts/bar/{metric}", get(api_bar))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true}))
}

#[derive(Debug, Default, Deserialize)]
struct RunsParams {
    /// Comma-separated run ids; absent means all runs.
    run_ids: Option<String>,
}

async fn api_runs(
    State(state): State<AppState>,
    Query(params): Query<RunsParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let dataset = current_view(&state, parse_id_list(params.run_ids.as_deref()))?;
    Ok(Json(dataset.into_records()))
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    text: String,
    #[serde(default)]
    run_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    answer: String,
}

async fn api_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let ids = req.run_ids.map(|ids| ids.into_iter().collect());
    let dataset = current_view(&state, ids)?;
    Ok(Json(QueryResponse {
        answer: query::respond(&req.text, &dataset),
    }))
}

async fn api_scatter(
    State(state): State<AppState>,
    Query(params): Query<RunsParams>,
) -> Result<Json<ChartData>, ApiError> {
    let dataset = current_view(&state, parse_id_list(params.run_ids.as_deref()))?;
    Ok(Json(Chart::Scatter.render(&dataset)))
}

async fn api_bar(
    State(state): State<AppState>,
    Path(metric): Path<String>,
    Query(params): Query<RunsParams>,
) -> Result<Json<ChartData>, ApiError> {
    let metric = metric
        .parse::<Metric>()
        .map_err(|e| error_body(StatusCode::BAD_REQUEST, e.to_string()))?;
    let dataset = current_view(&state, parse_id_list(params.run_ids.as_deref()))?;
    Ok(Json(Chart::Bar { metric }.render(&dataset)))
}

fn parse_id_list(raw: Option<&str>) -> Option<HashSet<String>> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// The cached dataset, narrowed to `run_ids` when given.
fn current_view(
    state: &AppState,
    run_ids: Option<HashSet<String>>,
) -> Result<Dataset, ApiError> {
    let dataset = {
        let mut cache = state.cache.lock().map_err(|_| {
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "dataset cache poisoned".to_string(),
            )
        })?;
        cache.get().map_err(dataset_error)?
    };
    Ok(match run_ids {
        Some(ids) => dataset.filter(&ids),
        None => (*dataset).clone(),
    })
}

fn dataset_error(e: DatasetError) -> ApiError {
    let status = match e {
        DatasetError::Missing(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(error = %e, "dataset unavailable");
    error_body(status, e.to_string())
}

fn error_body(status: StatusCode, message: String) -> ApiError {
    (status, Json(serde_json::json!({"error": message})))
}
