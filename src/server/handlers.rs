use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use super::SharedState;
use super::error::ApiError;
use crate::assemble::ServiceStats;
use crate::entities::record::{ResultRecord, SearchHit};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    #[serde(default)]
    pub drugs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub drugs: Vec<ResultRecord>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub evicted: usize,
}

/// GET /api/search?q=
pub async fn search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<SearchHit>> {
    Json(state.assembler.search(&params.q).await)
}

/// GET /api/drugs/{name}
pub async fn drug(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<ResultRecord>, ApiError> {
    Ok(Json(state.assembler.record(&name).await?))
}

/// POST /api/compare
pub async fn compare(
    State(state): State<SharedState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<Vec<ResultRecord>>, ApiError> {
    Ok(Json(state.assembler.compare(req.drugs.as_slice()).await?))
}

/// POST /clear_cache
pub async fn clear_cache(State(state): State<SharedState>) -> Json<StatusResponse> {
    let evicted = state.assembler.clear_cache();
    Json(StatusResponse {
        status: "Cache cleared successfully",
        evicted,
    })
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<SharedState>) -> Json<ServiceStats> {
    Json(state.assembler.stats())
}

/// POST /api/report
pub async fn report(
    State(state): State<SharedState>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, ApiError> {
    let path = crate::render::report::write_report(&state.reports_dir, &req.drugs).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Json(ReportResponse { filename }))
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}
