use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;
use crate::models::integration::MetricSeriesResponse;
use crate::models::snapshot::MetricSnapshotResponse;

#[derive(Debug, Deserialize)]
pub struct ListSeriesQuery {
    pub workspace_id: String,
}

pub async fn list_series(
    State(state): State<AppState>,
    Query(query): Query<ListSeriesQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let series = state
        .store
        .list_series_for_workspace(&query.workspace_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // Each card shows the series with its current (latest) value.
    let mut out = Vec::with_capacity(series.len());
    for s in series {
        let latest = state
            .store
            .list_snapshots(&s.id, 1)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
            .into_iter()
            .next()
            .map(MetricSnapshotResponse::from);
        out.push(serde_json::json!({
            "series": MetricSeriesResponse::from(s),
            "latest": latest,
        }));
    }
    Ok(Json(serde_json::json!({ "series": out })))
}

pub async fn update_series_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(settings): Json<serde_json::Value>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !settings.is_object() {
        return Err((StatusCode::BAD_REQUEST, "settings must be an object".to_string()));
    }
    let updated = state
        .store
        .update_series_settings(&id, &settings.to_string())
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !updated {
        return Err((StatusCode::NOT_FOUND, "series not found".to_string()));
    }
    let series = state
        .store
        .get_series(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::INTERNAL_SERVER_ERROR, "failed to read series".to_string()))?;
    Ok(Json(MetricSeriesResponse::from(series)))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_snapshots(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SnapshotsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state
        .store
        .get_series(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "series not found".to_string()));
    }
    let snapshots = state
        .store
        .list_snapshots(&id, query.limit.clamp(1, 1000))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let responses: Vec<MetricSnapshotResponse> =
        snapshots.into_iter().map(MetricSnapshotResponse::from).collect();
    Ok(Json(serde_json::json!({ "snapshots": responses })))
}
