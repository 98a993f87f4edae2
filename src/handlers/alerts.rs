use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::models::alert::{CreateAlertRequest, UpdateAlertRequest};

pub async fn list_alerts(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state
        .store
        .get_series(&series_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "series not found".to_string()));
    }
    let alerts = state
        .store
        .list_alerts_for_series(&series_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(serde_json::json!({ "alerts": alerts })))
}

pub async fn create_alert(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
    Json(req): Json<CreateAlertRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state
        .store
        .get_series(&series_id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "series not found".to_string()));
    }
    if !req.threshold.is_finite() {
        return Err((StatusCode::BAD_REQUEST, "threshold must be finite".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    state
        .store
        .create_alert(&id, &series_id, req.alert_type, req.threshold, req.enabled)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let alert = state
        .store
        .get_alert(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::INTERNAL_SERVER_ERROR, "failed to read alert".to_string()))?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn update_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAlertRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !req.threshold.is_finite() {
        return Err((StatusCode::BAD_REQUEST, "threshold must be finite".to_string()));
    }
    let updated = state
        .store
        .update_alert(&id, req.alert_type, req.threshold, req.enabled)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !updated {
        return Err((StatusCode::NOT_FOUND, "alert not found".to_string()));
    }
    let alert = state
        .store
        .get_alert(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::INTERNAL_SERVER_ERROR, "failed to read alert".to_string()))?;
    Ok(Json(alert))
}

pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let deleted = state
        .store
        .delete_alert(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, "alert not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn alert_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state
        .store
        .get_alert(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .is_none()
    {
        return Err((StatusCode::NOT_FOUND, "alert not found".to_string()));
    }
    let history = state
        .store
        .list_alert_history(&id, query.limit.clamp(1, 1000))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(serde_json::json!({ "history": history })))
}
