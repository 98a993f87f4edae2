use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

use crate::AppState;

/// Cron entry point. Vercel-style bearer auth: the scheduler sends the
/// shared secret, nothing else may trigger this route.
pub async fn cron_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(secret) = &state.cron_secret else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "cron secret not configured".to_string(),
        ));
    };
    let expected = format!("Bearer {secret}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|h| h == expected);
    if !authorized {
        return Err((StatusCode::UNAUTHORIZED, "unauthorized".to_string()));
    }

    let summary = state
        .worker
        .run_sync()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true, "summary": summary })))
}

/// Admin-triggered sync, no cron auth.
pub async fn force_sync(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let summary = state
        .worker
        .run_sync()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true, "summary": summary })))
}

/// Backfill: provision any catalog series an integration is missing.
pub async fn seed_metrics(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let integrations = state
        .store
        .list_integrations()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let mut results = Vec::new();
    for integration in integrations {
        let existing: std::collections::HashSet<String> = state
            .store
            .list_series_for_integration(&integration.id)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
            .into_iter()
            .map(|s| s.metric_key)
            .collect();

        let mut added = Vec::new();
        for (key, name) in integration.provider.metric_catalog() {
            if existing.contains(*key) {
                continue;
            }
            state
                .store
                .create_series(
                    &uuid::Uuid::new_v4().to_string(),
                    &integration.workspace_id,
                    &integration.id,
                    key,
                    name,
                    "{}",
                )
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
            added.push(*key);
        }
        results.push(serde_json::json!({
            "id": integration.id,
            "provider": integration.provider,
            "added": added,
        }));
    }

    Ok(Json(serde_json::json!({ "success": true, "results": results })))
}
