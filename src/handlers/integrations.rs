use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;
use crate::models::integration::{IntegrationResponse, MetricSeriesResponse, Provider};

#[derive(Debug, Deserialize)]
pub struct CreateIntegrationRequest {
    pub workspace_id: String,
    pub provider: Provider,
    pub secret_value: String,
    #[serde(default)]
    pub project_slug: Option<String>,
    #[serde(default)]
    pub org_slug: Option<String>,
}

/// Public (non-secret) metadata recorded on the integration row.
fn public_metadata(req: &CreateIntegrationRequest) -> serde_json::Value {
    let mut meta = serde_json::json!({});
    if let Some(project) = &req.project_slug {
        meta["projectSlug"] = serde_json::Value::String(project.clone());
    }
    if req.provider == Provider::Sentry {
        if let Some(org) = &req.org_slug {
            meta["organizationSlug"] = serde_json::Value::String(org.clone());
        }
    }
    meta
}

/// Settings for the auto-provisioned default series, derived from the
/// connect form the same way the integration metadata is.
fn default_series_settings(req: &CreateIntegrationRequest) -> serde_json::Value {
    let project = req.project_slug.clone().unwrap_or_default();
    match req.provider {
        Provider::Sentry => serde_json::json!({
            "organizationSlug": req.org_slug.clone().unwrap_or_default(),
            "projectSlug": project,
        }),
        Provider::Vercel | Provider::Posthog => serde_json::json!({ "projectId": project }),
        Provider::Stripe | Provider::Intercom => serde_json::json!({}),
    }
}

pub async fn create_integration(
    State(state): State<AppState>,
    Json(req): Json<CreateIntegrationRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.secret_value.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "secret_value is required".to_string()));
    }
    let exists = state
        .store
        .integration_exists(&req.workspace_id, req.provider)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if exists {
        return Err((
            StatusCode::CONFLICT,
            format!("workspace already has a {} integration", req.provider),
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let integration = state
        .store
        .create_integration(
            &id,
            &req.workspace_id,
            req.provider,
            &req.secret_value,
            &public_metadata(&req).to_string(),
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // Auto-provision the provider's default series so the dashboard has
    // something to show after the first sync.
    let (metric_key, display_name) = req.provider.default_series();
    state
        .store
        .create_series(
            &uuid::Uuid::new_v4().to_string(),
            &req.workspace_id,
            &integration.id,
            metric_key,
            display_name,
            &default_series_settings(&req).to_string(),
        )
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // Initial fetch so "created" means "data is there". A failed pass is
    // logged, not surfaced; the next scheduled sync retries.
    match state.worker.run_sync().await {
        Ok(summary) => tracing::info!(
            "initial sync after connecting {}: total={} success={} failed={}",
            req.provider,
            summary.total,
            summary.success,
            summary.failed
        ),
        Err(e) => tracing::warn!("initial sync after connecting {} failed: {e}", req.provider),
    }

    Ok((
        StatusCode::CREATED,
        Json(IntegrationResponse::from(integration)),
    ))
}

pub async fn list_integrations(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let integrations = state
        .store
        .list_integrations()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let responses: Vec<IntegrationResponse> =
        integrations.into_iter().map(IntegrationResponse::from).collect();
    Ok(Json(serde_json::json!({ "integrations": responses })))
}

pub async fn get_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let integration = state
        .store
        .get_integration(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "integration not found".to_string()))?;
    let series = state
        .store
        .list_series_for_integration(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let series: Vec<MetricSeriesResponse> =
        series.into_iter().map(MetricSeriesResponse::from).collect();

    Ok(Json(serde_json::json!({
        "integration": IntegrationResponse::from(integration),
        "series": series,
    })))
}

pub async fn delete_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let deleted = state
        .store
        .delete_integration(&id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, "integration not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
