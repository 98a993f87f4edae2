use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::pipeline::error::FetchError;
use crate::pipeline::types::{MetricFetcher, RawMetric};
use crate::vault::{Credential, SecretVault};

const PROVIDER: &str = "vercel";
const BASE_URL: &str = "https://api.vercel.com/v6";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct VercelSettings {
    project_id: String,
}

/// Deployment metrics from the Vercel REST API.
pub struct VercelFetcher {
    vault: Arc<dyn SecretVault>,
    http: reqwest::Client,
}

impl VercelFetcher {
    pub fn new(vault: Arc<dyn SecretVault>, http: reqwest::Client) -> Self {
        Self { vault, http }
    }

    fn sandbox(metric_key: &str) -> Result<RawMetric, FetchError> {
        let now = Utc::now();
        match metric_key {
            "vercel.deployment_success" => Ok(RawMetric {
                metric: "deployment_success".into(),
                value: Some(1.0),
                count: None,
                timestamp: now,
                meta: Some(serde_json::json!({
                    "readyState": "READY",
                    "url": "https://sandbox-preview.vercel.app",
                })),
            }),
            "vercel.downtime_minutes" => Ok(RawMetric {
                metric: "downtime_minutes".into(),
                value: Some(0.0),
                count: None,
                timestamp: now,
                meta: Some(serde_json::json!({ "unit": "minutes" })),
            }),
            other => Err(FetchError::UnsupportedMetricKey(other.to_string())),
        }
    }

    async fn fetch_deployment_status(
        &self,
        token: &str,
        project_id: &str,
    ) -> Result<RawMetric, FetchError> {
        let url = format!(
            "{BASE_URL}/deployments?projectId={}&limit=1",
            urlencoding::encode(project_id)
        );
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                provider: PROVIDER,
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::UpstreamStatus {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let data: serde_json::Value = resp.json().await.map_err(|e| FetchError::Transport {
            provider: PROVIDER,
            source: e,
        })?;
        let latest = data
            .get("deployments")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first());

        let ready_state = latest
            .and_then(|d| d.get("readyState"))
            .and_then(|s| s.as_str())
            .unwrap_or("UNKNOWN");
        let deploy_url = latest.and_then(|d| d.get("url")).and_then(|u| u.as_str());
        // `created` is epoch milliseconds.
        let timestamp = latest
            .and_then(|d| d.get("created"))
            .and_then(|c| c.as_i64())
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms))
            .unwrap_or_else(Utc::now);

        Ok(RawMetric {
            metric: "deployment_success".into(),
            value: Some(if ready_state == "READY" { 1.0 } else { 0.0 }),
            count: None,
            timestamp,
            meta: Some(serde_json::json!({
                "readyState": ready_state,
                "url": deploy_url,
            })),
        })
    }
}

#[async_trait]
impl MetricFetcher for VercelFetcher {
    async fn fetch(
        &self,
        integration_id: &str,
        metric_key: &str,
        settings: &str,
    ) -> Result<RawMetric, FetchError> {
        let token = match self.vault.resolve(integration_id).map_err(FetchError::Secret)? {
            None => return Err(FetchError::MissingCredential(integration_id.to_string())),
            Some(Credential::Sandbox) => return Self::sandbox(metric_key),
            Some(Credential::Token(t)) => t,
        };

        let settings: VercelSettings = serde_json::from_str(settings)?;

        match metric_key {
            "vercel.deployment_success" => {
                self.fetch_deployment_status(&token, &settings.project_id).await
            }
            // True downtime needs external uptime monitoring; reported as
            // zero for now.
            "vercel.downtime_minutes" => Ok(RawMetric {
                metric: "downtime_minutes".into(),
                value: Some(0.0),
                count: None,
                timestamp: Utc::now(),
                meta: Some(serde_json::json!({ "unit": "minutes" })),
            }),
            other => Err(FetchError::UnsupportedMetricKey(other.to_string())),
        }
    }
}
