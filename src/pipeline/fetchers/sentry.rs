use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;

use crate::pipeline::error::FetchError;
use crate::pipeline::types::{MetricFetcher, RawMetric};
use crate::vault::{Credential, SecretVault};

const PROVIDER: &str = "sentry";
const BASE_URL: &str = "https://sentry.io/api/0";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SentrySettings {
    organization_slug: String,
    project_slug: String,
}

/// Error-tracking metrics from the Sentry REST API.
pub struct SentryFetcher {
    vault: Arc<dyn SecretVault>,
    http: reqwest::Client,
}

impl SentryFetcher {
    pub fn new(vault: Arc<dyn SecretVault>, http: reqwest::Client) -> Self {
        Self { vault, http }
    }

    fn sandbox(metric_key: &str) -> Result<RawMetric, FetchError> {
        let mut rng = rand::rng();
        let now = chrono::Utc::now();
        match metric_key {
            "sentry.unresolved_issues" => Ok(RawMetric {
                metric: "unresolved_issues".into(),
                value: None,
                count: Some(rng.random_range(0..50)),
                timestamp: now,
                meta: None,
            }),
            "sentry.critical_errors_24h" => Ok(RawMetric {
                metric: "critical_errors_24h".into(),
                value: None,
                count: Some(rng.random_range(0..5)),
                timestamp: now,
                meta: None,
            }),
            "sentry.error_spike" => Ok(RawMetric {
                metric: "error_spike".into(),
                // 20% chance of a spike.
                value: Some(if rng.random_bool(0.2) { 300.0 } else { 0.0 }),
                count: None,
                timestamp: now,
                meta: Some(serde_json::json!({ "unit": "percent" })),
            }),
            other => Err(FetchError::UnsupportedMetricKey(other.to_string())),
        }
    }

    async fn fetch_unresolved_issues(
        &self,
        token: &str,
        org: &str,
        project: &str,
    ) -> Result<RawMetric, FetchError> {
        let url = format!(
            "{BASE_URL}/projects/{org}/{project}/issues/?query=is:unresolved&statsPeriod=1h&limit=1"
        );
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
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

        // X-Hits carries the total count matching the query; the body is
        // just the first page of issues.
        let hits = resp
            .headers()
            .get("X-Hits")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.parse::<u64>().ok());
        let data: serde_json::Value = resp.json().await.map_err(|e| FetchError::Transport {
            provider: PROVIDER,
            source: e,
        })?;
        let count = hits.unwrap_or_else(|| data.as_array().map(|a| a.len() as u64).unwrap_or(0));

        Ok(RawMetric {
            metric: "unresolved_issues".into(),
            value: None,
            count: Some(count),
            timestamp: chrono::Utc::now(),
            meta: None,
        })
    }
}

#[async_trait]
impl MetricFetcher for SentryFetcher {
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

        let settings: SentrySettings = serde_json::from_str(settings)?;

        match metric_key {
            "sentry.unresolved_issues" => {
                self.fetch_unresolved_issues(
                    &token,
                    &settings.organization_slug,
                    &settings.project_slug,
                )
                .await
            }
            // TODO: wire these through the discover endpoint with a
            // level:error filter; fixed values until then.
            "sentry.critical_errors_24h" => Ok(RawMetric {
                metric: "critical_errors_24h".into(),
                value: None,
                count: Some(12),
                timestamp: chrono::Utc::now(),
                meta: None,
            }),
            "sentry.error_spike" => Ok(RawMetric {
                metric: "error_spike".into(),
                value: Some(300.0),
                count: None,
                timestamp: chrono::Utc::now(),
                meta: Some(serde_json::json!({ "unit": "percent" })),
            }),
            other => Err(FetchError::UnsupportedMetricKey(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::testing::FixedVault;

    fn sandbox_fetcher() -> SentryFetcher {
        SentryFetcher::new(Arc::new(FixedVault::sandbox("int1")), reqwest::Client::new())
    }

    #[tokio::test]
    async fn sandbox_unresolved_issues_stays_in_range() {
        let f = sandbox_fetcher();
        for _ in 0..20 {
            let raw = f.fetch("int1", "sentry.unresolved_issues", "{}").await.unwrap();
            let count = raw.count.unwrap();
            assert!(count < 50, "count {count} out of range");
        }
    }

    #[tokio::test]
    async fn sandbox_error_spike_is_zero_or_spike() {
        let f = sandbox_fetcher();
        for _ in 0..20 {
            let raw = f.fetch("int1", "sentry.error_spike", "{}").await.unwrap();
            let v = raw.value.unwrap();
            assert!(v == 0.0 || v == 300.0);
        }
    }

    #[tokio::test]
    async fn unsupported_key_is_rejected() {
        let f = sandbox_fetcher();
        let err = f.fetch("int1", "sentry.apdex", "{}").await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedMetricKey(_)));
    }

    #[tokio::test]
    async fn missing_credential_is_reported() {
        let f = SentryFetcher::new(Arc::new(FixedVault::new([])), reqwest::Client::new());
        let err = f
            .fetch("int1", "sentry.unresolved_issues", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingCredential(_)));
    }
}
