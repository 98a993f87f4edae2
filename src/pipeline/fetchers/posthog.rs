use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;

use crate::pipeline::error::FetchError;
use crate::pipeline::types::{MetricFetcher, RawMetric};
use crate::vault::{Credential, SecretVault};

const PROVIDER: &str = "posthog";

fn default_host() -> String {
    "https://app.posthog.com".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PosthogSettings {
    project_id: String,
    /// Self-hosted instances override this.
    host: String,
}

impl Default for PosthogSettings {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            host: default_host(),
        }
    }
}

/// Product-analytics metrics via PostHog's HogQL query endpoint.
pub struct PosthogFetcher {
    vault: Arc<dyn SecretVault>,
    http: reqwest::Client,
}

impl PosthogFetcher {
    pub fn new(vault: Arc<dyn SecretVault>, http: reqwest::Client) -> Self {
        Self { vault, http }
    }

    fn sandbox(metric_key: &str) -> Result<RawMetric, FetchError> {
        let mut rng = rand::rng();
        let now = Utc::now();
        match metric_key {
            "posthog.events_last_hour" => Ok(RawMetric {
                metric: "events_last_hour".into(),
                value: Some(rng.random_range(0..1000) as f64),
                count: None,
                timestamp: now,
                meta: None,
            }),
            "posthog.user_signups" => Ok(RawMetric {
                metric: "user_signups".into(),
                value: Some(rng.random_range(0..50) as f64),
                count: None,
                timestamp: now,
                meta: None,
            }),
            other => Err(FetchError::UnsupportedMetricKey(other.to_string())),
        }
    }

    async fn run_hogql_count(
        &self,
        token: &str,
        settings: &PosthogSettings,
        metric: &str,
        hogql: &str,
    ) -> Result<RawMetric, FetchError> {
        let url = format!(
            "{}/api/projects/{}/query/",
            settings.host.trim_end_matches('/'),
            urlencoding::encode(&settings.project_id)
        );
        let payload = serde_json::json!({
            "query": { "kind": "HogQLQuery", "query": hogql }
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
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
        // results is [[count]]
        let count = data
            .get("results")
            .and_then(|r| r.get(0))
            .and_then(|r| r.get(0))
            .and_then(|c| c.as_f64())
            .unwrap_or(0.0);

        Ok(RawMetric {
            metric: metric.into(),
            value: Some(count),
            count: None,
            timestamp: Utc::now(),
            meta: None,
        })
    }
}

#[async_trait]
impl MetricFetcher for PosthogFetcher {
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

        let settings: PosthogSettings = serde_json::from_str(settings)?;

        match metric_key {
            "posthog.events_last_hour" => {
                self.run_hogql_count(
                    &token,
                    &settings,
                    "events_last_hour",
                    "select count() from events where timestamp > now() - interval 1 hour",
                )
                .await
            }
            "posthog.user_signups" => {
                self.run_hogql_count(
                    &token,
                    &settings,
                    "user_signups",
                    "select count() from events where event = 'User Signed Up' and timestamp > now() - interval 24 hour",
                )
                .await
            }
            other => Err(FetchError::UnsupportedMetricKey(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::testing::FixedVault;

    fn sandbox_fetcher() -> PosthogFetcher {
        PosthogFetcher::new(Arc::new(FixedVault::sandbox("int1")), reqwest::Client::new())
    }

    #[tokio::test]
    async fn sandbox_events_stay_in_range() {
        let f = sandbox_fetcher();
        for _ in 0..20 {
            let raw = f.fetch("int1", "posthog.events_last_hour", "{}").await.unwrap();
            let v = raw.value.unwrap();
            assert!((0.0..1000.0).contains(&v));
        }
    }

    #[tokio::test]
    async fn sandbox_signups_stay_in_range() {
        let f = sandbox_fetcher();
        for _ in 0..20 {
            let raw = f.fetch("int1", "posthog.user_signups", "{}").await.unwrap();
            let v = raw.value.unwrap();
            assert!((0.0..50.0).contains(&v));
        }
    }

    #[tokio::test]
    async fn unsupported_key_is_rejected() {
        let f = sandbox_fetcher();
        let err = f
            .fetch("int1", "posthog.conversion_rate", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedMetricKey(_)));
    }

    #[test]
    fn settings_default_the_host() {
        let s: PosthogSettings = serde_json::from_str(r#"{"projectId":"123"}"#).unwrap();
        assert_eq!(s.host, "https://app.posthog.com");
        assert_eq!(s.project_id, "123");
    }
}
