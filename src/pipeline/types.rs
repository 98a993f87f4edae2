use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::FetchError;

/// The provider-shaped payload a fetcher returns for one metric key.
/// Providers disagree on whether they report a `value` or a `count`;
/// both slots exist and the normalizer reconciles them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMetric {
    /// Provider-local metric name, e.g. "unresolved_issues".
    pub metric: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub count: Option<u64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

/// The unified time-series data point every provider payload normalizes
/// into before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedSnapshot {
    pub metric_key: String,
    pub value: f64,
    pub captured_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

/// Pulls one raw payload from a provider for one metric key.
///
/// Implementations resolve the integration's credential through the
/// vault first; `Credential::Sandbox` must short-circuit to a synthetic
/// payload before any network call. Each implementation recognizes a
/// fixed closed set of metric keys.
#[async_trait]
pub trait MetricFetcher: Send + Sync {
    async fn fetch(
        &self,
        integration_id: &str,
        metric_key: &str,
        settings: &str,
    ) -> Result<RawMetric, FetchError>;
}

/// Converts a raw payload into unified snapshots. Pure; no I/O; never
/// fails for well-shaped input. One payload may yield several snapshots.
pub trait MetricNormalizer: Send + Sync {
    fn normalize(&self, raw: &RawMetric, metric_key: &str) -> Vec<UnifiedSnapshot>;
}
