use serde::{Deserialize, Serialize};

/// The closed set of external providers the pipeline knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    Sentry,
    Vercel,
    Posthog,
    Stripe,
    Intercom,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Sentry,
        Provider::Vercel,
        Provider::Posthog,
        Provider::Stripe,
        Provider::Intercom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Sentry => "SENTRY",
            Provider::Vercel => "VERCEL",
            Provider::Posthog => "POSTHOG",
            Provider::Stripe => "STRIPE",
            Provider::Intercom => "INTERCOM",
        }
    }

    pub fn parse(s: &str) -> Option<Provider> {
        match s {
            "SENTRY" => Some(Provider::Sentry),
            "VERCEL" => Some(Provider::Vercel),
            "POSTHOG" => Some(Provider::Posthog),
            "STRIPE" => Some(Provider::Stripe),
            "INTERCOM" => Some(Provider::Intercom),
            _ => None,
        }
    }

    /// The series auto-provisioned when an integration is created, so a
    /// fresh connection shows data after the first sync.
    pub fn default_series(&self) -> (&'static str, &'static str) {
        match self {
            Provider::Sentry => ("sentry.unresolved_issues", "Unresolved Issues"),
            Provider::Vercel => ("vercel.deployment_success", "Production Deployment"),
            Provider::Posthog => ("posthog.events_last_hour", "Total Events (1h)"),
            Provider::Stripe => ("stripe.mrr", "MRR"),
            Provider::Intercom => ("intercom.open_tickets", "Open Tickets"),
        }
    }

    /// Every metric key the provider's fetcher recognizes, with display
    /// names. Used by the admin backfill to provision missing series.
    pub fn metric_catalog(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Provider::Sentry => &[
                ("sentry.unresolved_issues", "Unresolved Issues"),
                ("sentry.critical_errors_24h", "Critical Errors"),
                ("sentry.error_spike", "Error Spike Detection"),
            ],
            Provider::Vercel => &[
                ("vercel.deployment_success", "Production Deployment"),
                ("vercel.downtime_minutes", "Downtime Minutes"),
            ],
            Provider::Posthog => &[
                ("posthog.events_last_hour", "Total Events (1h)"),
                ("posthog.user_signups", "User Signups"),
            ],
            Provider::Stripe => &[
                ("stripe.revenue", "Today Revenue"),
                ("stripe.mrr", "MRR"),
                ("stripe.churn", "Churn"),
                ("stripe.new_trials", "New Trials"),
            ],
            Provider::Intercom => &[
                ("intercom.open_tickets", "Open Tickets"),
                ("intercom.average_reply_time", "Avg Reply Time"),
            ],
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationStatus {
    Active,
    Error,
    Disconnected,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationStatus::Active => "ACTIVE",
            IntegrationStatus::Error => "ERROR",
            IntegrationStatus::Disconnected => "DISCONNECTED",
        }
    }

    pub fn parse(s: &str) -> Option<IntegrationStatus> {
        match s {
            "ACTIVE" => Some(IntegrationStatus::Active),
            "ERROR" => Some(IntegrationStatus::Error),
            "DISCONNECTED" => Some(IntegrationStatus::Disconnected),
            _ => None,
        }
    }
}

/// A workspace's credentialed connection to one provider. At most one
/// per (workspace, provider) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub workspace_id: String,
    pub provider: Provider,
    pub status: IntegrationStatus,
    pub secret_id: String,
    /// JSON-encoded public metadata (project/org identifiers).
    pub public_metadata: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationResponse {
    pub id: String,
    pub workspace_id: String,
    pub provider: Provider,
    pub status: IntegrationStatus,
    pub public_metadata: serde_json::Value,
    pub created_at: String,
}

impl From<Integration> for IntegrationResponse {
    fn from(i: Integration) -> Self {
        Self {
            id: i.id,
            workspace_id: i.workspace_id,
            provider: i.provider,
            status: i.status,
            public_metadata: serde_json::from_str(&i.public_metadata)
                .unwrap_or(serde_json::Value::Object(Default::default())),
            created_at: i.created_at,
        }
    }
}

/// A named recurring measurement bound to one integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSeries {
    pub id: String,
    pub workspace_id: String,
    pub integration_id: String,
    pub metric_key: String,
    pub display_name: String,
    /// JSON-encoded provider-specific parameters (slugs, host overrides).
    pub settings: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSeriesResponse {
    pub id: String,
    pub workspace_id: String,
    pub integration_id: String,
    pub metric_key: String,
    pub display_name: String,
    pub settings: serde_json::Value,
    pub created_at: String,
}

impl From<MetricSeries> for MetricSeriesResponse {
    fn from(s: MetricSeries) -> Self {
        Self {
            id: s.id,
            workspace_id: s.workspace_id,
            integration_id: s.integration_id,
            metric_key: s.metric_key,
            display_name: s.display_name,
            settings: serde_json::from_str(&s.settings)
                .unwrap_or(serde_json::Value::Object(Default::default())),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_text() {
        for p in Provider::ALL {
            assert_eq!(Provider::parse(p.as_str()), Some(p));
        }
        assert_eq!(Provider::parse("GITHUB"), None);
    }

    #[test]
    fn default_series_is_in_catalog() {
        for p in Provider::ALL {
            let (key, _) = p.default_series();
            assert!(
                p.metric_catalog().iter().any(|(k, _)| *k == key),
                "{p}: default series {key} missing from catalog"
            );
        }
    }

    #[test]
    fn catalog_keys_are_namespaced_by_provider() {
        for p in Provider::ALL {
            let prefix = format!("{}.", p.as_str().to_lowercase());
            for (key, _) in p.metric_catalog() {
                assert!(key.starts_with(&prefix), "{key} not under {prefix}");
            }
        }
    }
}
