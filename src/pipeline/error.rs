use crate::models::integration::Provider;

/// Fetch-stage failures, scoped to one series pipeline.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("missing credential for integration {0}")]
    MissingCredential(String),

    #[error("unsupported metric key: {0}")]
    UnsupportedMetricKey(String),

    #[error("{provider} API error {status}: {body}")]
    UpstreamStatus {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} response missing {field}")]
    Shape {
        provider: &'static str,
        field: &'static str,
    },

    #[error("invalid series settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("secret lookup failed: {0}")]
    Secret(#[source] anyhow::Error),
}

/// Everything that can sink a single series pipeline. The worker catches
/// these at the series boundary; they never abort sibling series.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Missing registry entry. A deployment defect, not an upstream
    /// outage; the worker logs it at error level.
    #[error("no {kind} registered for provider {provider}")]
    Configuration {
        provider: Provider,
        kind: &'static str,
    },

    #[error("persist failed for series {series_id}: {source}")]
    Persistence {
        series_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, PipelineError::Configuration { .. })
    }
}
