use serde::{Deserialize, Serialize};

/// One stored data point of a series. Append-only; the current value of
/// a series is the row with the maximum captured_at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub id: String,
    pub series_id: String,
    pub value: f64,
    pub captured_at: String,
    /// JSON-encoded free-form context (currency, readiness state).
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshotResponse {
    pub id: String,
    pub series_id: String,
    pub value: f64,
    pub captured_at: String,
    pub metadata: Option<serde_json::Value>,
}

impl From<MetricSnapshot> for MetricSnapshotResponse {
    fn from(s: MetricSnapshot) -> Self {
        Self {
            id: s.id,
            series_id: s.series_id,
            value: s.value,
            captured_at: s.captured_at,
            metadata: s
                .metadata
                .as_deref()
                .and_then(|m| serde_json::from_str(m).ok()),
        }
    }
}
