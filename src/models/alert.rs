use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    AboveThreshold,
    BelowThreshold,
    /// Declared in the taxonomy but not evaluated: a percent-change rule
    /// needs a previous snapshot to compare against, which the persist
    /// step does not load. Never triggers.
    ChangePercent,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::AboveThreshold => "ABOVE_THRESHOLD",
            AlertType::BelowThreshold => "BELOW_THRESHOLD",
            AlertType::ChangePercent => "CHANGE_PERCENT",
        }
    }

    pub fn parse(s: &str) -> Option<AlertType> {
        match s {
            "ABOVE_THRESHOLD" => Some(AlertType::AboveThreshold),
            "BELOW_THRESHOLD" => Some(AlertType::BelowThreshold),
            "CHANGE_PERCENT" => Some(AlertType::ChangePercent),
            _ => None,
        }
    }
}

/// A threshold rule over one series' latest value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub series_id: String,
    pub alert_type: AlertType,
    pub threshold: f64,
    pub enabled: bool,
    pub created_at: String,
}

impl Alert {
    /// Evaluate the rule against a freshly persisted value. Returns the
    /// history message when the rule fires.
    pub fn evaluate(&self, value: f64) -> Option<String> {
        match self.alert_type {
            AlertType::AboveThreshold if value > self.threshold => Some(format!(
                "Metric value {value} is above threshold {}",
                self.threshold
            )),
            AlertType::BelowThreshold if value < self.threshold => Some(format!(
                "Metric value {value} is below threshold {}",
                self.threshold
            )),
            _ => None,
        }
    }
}

/// Immutable record of one triggered evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistory {
    pub id: String,
    pub alert_id: String,
    pub value: f64,
    pub message: String,
    pub dispatched: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    pub alert_type: AlertType,
    pub threshold: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlertRequest {
    pub alert_type: AlertType,
    pub threshold: f64,
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
