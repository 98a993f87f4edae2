use async_trait::async_trait;

use crate::config::WebhookConfig;
use crate::models::alert::{Alert, AlertHistory};

use super::AlertDispatcher;

/// POSTs a JSON payload to a configured URL.
pub struct WebhookDispatcher {
    config: WebhookConfig,
    http: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl AlertDispatcher for WebhookDispatcher {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn dispatch(&self, alert: &Alert, history: &AlertHistory) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "alert_id": alert.id,
            "series_id": alert.series_id,
            "alert_type": alert.alert_type.as_str(),
            "value": history.value,
            "threshold": alert.threshold,
            "message": history.message,
            "triggered_at": history.created_at,
        });
        let resp = self.http.post(&self.config.url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("webhook error {status}");
        }
        Ok(())
    }
}
