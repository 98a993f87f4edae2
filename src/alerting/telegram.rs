use async_trait::async_trait;

use crate::config::TelegramConfig;
use crate::models::alert::{Alert, AlertHistory};

use super::AlertDispatcher;

/// Sends alert messages to a Telegram chat through the bot API.
pub struct TelegramDispatcher {
    config: TelegramConfig,
    http: reqwest::Client,
}

impl TelegramDispatcher {
    pub fn new(config: TelegramConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn message(alert: &Alert, history: &AlertHistory) -> String {
        format!(
            "🚨 *Pulse Alert*\n\n**Message:** {}\n**Value:** {}\n**Threshold:** {}",
            history.message, history.value, alert.threshold
        )
    }
}

#[async_trait]
impl AlertDispatcher for TelegramDispatcher {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn dispatch(&self, alert: &Alert, history: &AlertHistory) -> anyhow::Result<()> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        );
        let payload = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": Self::message(alert, history),
            "parse_mode": "Markdown",
        });
        let resp = self.http.post(&url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("telegram API error {status}: {}", resp.text().await.unwrap_or_default());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::AlertType;

    #[test]
    fn message_carries_value_and_threshold() {
        let alert = Alert {
            id: "a1".into(),
            series_id: "s1".into(),
            alert_type: AlertType::AboveThreshold,
            threshold: 100.0,
            enabled: true,
            created_at: "2024-01-01T00:00:00Z".into(),
        };
        let history = AlertHistory {
            id: "h1".into(),
            alert_id: "a1".into(),
            value: 150.0,
            message: "Metric value 150 is above threshold 100".into(),
            dispatched: false,
            created_at: "2024-01-01T00:00:00Z".into(),
        };
        let msg = TelegramDispatcher::message(&alert, &history);
        assert!(msg.contains("150"));
        assert!(msg.contains("100"));
    }
}
