pub mod email;
pub mod telegram;
pub mod webhook;

use async_trait::async_trait;

use crate::config::AlertingConfig;
use crate::models::alert::{Alert, AlertHistory};

/// One outbound alert channel. Dispatch is at-most-effort: failures are
/// logged by the registry and never retried or propagated.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn dispatch(&self, alert: &Alert, history: &AlertHistory) -> anyhow::Result<()>;
}

/// Logs the alert; always configured so a triggered alert is visible
/// even with no external channel set up.
pub struct ConsoleDispatcher;

#[async_trait]
impl AlertDispatcher for ConsoleDispatcher {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn dispatch(&self, alert: &Alert, history: &AlertHistory) -> anyhow::Result<()> {
        tracing::info!(
            alert_id = %alert.id,
            value = history.value,
            threshold = alert.threshold,
            "alert triggered: {}",
            history.message
        );
        Ok(())
    }
}

/// Fan-out over every configured channel.
pub struct DispatcherRegistry {
    dispatchers: Vec<Box<dyn AlertDispatcher>>,
}

impl DispatcherRegistry {
    /// No channels at all. Used by tests and the standalone worker when
    /// alerting is handled elsewhere.
    pub fn none() -> Self {
        Self {
            dispatchers: Vec::new(),
        }
    }

    pub fn from_config(cfg: &AlertingConfig, http: reqwest::Client) -> Self {
        let mut dispatchers: Vec<Box<dyn AlertDispatcher>> = vec![Box::new(ConsoleDispatcher)];
        if let Some(tg) = &cfg.telegram {
            dispatchers.push(Box::new(telegram::TelegramDispatcher::new(
                tg.clone(),
                http.clone(),
            )));
        }
        if let Some(wh) = &cfg.webhook {
            dispatchers.push(Box::new(webhook::WebhookDispatcher::new(wh.clone(), http)));
        }
        if let Some(smtp) = &cfg.smtp {
            match email::EmailDispatcher::new(smtp.clone()) {
                Ok(d) => dispatchers.push(Box::new(d)),
                Err(e) => tracing::warn!("email channel disabled: {e}"),
            }
        }
        Self { dispatchers }
    }

    #[cfg(test)]
    pub fn with(dispatchers: Vec<Box<dyn AlertDispatcher>>) -> Self {
        Self { dispatchers }
    }

    /// Sends to every channel, logging failures. Returns how many
    /// channels delivered.
    pub async fn dispatch_all(&self, alert: &Alert, history: &AlertHistory) -> usize {
        let mut delivered = 0;
        for dispatcher in &self.dispatchers {
            match dispatcher.dispatch(alert, history).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        alert_id = %alert.id,
                        channel = dispatcher.name(),
                        "alert dispatch failed: {e}"
                    );
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::AlertType;

    struct FailingDispatcher;

    #[async_trait]
    impl AlertDispatcher for FailingDispatcher {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn dispatch(&self, _: &Alert, _: &AlertHistory) -> anyhow::Result<()> {
            anyhow::bail!("channel down")
        }
    }

    fn fixtures() -> (Alert, AlertHistory) {
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
        (alert, history)
    }

    #[tokio::test]
    async fn failures_are_swallowed_and_counted_out() {
        let registry = DispatcherRegistry::with(vec![
            Box::new(FailingDispatcher),
            Box::new(ConsoleDispatcher),
        ]);
        let (alert, history) = fixtures();
        let delivered = registry.dispatch_all(&alert, &history).await;
        assert_eq!(delivered, 1);
    }

    #[tokio::test]
    async fn empty_registry_delivers_nothing() {
        let (alert, history) = fixtures();
        assert_eq!(
            DispatcherRegistry::none().dispatch_all(&alert, &history).await,
            0
        );
    }
}
