use serde::Deserialize;
use std::path::Path;

/// Top-level config loaded from `pulse.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PulseConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub alerting: AlertingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Interval of the background sync engine. 0 disables it (external
    /// cron hits `POST /api/v1/sync` instead).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Per-request timeout for provider API calls.
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            http_timeout_secs: default_timeout(),
        }
    }
}

fn default_interval() -> u64 {
    300
}

fn default_timeout() -> u64 {
    10
}

/// Outbound alert channels. All optional; the console channel is always
/// active.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AlertingConfig {
    pub telegram: Option<TelegramConfig>,
    pub webhook: Option<WebhookConfig>,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
    pub to: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from() -> String {
    "pulse@localhost".to_string()
}

impl PulseConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: PulseConfig = toml::from_str(&contents)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg: PulseConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.sync.interval_secs, 300);
        assert_eq!(cfg.sync.http_timeout_secs, 10);
        assert!(cfg.alerting.telegram.is_none());
        assert!(cfg.alerting.smtp.is_none());
    }

    #[test]
    fn channels_parse_with_defaults() {
        let cfg: PulseConfig = toml::from_str(
            r#"
            [sync]
            interval_secs = 0

            [alerting.telegram]
            bot_token = "123:abc"
            chat_id = "-100"

            [alerting.smtp]
            host = "smtp.example.com"
            to = "oncall@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sync.interval_secs, 0);
        assert_eq!(cfg.alerting.telegram.unwrap().chat_id, "-100");
        let smtp = cfg.alerting.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from, "pulse@localhost");
    }
}
