use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::models::alert::{Alert, AlertHistory};

use super::AlertDispatcher;

/// Emails alerts through an SMTP relay.
pub struct EmailDispatcher {
    config: SmtpConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDispatcher {
    pub fn new(config: SmtpConfig) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?;
        builder = builder.port(config.port);
        if let (Some(user), Some(pass)) = (&config.user, &config.pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            config,
        })
    }
}

#[async_trait]
impl AlertDispatcher for EmailDispatcher {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn dispatch(&self, alert: &Alert, history: &AlertHistory) -> anyhow::Result<()> {
        let subject = format!("[Pulse Alert] {}", history.message);
        let body = format!(
            "{}\n\nValue: {}\nThreshold: {}\nAlert: {}\nTriggered at: {}\n",
            history.message, history.value, alert.threshold, alert.id, history.created_at
        );
        let email = Message::builder()
            .from(self.config.from.parse()?)
            .to(self.config.to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;
        self.transport.send(email).await?;
        Ok(())
    }
}
