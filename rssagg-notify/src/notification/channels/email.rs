//! Email notification channel using SMTP.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Delivery, NotificationChannel};
use crate::notification::templates::RenderedEmail;
use crate::{Error, Result};

/// Email channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host.
    pub host: String,
    /// SMTP relay port.
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Display name in the From header.
    pub from_name: String,
    /// Sender email address.
    pub from_email: String,
    /// Upgrade the connection with STARTTLS.
    pub use_tls: bool,
    /// Upper bound for one send, connection included.
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            from_name: "RSS Aggregator".to_string(),
            from_email: String::new(),
            use_tls: true,
            timeout_secs: 10,
        }
    }
}

impl EmailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// `"{from_name} <{from_email}>"` as a mailbox.
    pub fn from_mailbox(&self) -> Result<Mailbox> {
        let address: Address = self.from_email.parse().map_err(|e| {
            Error::config(format!("invalid sender address '{}': {}", self.from_email, e))
        })?;
        let name = Some(self.from_name.clone()).filter(|n| !n.trim().is_empty());
        Ok(Mailbox::new(name, address))
    }
}

struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

/// Email notification channel.
///
/// Without a configuration the channel only logs what it would have sent.
pub struct EmailChannel {
    sender: Option<SmtpSender>,
}

impl EmailChannel {
    /// Create a new Email channel. `None` selects the log-only fallback.
    pub fn new(config: Option<EmailConfig>) -> Result<Self> {
        let Some(config) = config else {
            return Ok(Self::log_only());
        };

        let from = config.from_mailbox()?;
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| Error::config(format!("invalid SMTP relay '{}': {}", config.host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port).timeout(Some(config.timeout()));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            host = %config.host,
            port = config.port,
            tls = config.use_tls,
            "Email channel configured"
        );

        Ok(Self {
            sender: Some(SmtpSender {
                transport: builder.build(),
                from,
                timeout: config.timeout(),
            }),
        })
    }

    /// A channel that logs instead of sending.
    pub fn log_only() -> Self {
        Self { sender: None }
    }

    pub fn is_configured(&self) -> bool {
        self.sender.is_some()
    }

    fn build_message(from: &Mailbox, to: &str, email: &RenderedEmail) -> Result<Message> {
        let to: Address = to
            .parse()
            .map_err(|e| Error::validation(format!("invalid recipient address '{to}': {e}")))?;

        Message::builder()
            .from(from.clone())
            .to(Mailbox::new(None, to))
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                email.text_body.clone(),
                email.html_body.clone(),
            ))
            .map_err(|e| Error::validation(format!("failed to build email: {e}")))
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn channel_type(&self) -> &'static str {
        "email"
    }

    async fn send(&self, delivery: &Delivery) -> Result<()> {
        let Some(to) = delivery.recipient.as_deref().filter(|r| !r.trim().is_empty()) else {
            debug!(notification_id = %delivery.notification_id, "No recipient; skipping email");
            return Ok(());
        };

        let Some(sender) = &self.sender else {
            info!(
                notification_id = %delivery.notification_id,
                "Email would be sent to {} with subject: {}",
                to,
                delivery.email.subject
            );
            return Ok(());
        };

        let message = Self::build_message(&sender.from, to, &delivery.email)?;

        match tokio::time::timeout(sender.timeout, sender.transport.send(message)).await {
            Ok(Ok(_)) => {
                debug!(notification_id = %delivery.notification_id, to, "Email sent");
                Ok(())
            }
            Ok(Err(e)) => Err(Error::upstream(format!("SMTP send to {to} failed: {e}"))),
            Err(_) => Err(Error::upstream(format!(
                "SMTP send to {to} timed out after {:?}",
                sender.timeout
            ))),
        }
    }
}
