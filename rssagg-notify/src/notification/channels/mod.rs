//! Notification channels.
//!
//! The dispatcher fans a persisted notification out to every enabled channel:
//! - Email (SMTP through lettre, log-only when unconfigured)
//! - Log (structured tracing output for every notification)

mod email;
mod log;

pub use email::{EmailChannel, EmailConfig};
pub use log::LogChannel;

use async_trait::async_trait;

use super::templates::RenderedEmail;
use crate::Result;
use crate::database::models::NotificationKind;

/// Everything a channel needs to deliver one notification.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub notification_id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub message: String,
    /// Address of the recipient, when the user has one and allows email.
    pub recipient: Option<String>,
    pub email: RenderedEmail,
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Check if the channel is enabled.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Channels that address a person are skipped when there is no recipient.
    fn requires_recipient(&self) -> bool {
        true
    }

    /// Send a notification through this channel.
    async fn send(&self, delivery: &Delivery) -> Result<()>;
}
