//! Log channel: every notification ends up in the structured log.

use async_trait::async_trait;
use tracing::info;

use super::{Delivery, NotificationChannel};
use crate::Result;

/// Writes each delivered notification to the log.
#[derive(Debug, Default)]
pub struct LogChannel;

impl LogChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn channel_type(&self) -> &'static str {
        "log"
    }

    fn requires_recipient(&self) -> bool {
        false
    }

    async fn send(&self, delivery: &Delivery) -> Result<()> {
        info!(
            notification_id = %delivery.notification_id,
            user_id = %delivery.user_id,
            kind = %delivery.kind,
            "Notification: {}",
            delivery.message
        );
        Ok(())
    }
}
