//! Notification dispatcher.
//!
//! The dispatcher is the single entry point for creating notifications:
//! - Resolves the owner (`NotFound` for unknown users)
//! - Persists the notification (deduplicated on user, reference and kind)
//! - Fans the stored notification out to every enabled channel
//!
//! Persistence happens before any delivery attempt. Delivery is best-effort:
//! channel errors and timeouts are logged and never returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::channels::{Delivery, NotificationChannel};
use super::events::NotificationRequest;
use super::templates::render_email;
use crate::database::models::{NotificationDbModel, UserDbModel};
use crate::database::repositories::{
    NotificationRepository, NotificationSettingsRepository, UserRepository,
};
use crate::{Error, Result};

/// Configuration for the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Ceiling for a single channel send.
    pub delivery_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(15),
        }
    }
}

/// Result of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// The stored notification (the pre-existing row for duplicates).
    pub notification: NotificationDbModel,
    /// False when the (user, reference, kind) key already existed.
    pub is_new: bool,
}

/// Builds, persists and delivers notifications.
pub struct NotificationDispatcher {
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationRepository>,
    settings: Arc<dyn NotificationSettingsRepository>,
    channels: RwLock<Vec<Arc<dyn NotificationChannel>>>,
    config: DispatcherConfig,
}

impl NotificationDispatcher {
    pub fn new(
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationRepository>,
        settings: Arc<dyn NotificationSettingsRepository>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            users,
            notifications,
            settings,
            channels: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Register a delivery channel.
    pub fn add_channel(&self, channel: Arc<dyn NotificationChannel>) {
        debug!(channel = channel.channel_type(), "Registered notification channel");
        self.channels.write().push(channel);
    }

    pub fn with_channel(self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.add_channel(channel);
        self
    }

    /// Create a notification for `request.user_id` and deliver it.
    pub async fn notify(&self, request: NotificationRequest) -> Result<Dispatched> {
        if request.message.trim().is_empty() {
            return Err(Error::validation("notification message must not be empty"));
        }

        let user = self
            .users
            .find_by_id(&request.user_id)
            .await?
            .ok_or_else(|| Error::not_found("User", &request.user_id))?;

        let notification = NotificationDbModel::new(
            &user.id,
            &request.kind,
            request.message,
            request.reference_id,
            &request.metadata,
        );

        if !self.notifications.create(&notification).await? {
            return self.existing(notification).await;
        }

        debug!(
            notification_id = %notification.id,
            user_id = %user.id,
            kind = %notification.kind,
            "Notification stored"
        );

        self.deliver(&user, &notification).await;

        Ok(Dispatched {
            notification,
            is_new: true,
        })
    }

    async fn existing(&self, attempted: NotificationDbModel) -> Result<Dispatched> {
        // Only referenced rows can collide.
        let reference_id = attempted.reference_id.as_deref().unwrap_or_default();
        let stored = self
            .notifications
            .find_by_reference(&attempted.user_id, reference_id, &attempted.kind)
            .await?
            .ok_or_else(|| Error::not_found("Notification", &attempted.id))?;

        debug!(
            notification_id = %stored.id,
            user_id = %stored.user_id,
            kind = %stored.kind,
            "Duplicate notification skipped"
        );

        Ok(Dispatched {
            notification: stored,
            is_new: false,
        })
    }

    /// Best-effort fan-out. Never fails.
    async fn deliver(&self, user: &UserDbModel, notification: &NotificationDbModel) {
        let channels: Vec<_> = self
            .channels
            .read()
            .iter()
            .filter(|c| c.is_enabled())
            .cloned()
            .collect();
        if channels.is_empty() {
            return;
        }

        let recipient = self.recipient_for(user).await;
        let kind = notification.kind();
        let delivery = Delivery {
            notification_id: notification.id.clone(),
            user_id: user.id.clone(),
            email: render_email(&kind, &notification.message, &notification.metadata()),
            kind,
            message: notification.message.clone(),
            recipient,
        };

        for channel in channels {
            if channel.requires_recipient() && delivery.recipient.is_none() {
                continue;
            }

            match tokio::time::timeout(self.config.delivery_timeout, channel.send(&delivery)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    channel = channel.channel_type(),
                    notification_id = %delivery.notification_id,
                    user_id = %delivery.user_id,
                    error = %e,
                    "Notification delivery failed"
                ),
                Err(_) => warn!(
                    channel = channel.channel_type(),
                    notification_id = %delivery.notification_id,
                    user_id = %delivery.user_id,
                    timeout = ?self.config.delivery_timeout,
                    "Notification delivery timed out"
                ),
            }
        }
    }

    /// The user's address, unless missing, blank, or email is turned off.
    async fn recipient_for(&self, user: &UserDbModel) -> Option<String> {
        let email = user.deliverable_email()?;
        match self.settings.get(&user.id).await {
            Ok(settings) if settings.enable_email_notifications => Some(email.to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Failed to load notification settings; skipping email");
                None
            }
        }
    }
}
