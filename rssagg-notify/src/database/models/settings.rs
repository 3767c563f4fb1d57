//! Per-user notification settings model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Notification settings for one user.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct NotificationSettingsDbModel {
    pub user_id: String,
    /// New posts in starred feeds produce notifications.
    pub enable_starred_feed_notifications: bool,
    /// Channels that need an address (email) are used.
    pub enable_email_notifications: bool,
    pub updated_at: i64,
}

impl NotificationSettingsDbModel {
    /// Settings for a user that never saved any.
    pub fn defaults_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            enable_starred_feed_notifications: true,
            enable_email_notifications: true,
            updated_at: crate::database::time::now_ms(),
        }
    }
}
