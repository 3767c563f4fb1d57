//! Notification settings repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::NotificationSettingsDbModel;
use crate::database::retry::retry_on_sqlite_busy;

/// Notification settings repository trait.
#[async_trait]
pub trait NotificationSettingsRepository: Send + Sync {
    /// Stored settings, or the defaults when the user never saved any.
    async fn get(&self, user_id: &str) -> Result<NotificationSettingsDbModel>;

    async fn upsert(&self, settings: &NotificationSettingsDbModel) -> Result<()>;
}

/// SQLx implementation of NotificationSettingsRepository.
pub struct SqlxNotificationSettingsRepository {
    pool: SqlitePool,
}

impl SqlxNotificationSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSettingsRepository for SqlxNotificationSettingsRepository {
    async fn get(&self, user_id: &str) -> Result<NotificationSettingsDbModel> {
        let settings = sqlx::query_as::<_, NotificationSettingsDbModel>(
            "SELECT * FROM notification_settings WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings.unwrap_or_else(|| NotificationSettingsDbModel::defaults_for(user_id)))
    }

    async fn upsert(&self, settings: &NotificationSettingsDbModel) -> Result<()> {
        retry_on_sqlite_busy("upsert_notification_settings", || async {
            sqlx::query(
                r#"
                INSERT INTO notification_settings (
                    user_id, enable_starred_feed_notifications, enable_email_notifications, updated_at
                ) VALUES (?, ?, ?, ?)
                ON CONFLICT(user_id) DO UPDATE SET
                    enable_starred_feed_notifications = excluded.enable_starred_feed_notifications,
                    enable_email_notifications = excluded.enable_email_notifications,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&settings.user_id)
            .bind(settings.enable_starred_feed_notifications)
            .bind(settings.enable_email_notifications)
            .bind(settings.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }
}
