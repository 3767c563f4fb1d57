//! Notification store.
//!
//! Every read or write that names a single notification is scoped by both the
//! notification id and the owner id, and a mismatch is reported as `NotFound`.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::NotificationDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;
use crate::{Error, Result};

/// Largest page `list_for_user` will return.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Notification repository trait.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert a notification. Returns false when (user, reference, kind) already exists.
    async fn create(&self, notification: &NotificationDbModel) -> Result<bool>;

    async fn get_for_user(&self, id: &str, user_id: &str) -> Result<NotificationDbModel>;

    /// Existing notification for a (user, reference, kind) key.
    async fn find_by_reference(
        &self,
        user_id: &str,
        reference_id: &str,
        kind: &str,
    ) -> Result<Option<NotificationDbModel>>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationDbModel>>;

    /// Unread only, newest first.
    async fn unread_for_user(&self, user_id: &str) -> Result<Vec<NotificationDbModel>>;

    async fn unread_count(&self, user_id: &str) -> Result<i64>;

    async fn mark_read(&self, id: &str, user_id: &str) -> Result<NotificationDbModel>;

    /// Returns how many notifications changed state.
    async fn mark_all_read(&self, user_id: &str) -> Result<u64>;

    async fn delete(&self, id: &str, user_id: &str) -> Result<()>;
}

/// SQLx implementation of NotificationRepository.
pub struct SqlxNotificationRepository {
    pool: SqlitePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &NotificationDbModel) -> Result<bool> {
        retry_on_sqlite_busy("create_notification", || async {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO notifications (
                    id, user_id, type, message, is_read, reference_id, metadata, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&notification.id)
            .bind(&notification.user_id)
            .bind(&notification.kind)
            .bind(&notification.message)
            .bind(notification.is_read)
            .bind(&notification.reference_id)
            .bind(&notification.metadata)
            .bind(notification.created_at)
            .bind(notification.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn get_for_user(&self, id: &str, user_id: &str) -> Result<NotificationDbModel> {
        sqlx::query_as::<_, NotificationDbModel>(
            "SELECT * FROM notifications WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Notification", id))
    }

    async fn find_by_reference(
        &self,
        user_id: &str,
        reference_id: &str,
        kind: &str,
    ) -> Result<Option<NotificationDbModel>> {
        let notification = sqlx::query_as::<_, NotificationDbModel>(
            "SELECT * FROM notifications WHERE user_id = ? AND reference_id = ? AND type = ?",
        )
        .bind(user_id)
        .bind(reference_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationDbModel>> {
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(Error::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
            )));
        }
        if offset < 0 {
            return Err(Error::validation(format!(
                "offset must not be negative, got {offset}"
            )));
        }

        let notifications = sqlx::query_as::<_, NotificationDbModel>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn unread_for_user(&self, user_id: &str) -> Result<Vec<NotificationDbModel>> {
        let notifications = sqlx::query_as::<_, NotificationDbModel>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = ? AND is_read = 0
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn unread_count(&self, user_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_read(&self, id: &str, user_id: &str) -> Result<NotificationDbModel> {
        let updated_at = now_ms();
        let result = retry_on_sqlite_busy("mark_notification_read", || async {
            let result = sqlx::query(
                "UPDATE notifications SET is_read = 1, updated_at = ? WHERE id = ? AND user_id = ?",
            )
            .bind(updated_at)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
            Ok(result)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Notification", id));
        }
        self.get_for_user(id, user_id).await
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let updated_at = now_ms();
        retry_on_sqlite_busy("mark_all_notifications_read", || async {
            let result = sqlx::query(
                "UPDATE notifications SET is_read = 1, updated_at = ? WHERE user_id = ? AND is_read = 0",
            )
            .bind(updated_at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn delete(&self, id: &str, user_id: &str) -> Result<()> {
        let deleted = retry_on_sqlite_busy("delete_notification", || async {
            let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if deleted == 0 {
            return Err(Error::not_found("Notification", id));
        }
        Ok(())
    }
}
