//! Scan watermark repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::ScanScope;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;

/// Watermark repository trait.
#[async_trait]
pub trait WatermarkRepository: Send + Sync {
    /// Last handled post timestamp for (feed, scope), if any.
    async fn get(&self, feed_id: &str, scope: ScanScope) -> Result<Option<i64>>;

    /// Move the watermark forward to `last_seen_at`. Never moves it backwards.
    async fn advance(&self, feed_id: &str, scope: ScanScope, last_seen_at: i64) -> Result<()>;
}

/// SQLx implementation of WatermarkRepository.
pub struct SqlxWatermarkRepository {
    pool: SqlitePool,
}

impl SqlxWatermarkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatermarkRepository for SqlxWatermarkRepository {
    async fn get(&self, feed_id: &str, scope: ScanScope) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT last_seen_at FROM feed_scan_watermarks WHERE feed_id = ? AND scope = ?",
        )
        .bind(feed_id)
        .bind(scope.as_ref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(ts,)| ts))
    }

    async fn advance(&self, feed_id: &str, scope: ScanScope, last_seen_at: i64) -> Result<()> {
        retry_on_sqlite_busy("advance_watermark", || async {
            sqlx::query(
                r#"
                INSERT INTO feed_scan_watermarks (feed_id, scope, last_seen_at, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(feed_id, scope) DO UPDATE SET
                    last_seen_at = MAX(last_seen_at, excluded.last_seen_at),
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(feed_id)
            .bind(scope.as_ref())
            .bind(last_seen_at)
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }
}
