//! Feed repository: feeds plus the follow and star relations.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{FeedDbModel, FeedRelationDbModel, UserDbModel};
use crate::database::retry::retry_on_sqlite_busy;
use crate::{Error, Result};

/// Feed repository trait.
#[async_trait]
pub trait FeedRepository: Send + Sync {
    // Feeds
    async fn create_feed(&self, feed: &FeedDbModel) -> Result<()>;
    async fn get_feed(&self, id: &str) -> Result<FeedDbModel>;
    async fn list_feeds(&self) -> Result<Vec<FeedDbModel>>;

    // Follows
    /// Returns true when a new relation was inserted.
    async fn follow(&self, user_id: &str, feed_id: &str) -> Result<bool>;
    async fn feeds_with_followers(&self) -> Result<Vec<FeedDbModel>>;
    async fn users_following_feed(&self, feed_id: &str) -> Result<Vec<UserDbModel>>;

    // Stars
    /// Returns true when a new relation was inserted.
    async fn star(&self, user_id: &str, feed_id: &str) -> Result<bool>;
    async fn unstar(&self, user_id: &str, feed_id: &str) -> Result<()>;
    async fn is_starred(&self, user_id: &str, feed_id: &str) -> Result<bool>;
    async fn starred_feeds_for_user(&self, user_id: &str) -> Result<Vec<FeedDbModel>>;
    async fn feeds_with_starrers(&self) -> Result<Vec<FeedDbModel>>;
    async fn users_starring_feed(&self, feed_id: &str) -> Result<Vec<UserDbModel>>;
}

/// SQLx implementation of FeedRepository.
pub struct SqlxFeedRepository {
    pool: SqlitePool,
}

impl SqlxFeedRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_relation(&self, table: &'static str, user_id: &str, feed_id: &str) -> Result<bool> {
        let relation = FeedRelationDbModel::new(user_id, feed_id);
        let sql = format!(
            "INSERT OR IGNORE INTO {table} (id, user_id, feed_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)"
        );
        retry_on_sqlite_busy("insert_feed_relation", || async {
            let result = sqlx::query(&sql)
                .bind(&relation.id)
                .bind(&relation.user_id)
                .bind(&relation.feed_id)
                .bind(relation.created_at)
                .bind(relation.updated_at)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}

#[async_trait]
impl FeedRepository for SqlxFeedRepository {
    async fn create_feed(&self, feed: &FeedDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, user_id, last_fetched_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&feed.id)
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(&feed.user_id)
        .bind(feed.last_fetched_at)
        .bind(feed.created_at)
        .bind(feed.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_feed(&self, id: &str) -> Result<FeedDbModel> {
        sqlx::query_as::<_, FeedDbModel>("SELECT * FROM feeds WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Feed", id))
    }

    async fn list_feeds(&self) -> Result<Vec<FeedDbModel>> {
        let feeds = sqlx::query_as::<_, FeedDbModel>("SELECT * FROM feeds ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(feeds)
    }

    async fn follow(&self, user_id: &str, feed_id: &str) -> Result<bool> {
        self.insert_relation("feed_follows", user_id, feed_id).await
    }

    async fn feeds_with_followers(&self) -> Result<Vec<FeedDbModel>> {
        let feeds = sqlx::query_as::<_, FeedDbModel>(
            r#"
            SELECT f.* FROM feeds f
            WHERE EXISTS (SELECT 1 FROM feed_follows ff WHERE ff.feed_id = f.id)
            ORDER BY f.created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    async fn users_following_feed(&self, feed_id: &str) -> Result<Vec<UserDbModel>> {
        let users = sqlx::query_as::<_, UserDbModel>(
            r#"
            SELECT u.* FROM users u
            INNER JOIN feed_follows ff ON ff.user_id = u.id
            WHERE ff.feed_id = ?
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn star(&self, user_id: &str, feed_id: &str) -> Result<bool> {
        self.insert_relation("starred_feeds", user_id, feed_id).await
    }

    async fn unstar(&self, user_id: &str, feed_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM starred_feeds WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("StarredFeed", feed_id));
        }
        Ok(())
    }

    async fn is_starred(&self, user_id: &str, feed_id: &str) -> Result<bool> {
        let (exists,): (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM starred_feeds WHERE user_id = ? AND feed_id = ?)",
        )
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn starred_feeds_for_user(&self, user_id: &str) -> Result<Vec<FeedDbModel>> {
        let feeds = sqlx::query_as::<_, FeedDbModel>(
            r#"
            SELECT f.* FROM feeds f
            INNER JOIN starred_feeds sf ON sf.feed_id = f.id
            WHERE sf.user_id = ?
            ORDER BY sf.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    async fn feeds_with_starrers(&self) -> Result<Vec<FeedDbModel>> {
        let feeds = sqlx::query_as::<_, FeedDbModel>(
            r#"
            SELECT f.* FROM feeds f
            WHERE EXISTS (SELECT 1 FROM starred_feeds sf WHERE sf.feed_id = f.id)
            ORDER BY f.created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    async fn users_starring_feed(&self, feed_id: &str) -> Result<Vec<UserDbModel>> {
        let users = sqlx::query_as::<_, UserDbModel>(
            r#"
            SELECT u.* FROM users u
            INNER JOIN starred_feeds sf ON sf.user_id = u.id
            WHERE sf.feed_id = ?
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
