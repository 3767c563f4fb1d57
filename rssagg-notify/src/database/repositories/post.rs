//! Post repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::PostDbModel;

/// Post repository trait.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &PostDbModel) -> Result<()>;

    /// Posts of a feed with `created_at >= since_ms`, oldest first.
    async fn posts_created_since(&self, feed_id: &str, since_ms: i64) -> Result<Vec<PostDbModel>>;

    /// Posts from the user's starred feeds with `created_at > since_ms`, newest first.
    async fn recent_posts_from_starred_feeds(
        &self,
        user_id: &str,
        since_ms: i64,
        limit: i64,
    ) -> Result<Vec<PostDbModel>>;
}

/// SQLx implementation of PostRepository.
pub struct SqlxPostRepository {
    pool: SqlitePool,
}

impl SqlxPostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &PostDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, title, url, description, published_at, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(&post.feed_id)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn posts_created_since(&self, feed_id: &str, since_ms: i64) -> Result<Vec<PostDbModel>> {
        let posts = sqlx::query_as::<_, PostDbModel>(
            r#"
            SELECT * FROM posts
            WHERE feed_id = ? AND created_at >= ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(feed_id)
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn recent_posts_from_starred_feeds(
        &self,
        user_id: &str,
        since_ms: i64,
        limit: i64,
    ) -> Result<Vec<PostDbModel>> {
        let posts = sqlx::query_as::<_, PostDbModel>(
            r#"
            SELECT p.* FROM posts p
            INNER JOIN starred_feeds sf ON sf.feed_id = p.feed_id
            WHERE sf.user_id = ? AND p.created_at > ?
            ORDER BY p.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(since_ms)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}
