//! Post database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Post database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PostDbModel {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    /// Publication time reported by the feed, if any.
    pub published_at: Option<i64>,
    pub feed_id: String,
    /// When the scraper stored the post. Watermarks compare against this.
    pub created_at: i64,
    pub updated_at: i64,
}

impl PostDbModel {
    pub fn new(feed_id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        let now = crate::database::time::now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            url: url.into(),
            description: None,
            published_at: None,
            feed_id: feed_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Override the stored creation time.
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }
}
