//! Feed, follow and star database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Feed database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FeedDbModel {
    pub id: String,
    pub name: String,
    pub url: String,
    /// User who added the feed.
    pub user_id: String,
    /// Unix epoch milliseconds (UTC) of the last fetch, if any.
    pub last_fetched_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FeedDbModel {
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = crate::database::time::now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            url: url.into(),
            user_id: user_id.into(),
            last_fetched_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A (user, feed) relation: used for both `feed_follows` and `starred_feeds`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FeedRelationDbModel {
    pub id: String,
    pub user_id: String,
    pub feed_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FeedRelationDbModel {
    pub fn new(user_id: impl Into<String>, feed_id: impl Into<String>) -> Self {
        let now = crate::database::time::now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            feed_id: feed_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
