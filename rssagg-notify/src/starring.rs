//! Starring feeds from the request path.
//!
//! The relation write is synchronous and its failure is the caller's failure.
//! The confirmation notification goes through the dispatch queue, so email
//! latency never reaches the request.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::database::models::PostDbModel;
use crate::database::repositories::{FeedRepository, PostRepository, UserRepository};
use crate::database::time::{ms_before, now_ms};
use crate::notification::{DispatchQueue, NotificationRequest};
use crate::{Error, Result};

/// Window for `recent_posts` when the caller gives no `since`.
pub const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum posts returned by `recent_posts`.
pub const RECENT_POSTS_LIMIT: i64 = 100;

/// Outcome of a star request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StarOutcome {
    Starred,
    AlreadyStarred,
}

pub struct StarringService {
    users: Arc<dyn UserRepository>,
    feeds: Arc<dyn FeedRepository>,
    posts: Arc<dyn PostRepository>,
    queue: DispatchQueue,
}

impl StarringService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        feeds: Arc<dyn FeedRepository>,
        posts: Arc<dyn PostRepository>,
        queue: DispatchQueue,
    ) -> Self {
        Self {
            users,
            feeds,
            posts,
            queue,
        }
    }

    /// Star `feed_id` for `user_id`. Re-starring is a no-op.
    pub async fn star_feed(&self, user_id: &str, feed_id: &str) -> Result<StarOutcome> {
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(Error::not_found("User", user_id));
        }
        let feed = self.feeds.get_feed(feed_id).await?;

        if !self.feeds.star(user_id, feed_id).await? {
            return Ok(StarOutcome::AlreadyStarred);
        }

        info!(user_id, feed_id, "Feed starred");

        // Never wait on the worker; a full queue drops the confirmation.
        if let Err(e) = self
            .queue
            .try_enqueue(NotificationRequest::feed_starred(user_id, &feed))
        {
            warn!(user_id, feed_id, error = %e, "Dropping feed-starred notification");
        }

        Ok(StarOutcome::Starred)
    }

    pub async fn unstar_feed(&self, user_id: &str, feed_id: &str) -> Result<()> {
        self.feeds.unstar(user_id, feed_id).await?;
        info!(user_id, feed_id, "Feed unstarred");
        Ok(())
    }

    /// Posts from the user's starred feeds created after `since` (default: last 24h).
    pub async fn recent_posts(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PostDbModel>> {
        let since_ms = match since {
            Some(since) => since.timestamp_millis(),
            None => ms_before(now_ms(), DEFAULT_RECENT_WINDOW),
        };
        self.posts
            .recent_posts_from_starred_feeds(user_id, since_ms, RECENT_POSTS_LIMIT)
            .await
    }
}
