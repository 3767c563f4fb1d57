//! Notification requests.
//!
//! A request is what callers hand to the dispatcher: who, what kind, the
//! rendered message, an optional reference and the metadata payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::models::{FeedDbModel, Metadata, NotificationKind, PostDbModel};

/// A notification waiting to be persisted and delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub user_id: String,
    pub kind: NotificationKind,
    pub message: String,
    /// Post or feed id. Part of the deduplication key.
    pub reference_id: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NotificationRequest {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            message: message.into(),
            reference_id: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Confirmation that `user_id` starred `feed`.
    pub fn feed_starred(user_id: impl Into<String>, feed: &FeedDbModel) -> Self {
        Self::new(
            user_id,
            NotificationKind::FeedStarred,
            format!("You have starred the feed: {}", feed.name),
        )
        .with_reference(&feed.id)
        .with_metadata("feed_id", feed.id.as_str())
        .with_metadata("feed_name", feed.name.as_str())
    }

    /// A new `post` appeared in `feed`.
    pub fn new_post(user_id: impl Into<String>, post: &PostDbModel, feed: &FeedDbModel) -> Self {
        Self::new(
            user_id,
            NotificationKind::NewPost,
            format!("New post: {}", post.title),
        )
        .with_reference(&post.id)
        .with_metadata("post_id", post.id.as_str())
        .with_metadata("post_title", post.title.as_str())
        .with_metadata("feed_id", feed.id.as_str())
        .with_metadata("feed_name", feed.name.as_str())
        .with_metadata("post_url", post.url.as_str())
    }
}
