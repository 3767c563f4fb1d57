//! Notification database models.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use tracing::warn;

use crate::{Error, Result};

/// Open key/value payload carried with a notification.
pub type Metadata = serde_json::Map<String, Value>;

/// Read a string value from metadata. Missing or non-string keys read as "".
pub fn metadata_str<'a>(metadata: &'a Metadata, key: &str) -> &'a str {
    metadata.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Notification database model.
/// One user-facing event with read/unread state.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct NotificationDbModel {
    pub id: String,
    /// Owner of the notification.
    pub user_id: String,
    /// Kind as stored: "new_post", "feed_starred", or anything else.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    /// Post or feed that triggered the notification.
    pub reference_id: Option<String>,
    /// JSON object blob
    pub metadata: String,
    /// Unix epoch milliseconds (UTC).
    pub created_at: i64,
    /// Unix epoch milliseconds (UTC). Moves only on read-state changes.
    pub updated_at: i64,
}

impl NotificationDbModel {
    pub fn new(
        user_id: impl Into<String>,
        kind: &NotificationKind,
        message: impl Into<String>,
        reference_id: Option<String>,
        metadata: &Metadata,
    ) -> Self {
        let now = crate::database::time::now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind: kind.as_str().to_string(),
            message: message.into(),
            is_read: false,
            reference_id,
            metadata: Value::Object(metadata.clone()).to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        NotificationKind::parse(&self.kind)
    }

    /// Parsed metadata; a corrupt blob reads as empty.
    pub fn metadata(&self) -> Metadata {
        match serde_json::from_str::<Value>(&self.metadata) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(
                    notification_id = %self.id,
                    "Notification metadata is not a JSON object; treating as empty"
                );
                Metadata::new()
            }
        }
    }
}

/// Notification kinds.
///
/// Unknown stored values survive as `Other` so older or newer rows still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    NewPost,
    FeedStarred,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NewPost => "new_post",
            Self::FeedStarred => "feed_starred",
            Self::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "new_post" => Self::NewPost,
            "feed_starred" => Self::FeedStarred,
            other => Self::Other(other.to_string()),
        }
    }

    /// Parse, rejecting anything outside the known set.
    pub fn parse_strict(s: &str) -> Result<Self> {
        match Self::parse(s) {
            Self::Other(other) => Err(Error::validation(format!(
                "unknown notification type '{other}'"
            ))),
            known => Ok(known),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        kind.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("new_post", NotificationKind::NewPost)]
    #[case("feed_starred", NotificationKind::FeedStarred)]
    #[case("digest", NotificationKind::Other("digest".to_string()))]
    fn test_kind_parse(#[case] raw: &str, #[case] expected: NotificationKind) {
        let kind = NotificationKind::parse(raw);
        assert_eq!(kind, expected);
        assert_eq!(kind.as_str(), raw);
    }

    #[test]
    fn test_kind_parse_strict() {
        assert_eq!(
            NotificationKind::parse_strict("new_post").unwrap(),
            NotificationKind::NewPost
        );
        assert!(matches!(
            NotificationKind::parse_strict("NewPost"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_kind_serde_as_string() {
        let json = serde_json::to_string(&NotificationKind::FeedStarred).unwrap();
        assert_eq!(json, r#""feed_starred""#);
        let back: NotificationKind = serde_json::from_str(r#""weekly""#).unwrap();
        assert_eq!(back, NotificationKind::Other("weekly".to_string()));
    }

    #[test]
    fn test_new_notification_defaults() {
        let mut metadata = Metadata::new();
        metadata.insert("feed_name".into(), Value::from("Rust Blog"));

        let n = NotificationDbModel::new(
            "user-1",
            &NotificationKind::FeedStarred,
            "You have starred the feed: Rust Blog",
            Some("feed-1".to_string()),
            &metadata,
        );

        assert!(!n.is_read);
        assert_eq!(n.kind, "feed_starred");
        assert_eq!(n.created_at, n.updated_at);
        assert_eq!(metadata_str(&n.metadata(), "feed_name"), "Rust Blog");
        assert_eq!(metadata_str(&n.metadata(), "post_url"), "");
    }

    #[test]
    fn test_corrupt_metadata_reads_empty() {
        let mut n = NotificationDbModel::new(
            "user-1",
            &NotificationKind::NewPost,
            "New post: x",
            None,
            &Metadata::new(),
        );
        n.metadata = "[1,2,3]".to_string();
        assert!(n.metadata().is_empty());
    }
}
