//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Dispatch queue is closed")]
    QueueClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    NotFound,
    Validation,
    UpstreamUnavailable,
    Internal,
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    /// Returns true for a missing user, notification, feed or relation.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::DatabaseSqlx(sqlx::Error::RowNotFound) => ErrorCategory::NotFound,
            Self::DatabaseSqlx(_) | Self::UpstreamUnavailable(_) | Self::QueueClosed => {
                ErrorCategory::UpstreamUnavailable
            }
            Self::Migration(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Io(_)
            | Self::Other(_) => ErrorCategory::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            Error::not_found("User", "u1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::validation("bad limit").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::DatabaseSqlx(sqlx::Error::PoolTimedOut).category(),
            ErrorCategory::UpstreamUnavailable
        );
        assert_eq!(Error::QueueClosed.category(), ErrorCategory::UpstreamUnavailable);
        assert_eq!(Error::Other("boom".into()).category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Notification", "abc");
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Entity not found: Notification with id abc"
        );
    }
}
