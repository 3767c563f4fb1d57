//! User database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User database model.
///
/// Only the columns the notification subsystem reads; credentials live elsewhere.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserDbModel {
    /// Unique identifier (UUID)
    pub id: String,
    pub name: String,
    /// Optional email address used for email delivery.
    pub email: Option<String>,
    /// Unix epoch milliseconds (UTC) when the user was created.
    pub created_at: i64,
    /// Unix epoch milliseconds (UTC) when the user was last updated.
    pub updated_at: i64,
}

impl UserDbModel {
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        let now = crate::database::time::now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email,
            created_at: now,
            updated_at: now,
        }
    }

    /// The email address, if present and not blank.
    pub fn deliverable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliverable_email() {
        assert_eq!(
            UserDbModel::new("a", Some("a@example.com".into())).deliverable_email(),
            Some("a@example.com")
        );
        assert_eq!(UserDbModel::new("b", Some("   ".into())).deliverable_email(), None);
        assert_eq!(UserDbModel::new("c", None).deliverable_email(), None);
    }
}
