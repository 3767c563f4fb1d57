//! Scan watermark database model.

use serde::{Deserialize, Serialize};

/// Which recurring scan a watermark belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScanScope {
    /// Feeds with at least one follower.
    Followed,
    /// Feeds with at least one starring user.
    Starred,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_scope_strings() {
        assert_eq!(ScanScope::Followed.as_ref(), "followed");
        assert_eq!(ScanScope::Starred.to_string(), "starred");
        assert_eq!(ScanScope::from_str("starred").unwrap(), ScanScope::Starred);
    }
}
