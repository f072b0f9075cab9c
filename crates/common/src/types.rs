//! Common identifier types for iMeetPro components.
//!
//! The backend is inconsistent about identifier encoding: user ids arrive as
//! JSON strings from some endpoints and as JSON integers from others. Both
//! forms decode into the same string-backed newtype so comparisons between
//! roster entries, status responses and broadcast envelopes are exact.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of a meeting (opaque to the client).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(String);

impl MeetingId {
    /// Create a meeting id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MeetingId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of a user/participant (opaque to the client).
///
/// Serializes as a JSON string; deserializes from a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawUserId::deserialize(deserializer)? {
            RawUserId::Text(s) => Self(s),
            RawUserId::Signed(n) => Self(n.to_string()),
            RawUserId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_from_string_and_integer_compare_equal() {
        let from_text: UserId = serde_json::from_str(r#""42""#).unwrap();
        let from_number: UserId = serde_json::from_str("42").unwrap();

        assert_eq!(from_text, from_number);
        assert_eq!(from_number.as_str(), "42");
    }

    #[test]
    fn test_user_id_serializes_as_string() {
        let id = UserId::from(7_u64);
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""7""#);
    }

    #[test]
    fn test_user_id_rejects_non_scalar() {
        let result: Result<UserId, _> = serde_json::from_str(r#"{"id": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_ids() {
        assert!(MeetingId::new("  ").is_blank());
        assert!(UserId::new("").is_blank());
        assert!(!MeetingId::from("mtg-1").is_blank());
    }

    #[test]
    fn test_display() {
        assert_eq!(MeetingId::from("abc-def").to_string(), "abc-def");
        assert_eq!(UserId::from("u-1").to_string(), "u-1");
    }
}
