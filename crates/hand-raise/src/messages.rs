//! Broadcast envelope for the real-time data channel.
//!
//! The data channel is shared with unrelated application traffic (chat,
//! reactions, recording notices), so decoding is a filter first: anything
//! that is not a JSON object whose `type` is one of the four hand-raise kinds
//! is dropped without error.
//!
//! ```text
//! { "type": "hand_raise_update", "user_id": "42", "action": "raise",
//!   "timestamp": 1767261600000, ... }
//! ```
//!
//! Field decoding past `type` is lenient: a recognized message with odd
//! fields still counts as a refresh hint.

use crate::models::{CurrentUser, HandAction, HostAction};
use common::types::UserId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// The four hand-raise message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    HandRaiseUpdate,
    HandAcknowledgment,
    ClearAllHands,
    HandStateSync,
}

impl MessageKind {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageKind::HandRaiseUpdate => "hand_raise_update",
            MessageKind::HandAcknowledgment => "hand_acknowledgment",
            MessageKind::ClearAllHands => "clear_all_hands",
            MessageKind::HandStateSync => "hand_state_sync",
        }
    }
}

impl FromStr for MessageKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hand_raise_update" => Ok(MessageKind::HandRaiseUpdate),
            "hand_acknowledgment" => Ok(MessageKind::HandAcknowledgment),
            "clear_all_hands" => Ok(MessageKind::ClearAllHands),
            "hand_state_sync" => Ok(MessageKind::HandStateSync),
            _ => Err(()),
        }
    }
}

/// One hand-raise broadcast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandRaiseMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Subject of the message (the acting user, or the target of a host action).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Sender clock, epoch milliseconds.
    pub timestamp: i64,

    /// Any further fields (names, host id, server `data` payload).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl HandRaiseMessage {
    /// Announce a raise or lower by `user`.
    #[must_use]
    pub fn hand_raise_update(user: &CurrentUser, action: HandAction) -> Self {
        let mut extra = Map::new();
        extra.insert("user_name".to_string(), Value::from(user.display_name.clone()));
        extra.insert(
            "participant_identity".to_string(),
            Value::from(user.connection_identity.clone()),
        );
        Self {
            kind: MessageKind::HandRaiseUpdate,
            user_id: Some(user.user_id.clone()),
            action: Some(action.as_str().to_string()),
            timestamp: now_millis(),
            extra,
        }
    }

    /// Announce a host action on `target`.
    #[must_use]
    pub fn hand_acknowledgment(
        host: &CurrentUser,
        target: &UserId,
        target_name: &str,
        action: HostAction,
    ) -> Self {
        let mut extra = Map::new();
        extra.insert("user_name".to_string(), Value::from(target_name));
        extra.insert(
            "host_id".to_string(),
            Value::from(host.user_id.as_str()),
        );
        extra.insert(
            "host_name".to_string(),
            Value::from(host.display_name.clone()),
        );
        Self {
            kind: MessageKind::HandAcknowledgment,
            user_id: Some(target.clone()),
            action: Some(action.as_str().to_string()),
            timestamp: now_millis(),
            extra,
        }
    }

    /// Announce that `host` cleared every hand.
    #[must_use]
    pub fn clear_all_hands(host: &CurrentUser) -> Self {
        let mut extra = Map::new();
        extra.insert(
            "host_name".to_string(),
            Value::from(host.display_name.clone()),
        );
        Self {
            kind: MessageKind::ClearAllHands,
            user_id: Some(host.user_id.clone()),
            action: Some("clear".to_string()),
            timestamp: now_millis(),
            extra,
        }
    }

    /// Attach the server's response `data` object, if any.
    #[must_use]
    pub fn with_data(mut self, data: &Value) -> Self {
        if !data.is_null() {
            self.extra.insert("data".to_string(), data.clone());
        }
        self
    }

    /// Serialize for the data channel.
    ///
    /// # Errors
    ///
    /// Returns the serde error if a field cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a raw payload, returning `None` for anything that is not a
    /// hand-raise message.
    #[must_use]
    pub fn decode(raw: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(raw).ok()?;
        let Value::Object(mut fields) = value else {
            return None;
        };

        let kind = fields.remove("type")?.as_str()?.parse::<MessageKind>().ok()?;

        let user_id = fields
            .remove("user_id")
            .and_then(|v| serde_json::from_value::<UserId>(v).ok());
        let action = fields
            .remove("action")
            .and_then(|v| v.as_str().map(str::to_string));
        let timestamp = fields
            .remove("timestamp")
            .and_then(|v| v.as_i64())
            .unwrap_or_default();

        Some(Self {
            kind,
            user_id,
            action,
            timestamp,
            extra: fields,
        })
    }

    /// The raise/lower action carried by a `hand_raise_update`.
    #[must_use]
    pub fn hand_action(&self) -> Option<HandAction> {
        match self.action.as_deref()? {
            "raise" => Some(HandAction::Raise),
            "lower" => Some(HandAction::Lower),
            _ => None,
        }
    }

    /// What this message says about `me`'s own raised state, if anything.
    ///
    /// Only two messages carry own-state: a `hand_raise_update` about `me`
    /// and `clear_all_hands`. Acknowledgment alone never changes it.
    #[must_use]
    pub fn own_hand_raised(&self, me: &UserId) -> Option<bool> {
        match self.kind {
            MessageKind::HandRaiseUpdate if self.user_id.as_ref() == Some(me) => {
                self.hand_action().map(HandAction::leaves_raised)
            }
            MessageKind::ClearAllHands => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ParticipantRole;

    fn user(id: &str) -> CurrentUser {
        CurrentUser {
            user_id: UserId::from(id),
            display_name: format!("User {id}"),
            connection_identity: format!("lk-{id}"),
            role: ParticipantRole::Participant,
        }
    }

    #[test]
    fn test_encoded_update_has_wire_fields() {
        let msg = HandRaiseMessage::hand_raise_update(&user("42"), HandAction::Raise);
        let json: Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();

        assert_eq!(json["type"], "hand_raise_update");
        assert_eq!(json["user_id"], "42");
        assert_eq!(json["action"], "raise");
        assert_eq!(json["user_name"], "User 42");
        assert_eq!(json["participant_identity"], "lk-42");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_decode_ignores_non_json() {
        assert!(HandRaiseMessage::decode(b"\x00\x01binary frame").is_none());
        assert!(HandRaiseMessage::decode(b"").is_none());
    }

    #[test]
    fn test_decode_ignores_unrelated_types() {
        let chat = br#"{"type": "chat_message", "text": "hello"}"#;
        assert!(HandRaiseMessage::decode(chat).is_none());

        let reaction = br#"{"type": "reaction", "emoji": "+1", "user_id": "3"}"#;
        assert!(HandRaiseMessage::decode(reaction).is_none());
    }

    #[test]
    fn test_decode_ignores_non_object_json() {
        assert!(HandRaiseMessage::decode(br#""hand_raise_update""#).is_none());
        assert!(HandRaiseMessage::decode(br#"[{"type": "clear_all_hands"}]"#).is_none());
        assert!(HandRaiseMessage::decode(br#"{"type": 5}"#).is_none());
    }

    #[test]
    fn test_decode_accepts_numeric_user_id() {
        let raw = br#"{"type": "hand_raise_update", "user_id": 42, "action": "lower", "timestamp": 1}"#;
        let msg = HandRaiseMessage::decode(raw).unwrap();

        assert_eq!(msg.kind, MessageKind::HandRaiseUpdate);
        assert_eq!(msg.user_id, Some(UserId::from("42")));
        assert_eq!(msg.hand_action(), Some(HandAction::Lower));
        assert_eq!(msg.timestamp, 1);
    }

    #[test]
    fn test_decode_is_lenient_past_type() {
        let raw = br#"{"type": "hand_state_sync", "user_id": {"nested": true}, "timestamp": "soon"}"#;
        let msg = HandRaiseMessage::decode(raw).unwrap();

        assert_eq!(msg.kind, MessageKind::HandStateSync);
        assert!(msg.user_id.is_none());
        assert_eq!(msg.timestamp, 0);
    }

    #[test]
    fn test_own_hand_raised_only_for_self_updates_and_clear() {
        let me = UserId::from("1");

        let mine = HandRaiseMessage::hand_raise_update(&user("1"), HandAction::Raise);
        assert_eq!(mine.own_hand_raised(&me), Some(true));

        let theirs = HandRaiseMessage::hand_raise_update(&user("2"), HandAction::Raise);
        assert_eq!(theirs.own_hand_raised(&me), None);

        let host = user("9");
        let ack = HandRaiseMessage::hand_acknowledgment(&host, &me, "User 1", HostAction::Acknowledge);
        assert_eq!(ack.own_hand_raised(&me), None);

        let clear = HandRaiseMessage::clear_all_hands(&host);
        assert_eq!(clear.own_hand_raised(&me), Some(false));
    }

    #[test]
    fn test_unknown_action_on_own_update_is_ignored() {
        let raw = br#"{"type": "hand_raise_update", "user_id": "1", "action": "wave"}"#;
        let msg = HandRaiseMessage::decode(raw).unwrap();
        assert_eq!(msg.own_hand_raised(&UserId::from("1")), None);
    }

    #[test]
    fn test_decode_of_encoded_acknowledgment_keeps_extras() {
        let host = user("9");
        let msg = HandRaiseMessage::hand_acknowledgment(
            &host,
            &UserId::from("4"),
            "Dee",
            HostAction::Acknowledge,
        )
        .with_data(&serde_json::json!({"status": "acknowledged"}));

        let decoded = HandRaiseMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.kind, MessageKind::HandAcknowledgment);
        assert_eq!(decoded.action.as_deref(), Some("acknowledge"));
        assert_eq!(decoded.extra["host_id"], "9");
        assert_eq!(decoded.extra["data"]["status"], "acknowledged");
    }
}
