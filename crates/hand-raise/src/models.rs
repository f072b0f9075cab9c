//! Roster entries and REST payloads exchanged with the hand-raise service.

use common::types::{MeetingId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandStatus {
    /// Raised, not yet handled by a host.
    Waiting,
    /// A host has acknowledged the hand.
    Acknowledged,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

/// One raised hand in the meeting roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaisedHand {
    pub user_id: UserId,

    /// Name snapshot taken when the hand was raised.
    #[serde(rename = "user_name", alias = "display_name", default)]
    pub display_name: String,

    /// Participant identity in the real-time media session.
    #[serde(
        rename = "participant_identity",
        alias = "connection_identity",
        default
    )]
    pub connection_identity: String,

    pub status: HandStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raised_at: Option<String>,
}

impl RaisedHand {
    /// True for entries that count as a raised hand.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.status, HandStatus::Waiting | HandStatus::Acknowledged)
    }
}

/// True when `roster` holds an active entry for `user_id`.
#[must_use]
pub fn roster_has_active_hand(roster: &[RaisedHand], user_id: &UserId) -> bool {
    roster
        .iter()
        .any(|hand| hand.is_active() && &hand.user_id == user_id)
}

/// Action on one's own hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandAction {
    Raise,
    Lower,
}

impl HandAction {
    /// The action that moves away from the given raised state.
    #[must_use]
    pub const fn toggle_from(is_raised: bool) -> Self {
        if is_raised {
            HandAction::Lower
        } else {
            HandAction::Raise
        }
    }

    /// Raised state after this action succeeds.
    #[must_use]
    pub const fn leaves_raised(self) -> bool {
        matches!(self, HandAction::Raise)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HandAction::Raise => "raise",
            HandAction::Lower => "lower",
        }
    }
}

impl fmt::Display for HandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host action on another participant's hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostAction {
    /// Mark the hand as seen; it stays in the roster.
    Acknowledge,
    /// Lower the participant's hand on their behalf.
    Dismiss,
}

impl HostAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HostAction::Acknowledge => "acknowledge",
            HostAction::Dismiss => "dismiss",
        }
    }
}

impl fmt::Display for HostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standing of the local participant in the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    #[default]
    Participant,
    CoHost,
    Host,
}

impl ParticipantRole {
    /// Hosts and co-hosts may acknowledge and clear hands.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, ParticipantRole::Host | ParticipantRole::CoHost)
    }
}

impl FromStr for ParticipantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "participant" | "attendee" => Ok(ParticipantRole::Participant),
            "co_host" | "cohost" => Ok(ParticipantRole::CoHost),
            "host" => Ok(ParticipantRole::Host),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The participant a coordinator acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub display_name: String,
    pub connection_identity: String,
    pub role: ParticipantRole,
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ToggleHandRequest<'a> {
    pub meeting_id: &'a MeetingId,
    pub user_id: &'a UserId,
    pub user_name: &'a str,
    pub participant_identity: &'a str,
    pub action: HandAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcknowledgeHandRequest<'a> {
    pub meeting_id: &'a MeetingId,
    pub host_user_id: &'a UserId,
    pub user_id: &'a UserId,
    pub user_name: &'a str,
    pub action: HostAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearHandsRequest<'a> {
    pub meeting_id: &'a MeetingId,
    pub host_user_id: &'a UserId,
}

// ============================================================================
// Response bodies
// ============================================================================

/// `GET .../hands`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub raised_hands: Vec<RaisedHand>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET .../status/{user_id}`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OwnStatusResponse {
    #[serde(default)]
    pub hand_raised: bool,
}

/// Shape shared by toggle, acknowledge and clear.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    /// Whether the server wants the client to fan the change out over the data channel.
    #[serde(default = "default_true")]
    pub send_via_livekit: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub message: Option<String>,
}

impl Default for ActionResponse {
    fn default() -> Self {
        Self {
            success: true,
            send_via_livekit: true,
            data: serde_json::Value::Null,
            message: None,
        }
    }
}

/// `GET .../stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandRaiseStats {
    #[serde(default)]
    pub total_raised: u32,
    #[serde(default)]
    pub waiting: u32,
    #[serde(default)]
    pub acknowledged: u32,
    #[serde(default)]
    pub total_lowered: u32,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_response_preserves_server_order() {
        let json = r#"{
            "success": true,
            "raised_hands": [
                {"user_id": 9, "user_name": "Zed", "participant_identity": "zed-1", "status": "waiting"},
                {"user_id": "3", "user_name": "Amy", "participant_identity": "amy-1", "status": "acknowledged",
                 "raised_at": "2026-01-01T10:00:00Z"}
            ]
        }"#;

        let roster: RosterResponse = serde_json::from_str(json).unwrap();
        let ids: Vec<_> = roster
            .raised_hands
            .iter()
            .map(|h| h.user_id.as_str())
            .collect();
        assert_eq!(ids, vec!["9", "3"]);
        assert_eq!(roster.raised_hands[1].status, HandStatus::Acknowledged);
        assert_eq!(
            roster.raised_hands[1].raised_at.as_deref(),
            Some("2026-01-01T10:00:00Z")
        );
    }

    #[test]
    fn test_unknown_status_is_not_active() {
        let hand: RaisedHand = serde_json::from_str(
            r#"{"user_id": "1", "user_name": "A", "participant_identity": "a", "status": "expired"}"#,
        )
        .unwrap();
        assert_eq!(hand.status, HandStatus::Unknown);
        assert!(!hand.is_active());
        assert!(!roster_has_active_hand(&[hand], &UserId::from("1")));
    }

    #[test]
    fn test_roster_accepts_alternate_field_names() {
        let hand: RaisedHand = serde_json::from_str(
            r#"{"user_id": "5", "display_name": "Bo", "connection_identity": "bo-x", "status": "waiting"}"#,
        )
        .unwrap();
        assert_eq!(hand.display_name, "Bo");
        assert_eq!(hand.connection_identity, "bo-x");
    }

    #[test]
    fn test_action_response_defaults() {
        let resp: ActionResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(resp.send_via_livekit);
        assert!(resp.data.is_null());

        let resp: ActionResponse =
            serde_json::from_str(r#"{"success": false, "message": "disabled"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.message.as_deref(), Some("disabled"));
    }

    #[test]
    fn test_toggle_request_wire_names() {
        let meeting = MeetingId::from("m-1");
        let user = UserId::from("u-1");
        let body = ToggleHandRequest {
            meeting_id: &meeting,
            user_id: &user,
            user_name: "Ada",
            participant_identity: "ada-lk",
            action: HandAction::Raise,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["meeting_id"], "m-1");
        assert_eq!(json["user_name"], "Ada");
        assert_eq!(json["participant_identity"], "ada-lk");
        assert_eq!(json["action"], "raise");
    }

    #[test]
    fn test_hand_action_toggle() {
        assert_eq!(HandAction::toggle_from(false), HandAction::Raise);
        assert_eq!(HandAction::toggle_from(true), HandAction::Lower);
        assert!(HandAction::Raise.leaves_raised());
        assert!(!HandAction::Lower.leaves_raised());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Host".parse::<ParticipantRole>(), Ok(ParticipantRole::Host));
        assert_eq!(
            "co-host".parse::<ParticipantRole>(),
            Ok(ParticipantRole::CoHost)
        );
        assert!("moderator".parse::<ParticipantRole>().is_err());
        assert!(ParticipantRole::CoHost.is_privileged());
        assert!(!ParticipantRole::Participant.is_privileged());
    }
}
