//! In-memory hand-raise service.
//!
//! Behaves like the REST backend for any number of meetings:
//! - rosters are kept in raise order (FIFO)
//! - acknowledge moves an entry to `acknowledged`, dismiss removes it
//! - a meeting marked gone answers every call with `MeetingNotFound`
//!
//! Failure injection and call counting support the coordinator tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use hand_raise_test_utils::{MockCall, MockHandRaiseService};
//!
//! let service = MockHandRaiseService::new();
//! service.set_outage(true);          // roster and status calls fail with 503
//! service.hold_toggles();            // toggles park until release_toggle()
//! assert_eq!(service.call_count(MockCall::EndSession), 0);
//! ```

use async_trait::async_trait;
use common::types::{MeetingId, UserId};
use hand_raise::models::{ActionResponse, HandAction, HandRaiseStats, HandStatus, HostAction};
use hand_raise::{HandRaiseError, HandRaiseService, RaisedHand};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Service operations, for call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    StartSession,
    EndSession,
    GetRoster,
    GetOwnStatus,
    Toggle,
    Acknowledge,
    Clear,
    Stats,
}

#[derive(Debug, Default)]
struct MeetingState {
    started: bool,
    hands: Vec<RaisedHand>,
    total_raised: u32,
    total_lowered: u32,
}

#[derive(Debug)]
struct MockInner {
    meetings: HashMap<String, MeetingState>,
    gone: HashSet<String>,
    calls: HashMap<MockCall, usize>,
    outage: bool,
    fail_next_action: Option<HandRaiseError>,
    send_via_livekit: bool,
    toggle_gate: Option<Arc<Semaphore>>,
}

impl Default for MockInner {
    fn default() -> Self {
        Self {
            meetings: HashMap::new(),
            gone: HashSet::new(),
            calls: HashMap::new(),
            outage: false,
            fail_next_action: None,
            send_via_livekit: true,
            toggle_gate: None,
        }
    }
}

/// Mock hand-raise service shared by every participant of a test.
#[derive(Debug, Clone, Default)]
pub struct MockHandRaiseService {
    inner: Arc<Mutex<MockInner>>,
}

fn outage_error() -> HandRaiseError {
    HandRaiseError::RequestFailed {
        status: 503,
        body: "service unavailable".to_string(),
    }
}

fn ok_response(send_via_livekit: bool, data: serde_json::Value) -> ActionResponse {
    ActionResponse {
        success: true,
        send_via_livekit,
        data,
        message: None,
    }
}

impl MockHandRaiseService {
    /// Create a service with no meetings; meetings appear on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `call` was invoked.
    pub fn call_count(&self, call: MockCall) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.calls.get(&call).copied().unwrap_or(0)
    }

    /// Current roster for a meeting.
    pub fn raised_hands(&self, meeting_id: &MeetingId) -> Vec<RaisedHand> {
        let inner = self.inner.lock().unwrap();
        inner
            .meetings
            .get(meeting_id.as_str())
            .map(|m| m.hands.clone())
            .unwrap_or_default()
    }

    /// Whether `start_session` has been called for the meeting.
    pub fn is_started(&self, meeting_id: &MeetingId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .meetings
            .get(meeting_id.as_str())
            .is_some_and(|m| m.started)
    }

    /// Raise a hand server-side without going through a coordinator.
    pub fn seed_raised_hand(&self, meeting_id: &MeetingId, hand: RaisedHand) {
        let mut inner = self.inner.lock().unwrap();
        let meeting = inner
            .meetings
            .entry(meeting_id.as_str().to_string())
            .or_default();
        meeting.total_raised += 1;
        meeting.hands.push(hand);
    }

    /// While set, roster and own-status calls fail with a 503.
    pub fn set_outage(&self, outage: bool) {
        self.inner.lock().unwrap().outage = outage;
    }

    /// Fail the next toggle, acknowledge or clear with `error`.
    pub fn fail_next_action(&self, error: HandRaiseError) {
        self.inner.lock().unwrap().fail_next_action = Some(error);
    }

    /// Value of `send_via_livekit` in action responses (default true).
    pub fn set_send_via_livekit(&self, send: bool) {
        self.inner.lock().unwrap().send_via_livekit = send;
    }

    /// Make the meeting disappear; every call for it returns `MeetingNotFound`.
    pub fn end_meeting(&self, meeting_id: &MeetingId) {
        let mut inner = self.inner.lock().unwrap();
        inner.meetings.remove(meeting_id.as_str());
        inner.gone.insert(meeting_id.as_str().to_string());
    }

    /// Park every toggle until [`Self::release_toggle`] is called.
    pub fn hold_toggles(&self) {
        self.inner.lock().unwrap().toggle_gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let one parked toggle proceed.
    pub fn release_toggle(&self) {
        if let Some(gate) = &self.inner.lock().unwrap().toggle_gate {
            gate.add_permits(1);
        }
    }

    /// Count the call and reject gone meetings.
    fn enter(&self, call: MockCall, meeting_id: &MeetingId) -> Result<(), HandRaiseError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.calls.entry(call).or_insert(0) += 1;
        if inner.gone.contains(meeting_id.as_str()) {
            return Err(HandRaiseError::MeetingNotFound(meeting_id.to_string()));
        }
        Ok(())
    }

    fn take_action_failure(&self) -> Result<(), HandRaiseError> {
        match self.inner.lock().unwrap().fail_next_action.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn check_outage(&self) -> Result<(), HandRaiseError> {
        if self.inner.lock().unwrap().outage {
            Err(outage_error())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HandRaiseService for MockHandRaiseService {
    async fn start_session(&self, meeting_id: &MeetingId) -> Result<(), HandRaiseError> {
        self.enter(MockCall::StartSession, meeting_id)?;
        let mut inner = self.inner.lock().unwrap();
        inner
            .meetings
            .entry(meeting_id.as_str().to_string())
            .or_default()
            .started = true;
        Ok(())
    }

    async fn end_session(&self, meeting_id: &MeetingId) -> Result<(), HandRaiseError> {
        self.enter(MockCall::EndSession, meeting_id)?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(meeting) = inner.meetings.get_mut(meeting_id.as_str()) {
            meeting.started = false;
        }
        Ok(())
    }

    async fn get_roster(&self, meeting_id: &MeetingId) -> Result<Vec<RaisedHand>, HandRaiseError> {
        self.enter(MockCall::GetRoster, meeting_id)?;
        self.check_outage()?;
        Ok(self.raised_hands(meeting_id))
    }

    async fn get_own_status(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Result<bool, HandRaiseError> {
        self.enter(MockCall::GetOwnStatus, meeting_id)?;
        self.check_outage()?;
        Ok(self
            .raised_hands(meeting_id)
            .iter()
            .any(|hand| &hand.user_id == user_id && hand.is_active()))
    }

    async fn toggle_hand(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        display_name: &str,
        connection_identity: &str,
        action: HandAction,
    ) -> Result<ActionResponse, HandRaiseError> {
        self.enter(MockCall::Toggle, meeting_id)?;

        let gate = self.inner.lock().unwrap().toggle_gate.clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        self.take_action_failure()?;

        let mut inner = self.inner.lock().unwrap();
        let send_via_livekit = inner.send_via_livekit;
        let meeting = inner
            .meetings
            .entry(meeting_id.as_str().to_string())
            .or_default();

        let was_raised = meeting.hands.iter().any(|h| &h.user_id == user_id);
        meeting.hands.retain(|h| &h.user_id != user_id);

        match action {
            HandAction::Raise => {
                meeting.hands.push(RaisedHand {
                    user_id: user_id.clone(),
                    display_name: display_name.to_string(),
                    connection_identity: connection_identity.to_string(),
                    status: HandStatus::Waiting,
                    raised_at: Some(chrono::Utc::now().to_rfc3339()),
                });
                meeting.total_raised += 1;
            }
            HandAction::Lower if was_raised => meeting.total_lowered += 1,
            HandAction::Lower => {}
        }

        Ok(ok_response(
            send_via_livekit,
            serde_json::json!({ "action": action.as_str(), "user_id": user_id.as_str() }),
        ))
    }

    async fn acknowledge_hand(
        &self,
        meeting_id: &MeetingId,
        host_user_id: &UserId,
        target_user_id: &UserId,
        _target_name: &str,
        action: HostAction,
    ) -> Result<ActionResponse, HandRaiseError> {
        self.enter(MockCall::Acknowledge, meeting_id)?;
        self.take_action_failure()?;

        let mut inner = self.inner.lock().unwrap();
        let send_via_livekit = inner.send_via_livekit;
        let meeting = inner
            .meetings
            .entry(meeting_id.as_str().to_string())
            .or_default();

        if !meeting.hands.iter().any(|h| &h.user_id == target_user_id) {
            return Err(HandRaiseError::Rejected("Hand is not raised".to_string()));
        }

        match action {
            HostAction::Acknowledge => {
                for hand in &mut meeting.hands {
                    if &hand.user_id == target_user_id {
                        hand.status = HandStatus::Acknowledged;
                    }
                }
            }
            HostAction::Dismiss => {
                meeting.hands.retain(|h| &h.user_id != target_user_id);
                meeting.total_lowered += 1;
            }
        }

        Ok(ok_response(
            send_via_livekit,
            serde_json::json!({ "host_id": host_user_id.as_str(), "action": action.as_str() }),
        ))
    }

    async fn clear_all_hands(
        &self,
        meeting_id: &MeetingId,
        _host_user_id: &UserId,
    ) -> Result<ActionResponse, HandRaiseError> {
        self.enter(MockCall::Clear, meeting_id)?;
        self.take_action_failure()?;

        let mut inner = self.inner.lock().unwrap();
        let send_via_livekit = inner.send_via_livekit;
        let meeting = inner
            .meetings
            .entry(meeting_id.as_str().to_string())
            .or_default();
        let cleared = meeting.hands.len();
        meeting.total_lowered += u32::try_from(cleared).unwrap();
        meeting.hands.clear();

        Ok(ok_response(
            send_via_livekit,
            serde_json::json!({ "cleared_count": cleared }),
        ))
    }

    async fn get_stats(&self, meeting_id: &MeetingId) -> Result<HandRaiseStats, HandRaiseError> {
        self.enter(MockCall::Stats, meeting_id)?;
        let inner = self.inner.lock().unwrap();
        let Some(meeting) = inner.meetings.get(meeting_id.as_str()) else {
            return Ok(HandRaiseStats::default());
        };

        let count = |status: HandStatus| {
            u32::try_from(meeting.hands.iter().filter(|h| h.status == status).count()).unwrap()
        };
        Ok(HandRaiseStats {
            total_raised: meeting.total_raised,
            waiting: count(HandStatus::Waiting),
            acknowledged: count(HandStatus::Acknowledged),
            total_lowered: meeting.total_lowered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting() -> MeetingId {
        MeetingId::from("mtg-1")
    }

    #[tokio::test]
    async fn test_roster_is_fifo() {
        let service = MockHandRaiseService::new();
        for (id, name) in [("b", "Bea"), ("a", "Al"), ("c", "Cy")] {
            service
                .toggle_hand(&meeting(), &UserId::from(id), name, id, HandAction::Raise)
                .await
                .unwrap();
        }

        let roster = service.get_roster(&meeting()).await.unwrap();
        let ids: Vec<_> = roster.iter().map(|h| h.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_acknowledge_and_stats() {
        let service = MockHandRaiseService::new();
        let user = UserId::from("u1");
        service
            .toggle_hand(&meeting(), &user, "U", "u", HandAction::Raise)
            .await
            .unwrap();
        service
            .acknowledge_hand(
                &meeting(),
                &UserId::from("host"),
                &user,
                "U",
                HostAction::Acknowledge,
            )
            .await
            .unwrap();

        let stats = service.get_stats(&meeting()).await.unwrap();
        assert_eq!(stats.total_raised, 1);
        assert_eq!(stats.acknowledged, 1);
        assert_eq!(stats.waiting, 0);
        assert!(service.get_own_status(&meeting(), &user).await.unwrap());
    }

    #[tokio::test]
    async fn test_acknowledge_unknown_hand_is_rejected() {
        let service = MockHandRaiseService::new();
        let err = service
            .acknowledge_hand(
                &meeting(),
                &UserId::from("host"),
                &UserId::from("nobody"),
                "N",
                HostAction::Acknowledge,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HandRaiseError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_ended_meeting_is_not_found() {
        let service = MockHandRaiseService::new();
        service.end_meeting(&meeting());

        let err = service.get_roster(&meeting()).await.unwrap_err();
        assert!(err.is_meeting_gone());
        assert_eq!(service.call_count(MockCall::GetRoster), 1);
    }

    #[tokio::test]
    async fn test_outage_only_affects_reads() {
        let service = MockHandRaiseService::new();
        service.set_outage(true);

        assert!(service.get_roster(&meeting()).await.is_err());
        assert!(service
            .toggle_hand(&meeting(), &UserId::from("u"), "U", "u", HandAction::Raise)
            .await
            .is_ok());
    }
}
