//! Pre-configured test data fixtures for hand-raise testing.
//!
//! Provides:
//! - Meetings with random or fixed ids
//! - Participants with different roles
//! - Coordinators wired to a mock service and hub

use crate::mock_channel::BroadcastHub;
use crate::mock_service::MockHandRaiseService;
use common::types::{MeetingId, UserId};
use hand_raise::config::CoordinatorTiming;
use hand_raise::{
    CurrentUser, DataChannel, HandRaiseCoordinator, HandRaiseService, ParticipantRole,
};
use std::sync::Arc;
use uuid::Uuid;

/// Test meeting fixture.
#[derive(Debug, Clone)]
pub struct TestMeeting {
    /// Meeting ID.
    pub id: MeetingId,
}

impl TestMeeting {
    /// Create a new test meeting with the given ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: MeetingId::new(id),
        }
    }

    /// Create a test meeting with a random ID.
    #[must_use]
    pub fn random() -> Self {
        Self::new(format!("meeting-{}", Uuid::new_v4()))
    }
}

/// Test participant fixture.
#[derive(Debug, Clone)]
pub struct TestParticipant {
    /// User ID.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Media session identity.
    pub identity: String,
    /// Role in the meeting.
    pub role: ParticipantRole,
}

impl TestParticipant {
    /// Participant named after `user_id` with a derived identity.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let mut name = user_id.clone();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        Self {
            identity: format!("lk-{user_id}"),
            name,
            user_id,
            role: ParticipantRole::Participant,
        }
    }

    /// Make this participant the host.
    #[must_use]
    pub fn host(mut self) -> Self {
        self.role = ParticipantRole::Host;
        self
    }

    /// Make this participant a co-host.
    #[must_use]
    pub fn co_host(mut self) -> Self {
        self.role = ParticipantRole::CoHost;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::new(self.user_id.clone())
    }

    #[must_use]
    pub fn current_user(&self) -> CurrentUser {
        CurrentUser {
            user_id: self.user_id(),
            display_name: self.name.clone(),
            connection_identity: self.identity.clone(),
            role: self.role,
        }
    }
}

/// Bind a coordinator for `participant` with default timing.
///
/// The coordinator publishes through `hub` and receives the other
/// participants' broadcasts. Must be called inside a tokio runtime.
pub fn spawn_participant(
    service: &MockHandRaiseService,
    hub: &BroadcastHub,
    meeting: &TestMeeting,
    participant: &TestParticipant,
) -> HandRaiseCoordinator {
    spawn_participant_with_timing(
        service,
        hub,
        meeting,
        participant,
        CoordinatorTiming::default(),
    )
}

/// [`spawn_participant`] with custom timing.
pub fn spawn_participant_with_timing(
    service: &MockHandRaiseService,
    hub: &BroadcastHub,
    meeting: &TestMeeting,
    participant: &TestParticipant,
    timing: CoordinatorTiming,
) -> HandRaiseCoordinator {
    // The channel needs the coordinator's inbound sender, and the coordinator
    // needs the channel; a late-bound slot breaks the cycle.
    let slot = Arc::new(LateChannel::default());
    let coordinator = HandRaiseCoordinator::new(
        Arc::new(service.clone()) as Arc<dyn HandRaiseService>,
        Arc::clone(&slot) as Arc<dyn DataChannel>,
        timing,
    );

    let channel = hub.connect(participant.identity.clone(), coordinator.inbound_sender());
    slot.set(channel);

    coordinator
        .bind(meeting.id.clone(), participant.current_user())
        .unwrap();
    coordinator
}

/// Data channel whose target is supplied after construction.
#[derive(Debug, Default)]
struct LateChannel {
    inner: std::sync::OnceLock<crate::mock_channel::HubChannel>,
}

impl LateChannel {
    fn set(&self, channel: crate::mock_channel::HubChannel) {
        let _ = self.inner.set(channel);
    }
}

#[async_trait::async_trait]
impl DataChannel for LateChannel {
    async fn send(
        &self,
        payload: Vec<u8>,
        reliability: hand_raise::Reliability,
    ) -> Result<(), hand_raise::HandRaiseError> {
        match self.inner.get() {
            Some(channel) => channel.send(payload, reliability).await,
            None => Err(hand_raise::HandRaiseError::Channel(
                "channel not attached".to_string(),
            )),
        }
    }
}
