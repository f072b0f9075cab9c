//! Hand-raise coordinator.
//!
//! One coordinator per (participant, meeting). It reconciles three sources:
//!
//! 1. the participant's own optimistic toggles,
//! 2. the REST roster, fetched on a fixed interval (authoritative),
//! 3. data channel broadcasts, which are only hints to refetch.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──bind──▶ (init_delay) ──▶ Initializing ──▶ Polling ──404──▶ Stopped
//!        │                                     │ (init_timeout fallback)  │
//!        └──────────────────────── cleanup ────┴──────────────────────────┴──▶ CleanedUp
//! ```
//!
//! `bind` spawns the coordinator task. The task owns the poll timer and the
//! inbound packet receiver and serializes both through one `select!` loop, so
//! polls never overlap. User actions run on the caller's task; all state is
//! published through a `watch` channel. Once `cleanup` has run, every state
//! setter is a no-op, including those of REST calls still in flight.
//!
//! Dropping the last handle cancels the task.

use crate::channel::{DataChannel, InboundPacket, Reliability};
use crate::config::CoordinatorTiming;
use crate::errors::HandRaiseError;
use crate::messages::{HandRaiseMessage, MessageKind};
use crate::models::{
    roster_has_active_hand, CurrentUser, HandAction, HandRaiseStats, HostAction, RaisedHand,
};
use crate::observability::metrics;
use crate::service::HandRaiseService;
use common::types::{MeetingId, UserId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, trace, warn};

/// Buffer for inbound data channel packets.
const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// Coordinator lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatorPhase {
    /// No session bound, or bound and waiting out the grace period.
    #[default]
    Uninitialized,
    /// Starting the server session and fetching own status.
    Initializing,
    /// Poll timer running.
    Polling,
    /// Polling stopped because the meeting no longer exists.
    Stopped,
    /// Terminal.
    CleanedUp,
}

/// Everything a UI needs to render hand-raise state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandRaiseSnapshot {
    pub phase: CoordinatorPhase,
    /// Optimistic mirror of this participant's roster entry.
    pub is_hand_raised: bool,
    /// Latched once the first status fetch (or its fallback) completes.
    pub initialized: bool,
    /// Last known-good roster, in server order.
    pub roster: Vec<RaisedHand>,
    /// UI-safe message of the last failure; cleared by a successful action.
    pub last_error: Option<String>,
    /// An action is in flight.
    pub is_loading: bool,
}

/// Result of a user action that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The service accepted the action.
    Applied,
    /// Another action was already in flight; nothing was sent.
    Skipped,
}

struct Session {
    meeting_id: MeetingId,
    user: CurrentUser,
}

struct Inner {
    service: Arc<dyn HandRaiseService>,
    channel: Arc<dyn DataChannel>,
    timing: CoordinatorTiming,
    session: OnceLock<Session>,
    state: watch::Sender<HandRaiseSnapshot>,
    in_flight: AtomicBool,
    cleaned_up: AtomicBool,
    cancel: CancellationToken,
    refresh_gate: tokio::sync::Mutex<()>,
    inbound_tx: mpsc::Sender<InboundPacket>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundPacket>>>,
}

/// Cloneable handle to a hand-raise coordinator.
#[derive(Clone)]
pub struct HandRaiseCoordinator {
    inner: Arc<Inner>,
    _drop_guard: Arc<DropGuard>,
}

impl std::fmt::Debug for HandRaiseCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandRaiseCoordinator")
            .field("meeting_id", &self.inner.session.get().map(|s| &s.meeting_id))
            .field("phase", &self.inner.state.borrow().phase)
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag when an action finishes.
struct InFlightGuard<'a> {
    inner: &'a Inner,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(inner: &'a Inner) -> Option<Self> {
        inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        inner.update(|s| {
            s.is_loading = true;
            true
        });
        Some(Self { inner })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::SeqCst);
        self.inner.update(|s| {
            let changed = s.is_loading;
            s.is_loading = false;
            changed
        });
    }
}

impl HandRaiseCoordinator {
    /// Create an unbound coordinator.
    #[must_use]
    pub fn new(
        service: Arc<dyn HandRaiseService>,
        channel: Arc<dyn DataChannel>,
        timing: CoordinatorTiming,
    ) -> Self {
        let (state, _) = watch::channel(HandRaiseSnapshot::default());
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let drop_guard = cancel.clone().drop_guard();

        Self {
            inner: Arc::new(Inner {
                service,
                channel,
                timing,
                session: OnceLock::new(),
                state,
                in_flight: AtomicBool::new(false),
                cleaned_up: AtomicBool::new(false),
                cancel,
                refresh_gate: tokio::sync::Mutex::new(()),
                inbound_tx,
                inbound_rx: Mutex::new(Some(inbound_rx)),
            }),
            _drop_guard: Arc::new(drop_guard),
        }
    }

    /// Bind the coordinator to a meeting and start its task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `InvalidSession` if either id is blank or the coordinator is already bound
    /// - `Config` if the poll interval is zero
    /// - `CleanedUp` after [`Self::cleanup`]
    pub fn bind(&self, meeting_id: MeetingId, user: CurrentUser) -> Result<(), HandRaiseError> {
        let inner = &self.inner;
        inner.ensure_active()?;

        if meeting_id.is_blank() || user.user_id.is_blank() {
            return Err(HandRaiseError::InvalidSession(
                "meeting id and user id are required".to_string(),
            ));
        }

        // interval() panics on a zero period
        if inner.timing.poll_interval.is_zero() {
            return Err(HandRaiseError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        inner
            .session
            .set(Session { meeting_id, user })
            .map_err(|_| {
                HandRaiseError::InvalidSession("coordinator is already bound".to_string())
            })?;

        let inbound = inner
            .inbound_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| mpsc::channel(1).1);

        tokio::spawn(Arc::clone(inner).run(inbound));
        Ok(())
    }

    /// Sender the media SDK glue pushes inbound data channel packets into.
    #[must_use]
    pub fn inbound_sender(&self) -> mpsc::Sender<InboundPacket> {
        self.inner.inbound_tx.clone()
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> HandRaiseSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HandRaiseSnapshot> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn is_hand_raised(&self) -> bool {
        self.inner.state.borrow().is_hand_raised
    }

    #[must_use]
    pub fn phase(&self) -> CoordinatorPhase {
        self.inner.state.borrow().phase
    }

    /// Raise the hand if lowered, lower it if raised.
    ///
    /// Returns `Skipped` without contacting the service while another action
    /// is in flight.
    ///
    /// # Errors
    ///
    /// Returns the service error; local state is left unchanged.
    pub async fn toggle_own_hand(&self) -> Result<ActionOutcome, HandRaiseError> {
        let inner = &self.inner;
        inner.ensure_active()?;
        let session = inner.session()?;

        let Some(_guard) = InFlightGuard::acquire(inner) else {
            debug!(target: "hr.coordinator", "Toggle skipped, action already in flight");
            metrics::record_action("toggle", "skipped");
            return Ok(ActionOutcome::Skipped);
        };

        let action = HandAction::toggle_from(inner.state.borrow().is_hand_raised);
        let user = &session.user;

        let response = match inner
            .service
            .toggle_hand(
                &session.meeting_id,
                &user.user_id,
                &user.display_name,
                &user.connection_identity,
                action,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(inner.action_failed("toggle", e)),
        };

        inner.update(|s| {
            s.is_hand_raised = action.leaves_raised();
            s.last_error = None;
            true
        });
        metrics::record_action("toggle", "success");
        info!(
            target: "hr.coordinator",
            meeting_id = %session.meeting_id,
            action = %action,
            "Hand toggled"
        );

        if response.send_via_livekit {
            inner
                .broadcast(HandRaiseMessage::hand_raise_update(user, action).with_data(&response.data))
                .await;
        }

        inner.refresh_logged("action").await;
        Ok(ActionOutcome::Applied)
    }

    /// Acknowledge or dismiss another participant's hand. Host or co-host only.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` for plain participants (no request is sent)
    /// - the service error otherwise
    pub async fn acknowledge_hand(
        &self,
        target_user_id: &UserId,
        target_name: &str,
        action: HostAction,
    ) -> Result<ActionOutcome, HandRaiseError> {
        let inner = &self.inner;
        inner.ensure_active()?;
        let session = inner.session()?;
        inner.ensure_privileged(session, "acknowledge")?;

        let Some(_guard) = InFlightGuard::acquire(inner) else {
            metrics::record_action("acknowledge", "skipped");
            return Ok(ActionOutcome::Skipped);
        };

        let response = match inner
            .service
            .acknowledge_hand(
                &session.meeting_id,
                &session.user.user_id,
                target_user_id,
                target_name,
                action,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(inner.action_failed("acknowledge", e)),
        };

        inner.update(|s| s.last_error.take().is_some());
        metrics::record_action("acknowledge", "success");
        info!(
            target: "hr.coordinator",
            meeting_id = %session.meeting_id,
            target_user_id = %target_user_id,
            action = %action,
            "Hand acknowledged"
        );

        if response.send_via_livekit {
            inner
                .broadcast(
                    HandRaiseMessage::hand_acknowledgment(
                        &session.user,
                        target_user_id,
                        target_name,
                        action,
                    )
                    .with_data(&response.data),
                )
                .await;
        }

        inner.refresh_logged("action").await;
        Ok(ActionOutcome::Applied)
    }

    /// Lower every hand in the meeting. Host or co-host only.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` for plain participants (no request is sent)
    /// - the service error otherwise
    pub async fn clear_all_hands(&self) -> Result<ActionOutcome, HandRaiseError> {
        let inner = &self.inner;
        inner.ensure_active()?;
        let session = inner.session()?;
        inner.ensure_privileged(session, "clear")?;

        let Some(_guard) = InFlightGuard::acquire(inner) else {
            metrics::record_action("clear", "skipped");
            return Ok(ActionOutcome::Skipped);
        };

        let response = match inner
            .service
            .clear_all_hands(&session.meeting_id, &session.user.user_id)
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(inner.action_failed("clear", e)),
        };

        {
            // Hold the gate so a refresh already in flight cannot restore the old roster
            let _gate = inner.refresh_gate.lock().await;
            inner.update(|s| {
                s.roster.clear();
                s.is_hand_raised = false;
                s.last_error = None;
                true
            });
        }
        metrics::record_action("clear", "success");
        info!(target: "hr.coordinator", meeting_id = %session.meeting_id, "All hands cleared");

        if response.send_via_livekit {
            inner
                .broadcast(HandRaiseMessage::clear_all_hands(&session.user).with_data(&response.data))
                .await;
        }

        Ok(ActionOutcome::Applied)
    }

    /// Apply one raw data channel payload.
    ///
    /// Returns the recognized message kind, or `None` when the payload was
    /// ignored. Every recognized message triggers a roster refresh.
    ///
    /// # Errors
    ///
    /// Returns the refresh error; the last known-good roster is kept.
    pub async fn handle_broadcast_message(
        &self,
        raw: &[u8],
    ) -> Result<Option<MessageKind>, HandRaiseError> {
        self.inner.handle_broadcast_message(raw).await
    }

    /// Refetch the roster and own status from the service.
    ///
    /// # Errors
    ///
    /// Returns the service error; the last known-good roster is kept.
    pub async fn refresh_from_source(&self) -> Result<(), HandRaiseError> {
        self.inner.ensure_active()?;
        self.inner.refresh("manual").await
    }

    /// Aggregate counts for the bound meeting.
    ///
    /// # Errors
    ///
    /// Returns the service error, or `InvalidSession` when unbound.
    pub async fn stats(&self) -> Result<HandRaiseStats, HandRaiseError> {
        let session = self.inner.session()?;
        self.inner.service.get_stats(&session.meeting_id).await
    }

    /// Stop polling, end the server session and reset state.
    ///
    /// Only the first call has any effect.
    pub async fn cleanup(&self) {
        let inner = &self.inner;
        if inner.cleaned_up.swap(true, Ordering::SeqCst) {
            return;
        }

        inner.cancel.cancel();
        inner.state.send_modify(|s| {
            *s = HandRaiseSnapshot {
                phase: CoordinatorPhase::CleanedUp,
                ..HandRaiseSnapshot::default()
            };
        });

        if let Some(session) = inner.session.get() {
            if let Err(e) = inner.service.end_session(&session.meeting_id).await {
                warn!(
                    target: "hr.coordinator",
                    meeting_id = %session.meeting_id,
                    error = %e,
                    "Failed to end hand-raise session"
                );
            }
            info!(target: "hr.coordinator", meeting_id = %session.meeting_id, "Coordinator cleaned up");
        }
    }
}

impl Inner {
    fn ensure_active(&self) -> Result<(), HandRaiseError> {
        if self.cleaned_up.load(Ordering::SeqCst) {
            Err(HandRaiseError::CleanedUp)
        } else {
            Ok(())
        }
    }

    fn session(&self) -> Result<&Session, HandRaiseError> {
        self.session
            .get()
            .ok_or_else(|| HandRaiseError::InvalidSession("coordinator is not bound".to_string()))
    }

    fn ensure_privileged(&self, session: &Session, action: &str) -> Result<(), HandRaiseError> {
        if session.user.role.is_privileged() {
            return Ok(());
        }
        metrics::record_action(action, "denied");
        Err(HandRaiseError::PermissionDenied(
            "Only the host or a co-host can do that".to_string(),
        ))
    }

    /// Apply `f` unless cleaned up; `f` returns whether anything changed.
    fn update(&self, f: impl FnOnce(&mut HandRaiseSnapshot) -> bool) {
        self.state.send_if_modified(|s| {
            if self.cleaned_up.load(Ordering::SeqCst) {
                return false;
            }
            f(s)
        });
    }

    fn set_phase(&self, phase: CoordinatorPhase) {
        self.update(|s| {
            let changed = s.phase != phase;
            s.phase = phase;
            changed
        });
    }

    fn action_failed(&self, action: &str, error: HandRaiseError) -> HandRaiseError {
        warn!(
            target: "hr.coordinator",
            action = action,
            error = %error,
            error_kind = error.kind(),
            "Hand-raise action failed"
        );
        metrics::record_action(action, "error");
        let message = error.client_message();
        self.update(|s| {
            s.last_error = Some(message);
            true
        });
        error
    }

    async fn broadcast(&self, message: HandRaiseMessage) {
        if self.cleaned_up.load(Ordering::SeqCst) {
            return;
        }
        let kind = message.kind.as_str();
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "hr.channel", message_type = kind, error = %e, "Failed to encode broadcast");
                metrics::record_broadcast_sent(kind, "error");
                return;
            }
        };

        match self.channel.send(payload, Reliability::Reliable).await {
            Ok(()) => {
                trace!(target: "hr.channel", message_type = kind, "Broadcast sent");
                metrics::record_broadcast_sent(kind, "success");
            }
            Err(e) => {
                debug!(target: "hr.channel", message_type = kind, error = %e, "Broadcast dropped");
                metrics::record_broadcast_sent(kind, "error");
            }
        }
    }

    async fn handle_broadcast_message(
        &self,
        raw: &[u8],
    ) -> Result<Option<MessageKind>, HandRaiseError> {
        if self.cleaned_up.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let Some(message) = HandRaiseMessage::decode(raw) else {
            trace!(target: "hr.channel", len = raw.len(), "Ignoring non hand-raise payload");
            metrics::record_inbound_message("ignored");
            return Ok(None);
        };
        metrics::record_inbound_message(message.kind.as_str());

        let Ok(session) = self.session() else {
            debug!(target: "hr.channel", message_type = message.kind.as_str(), "Broadcast before bind ignored");
            return Ok(None);
        };

        debug!(
            target: "hr.channel",
            message_type = message.kind.as_str(),
            user_id = ?message.user_id.as_ref().map(UserId::as_str),
            "Hand-raise broadcast received"
        );

        if let Some(raised) = message.own_hand_raised(&session.user.user_id) {
            self.update(|s| {
                let changed = s.is_hand_raised != raised;
                s.is_hand_raised = raised;
                changed
            });
        }

        self.refresh("broadcast").await?;
        Ok(Some(message.kind))
    }

    /// Fetch roster then own status. Serialized across callers.
    async fn refresh(&self, trigger: &'static str) -> Result<(), HandRaiseError> {
        self.ensure_active()?;
        let session = self.session()?;
        let _gate = self.refresh_gate.lock().await;
        let start = Instant::now();

        let result = self.fetch_into_state(session).await;

        metrics::record_refresh_duration(trigger, start.elapsed());
        match &result {
            Ok(()) => metrics::record_poll("success", None),
            Err(e) => {
                metrics::record_poll("error", Some(e.kind()));
                let message = e.client_message();
                self.update(|s| {
                    s.last_error = Some(message);
                    true
                });
            }
        }
        result
    }

    async fn fetch_into_state(&self, session: &Session) -> Result<(), HandRaiseError> {
        let roster = self.service.get_roster(&session.meeting_id).await?;
        let listed = roster_has_active_hand(&roster, &session.user.user_id);
        self.update(|s| {
            if s.roster == roster {
                return false;
            }
            s.roster = roster;
            true
        });

        let status = self
            .service
            .get_own_status(&session.meeting_id, &session.user.user_id)
            .await;
        let raised = match &status {
            Ok(raised) => *raised,
            // Own entry in the fresh roster stands in for the status call
            Err(_) => listed,
        };
        self.update(|s| {
            let changed = s.is_hand_raised != raised;
            s.is_hand_raised = raised;
            changed
        });
        status.map(|_| ())
    }

    async fn refresh_logged(&self, trigger: &'static str) {
        if let Err(e) = self.refresh(trigger).await {
            debug!(target: "hr.coordinator", trigger = trigger, error = %e, "Refresh failed");
        }
    }

    /// Start the server session and read own status. Never fails; a missing
    /// status defaults to lowered.
    async fn initialize(&self, session: &Session) {
        if let Err(e) = self.service.start_session(&session.meeting_id).await {
            warn!(
                target: "hr.coordinator",
                meeting_id = %session.meeting_id,
                error = %e,
                "Failed to start hand-raise session"
            );
        }

        let raised = match self
            .service
            .get_own_status(&session.meeting_id, &session.user.user_id)
            .await
        {
            Ok(raised) => raised,
            Err(e) => {
                warn!(
                    target: "hr.coordinator",
                    meeting_id = %session.meeting_id,
                    error = %e,
                    "Failed to fetch own hand status, assuming lowered"
                );
                false
            }
        };

        self.update(|s| {
            s.is_hand_raised = raised;
            s.initialized = true;
            true
        });
    }

    #[instrument(skip_all, name = "hr.coordinator.run")]
    async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<InboundPacket>) {
        let Ok(session) = self.session() else {
            return;
        };
        let timing = self.timing;

        tokio::select! {
            () = self.cancel.cancelled() => return,
            () = sleep(timing.init_delay) => {}
        }

        self.set_phase(CoordinatorPhase::Initializing);
        tokio::select! {
            () = self.cancel.cancelled() => return,
            result = timeout(timing.init_timeout, self.initialize(session)) => {
                if result.is_err() {
                    warn!(
                        target: "hr.coordinator",
                        meeting_id = %session.meeting_id,
                        timeout_ms = u64::try_from(timing.init_timeout.as_millis()).unwrap_or(u64::MAX),
                        "Initialization timed out, starting polling anyway"
                    );
                    self.update(|s| {
                        s.initialized = true;
                        true
                    });
                }
            }
        }

        self.set_phase(CoordinatorPhase::Polling);
        info!(
            target: "hr.coordinator",
            meeting_id = %session.meeting_id,
            poll_interval_ms = u64::try_from(timing.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "Hand-raise polling started"
        );

        let mut ticker = interval(timing.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let result = tokio::select! {
                () = self.cancel.cancelled() => {
                    metrics::record_polling_stopped("cancelled");
                    debug!(target: "hr.coordinator", "Polling cancelled");
                    break;
                }
                _ = ticker.tick() => self.refresh("timer").await,
                Some(packet) = inbound.recv() => {
                    self.handle_broadcast_message(&packet.payload).await.map(|_| ())
                }
            };

            if let Err(e) = result {
                if e.is_meeting_gone() {
                    info!(
                        target: "hr.coordinator",
                        meeting_id = %session.meeting_id,
                        "Meeting no longer exists, stopping hand-raise polling"
                    );
                    metrics::record_polling_stopped("meeting_gone");
                    self.set_phase(CoordinatorPhase::Stopped);
                    break;
                }
                debug!(
                    target: "hr.coordinator",
                    error = %e,
                    "Refresh failed, keeping last known roster"
                );
            }
        }
    }
}
