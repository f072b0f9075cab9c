//! iMeetPro Hand-Raise Coordinator
//!
//! Client-side coordination of the "raised hands" queue for one participant
//! in one live meeting. Three information sources are reconciled:
//!
//! - the participant's own optimistic toggles
//! - a REST roster fetched on a fixed polling interval (authoritative)
//! - best-effort broadcasts on the media session's data channel (hints)
//!
//! # Architecture
//!
//! ```text
//! UI ──actions──▶ HandRaiseCoordinator ──REST──▶ HandRaiseService (remote)
//!                   │   ▲        │
//!                   │   │        └──send──▶ DataChannel (media SDK)
//!                   │   └── InboundPacket ◀── DataChannel
//!                   └── watch::Receiver<HandRaiseSnapshot> ──▶ UI
//! ```
//!
//! The timer and every recognized broadcast both feed one
//! [`HandRaiseCoordinator::refresh_from_source`] path, so the broadcast
//! channel never carries state by itself.
//!
//! # Modules
//!
//! - [`config`] - Configuration from environment
//! - [`coordinator`] - Lifecycle, polling and actions
//! - [`channel`] - Data channel seam
//! - [`errors`] - Error types with UI-safe messages
//! - [`messages`] - Broadcast envelope codec
//! - [`models`] - Roster and REST payload types
//! - [`observability`] - Metrics
//! - [`service`] - Remote hand-raise service trait and HTTP client

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod messages;
pub mod models;
pub mod observability;
pub mod service;

pub use channel::{DataChannel, DisconnectedChannel, InboundPacket, Reliability};
pub use coordinator::{ActionOutcome, CoordinatorPhase, HandRaiseCoordinator, HandRaiseSnapshot};
pub use errors::HandRaiseError;
pub use models::{CurrentUser, HandAction, HandStatus, HostAction, ParticipantRole, RaisedHand};
pub use service::{HandRaiseService, HttpHandRaiseService};
