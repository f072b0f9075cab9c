//! # Hand-Raise Test Utilities
//!
//! Mocks and fixtures for exercising the hand-raise coordinator without a
//! live service or media session.
//!
//! ## Modules
//!
//! - `mock_service` - In-memory hand-raise service with failure injection
//! - `mock_channel` - In-memory data channel hub connecting several coordinators
//! - `fixtures` - Test participants and coordinator wiring
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hand_raise_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let service = MockHandRaiseService::new();
//!     let hub = BroadcastHub::new();
//!     let meeting = TestMeeting::random();
//!
//!     let alice = spawn_participant(&service, &hub, &meeting, &TestParticipant::new("alice"));
//!     let host = spawn_participant(&service, &hub, &meeting, &TestParticipant::new("hank").host());
//!
//!     alice.toggle_own_hand().await.unwrap();
//!     // ...
//! }
//! ```

pub mod fixtures;
pub mod mock_channel;
pub mod mock_service;

pub use fixtures::{spawn_participant, spawn_participant_with_timing, TestMeeting, TestParticipant};
pub use mock_channel::{BroadcastHub, HubChannel};
pub use mock_service::{MockCall, MockHandRaiseService};
