//! Hand-raise error types.
//!
//! Every failure in this crate degrades to "hand-raise state may be briefly
//! stale". Errors are logged with full detail; only [`HandRaiseError::client_message`]
//! text is meant for display in the UI.

use thiserror::Error;

/// Hand-raise error type.
#[derive(Debug, Clone, Error)]
pub enum HandRaiseError {
    /// Transport-level HTTP failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success HTTP status from the hand-raise service.
    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// The meeting no longer exists on the server (404).
    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),

    /// The service answered 2xx but with `success: false`.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Real-time data channel send failed.
    #[error("Data channel error: {0}")]
    Channel(String),

    /// Caller lacks host/co-host standing for a privileged action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Coordinator has no session bound, or was already bound.
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Coordinator was cleaned up.
    #[error("Coordinator has been cleaned up")]
    CleanedUp,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HandRaiseError {
    /// True when the server reports the meeting is gone; polling stops on this.
    #[must_use]
    pub fn is_meeting_gone(&self) -> bool {
        matches!(
            self,
            HandRaiseError::MeetingNotFound(_) | HandRaiseError::RequestFailed { status: 404, .. }
        )
    }

    /// Short label used for metrics and log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            HandRaiseError::Http(_) => "http",
            HandRaiseError::RequestFailed { .. } => "status",
            HandRaiseError::MeetingNotFound(_) => "not_found",
            HandRaiseError::Rejected(_) => "rejected",
            HandRaiseError::InvalidResponse(_) => "invalid_response",
            HandRaiseError::Channel(_) => "channel",
            HandRaiseError::PermissionDenied(_) => "permission_denied",
            HandRaiseError::InvalidSession(_) => "invalid_session",
            HandRaiseError::CleanedUp => "cleaned_up",
            HandRaiseError::Config(_) => "config",
        }
    }

    /// Returns a UI-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            HandRaiseError::Http(_)
            | HandRaiseError::RequestFailed { .. }
            | HandRaiseError::InvalidResponse(_)
            | HandRaiseError::Channel(_)
            | HandRaiseError::Config(_) => "Hand raise is temporarily unavailable".to_string(),
            HandRaiseError::MeetingNotFound(_) => "This meeting has ended".to_string(),
            HandRaiseError::Rejected(msg) | HandRaiseError::PermissionDenied(msg) => msg.clone(),
            HandRaiseError::InvalidSession(_) => "Not connected to a meeting".to_string(),
            HandRaiseError::CleanedUp => "Hand raise has been closed".to_string(),
        }
    }
}
