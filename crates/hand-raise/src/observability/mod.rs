//! Observability for the hand-raise coordinator.
//!
//! Metric labels are bounded to keep cardinality low:
//! - `action`: toggle, acknowledge, clear
//! - `status`: success, error, skipped, denied
//! - `message_type`: the four broadcast kinds
//! - `error_kind`: bounded by [`crate::HandRaiseError::kind`]
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `hr_polls_total` | Counter | `status`, `error_kind` | Roster refreshes by outcome |
//! | `hr_refresh_duration_seconds` | Histogram | `trigger` | Roster refresh latency |
//! | `hr_actions_total` | Counter | `action`, `status` | User actions by outcome |
//! | `hr_broadcasts_sent_total` | Counter | `message_type`, `status` | Outbound data channel sends |
//! | `hr_inbound_messages_total` | Counter | `message_type` | Inbound messages recognized or ignored |
//! | `hr_polling_stopped_total` | Counter | `reason` | Polling loop exits |

pub mod metrics;

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
///
/// Library events carry explicit `hr.*` targets, so those are listed
/// alongside the crate and binary module paths.
pub const DEFAULT_LOG_FILTER: &str = "hand_raise=debug,hand_raise_watch=debug,hr=debug";

pub use self::metrics::{
    init_metrics_recorder, record_action, record_broadcast_sent, record_inbound_message,
    record_poll, record_polling_stopped, record_refresh_duration,
};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::EnvFilter;

    #[test]
    fn test_default_log_filter_enables_library_targets() {
        let subscriber = tracing_subscriber::registry().with(EnvFilter::new(DEFAULT_LOG_FILTER));

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "hr.coordinator", Level::WARN));
            assert!(tracing::enabled!(target: "hr.service", Level::DEBUG));
            assert!(tracing::enabled!(target: "hr.channel", Level::DEBUG));
            assert!(tracing::enabled!(target: "hand_raise_watch", Level::INFO));
            assert!(!tracing::enabled!(target: "hr.coordinator", Level::TRACE));
            assert!(!tracing::enabled!(target: "reqwest::connect", Level::DEBUG));
        });
    }
}
