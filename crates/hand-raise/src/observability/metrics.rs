//! Metrics definitions for the hand-raise coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `hr_` prefix for hand-raise
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle.
///
/// Must be called before any metrics are recorded. Refresh latency buckets
/// are sized around the REST round trip, well under the 2s poll interval.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("hr_refresh".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set refresh duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Polling
// ============================================================================

/// Record one roster refresh.
///
/// Metric: `hr_polls_total`
/// Labels: `status` (success, error), `error_kind`
pub fn record_poll(status: &str, error_kind: Option<&str>) {
    counter!(
        "hr_polls_total",
        "status" => status.to_string(),
        "error_kind" => error_kind.unwrap_or("none").to_string()
    )
    .increment(1);
}

/// Record roster refresh latency.
///
/// Metric: `hr_refresh_duration_seconds`
/// Labels: `trigger` (timer, broadcast, action)
pub fn record_refresh_duration(trigger: &str, duration: Duration) {
    histogram!("hr_refresh_duration_seconds", "trigger" => trigger.to_string())
        .record(duration.as_secs_f64());
}

/// Record the polling loop exiting.
///
/// Metric: `hr_polling_stopped_total`
/// Labels: `reason` (meeting_gone, cancelled)
pub fn record_polling_stopped(reason: &str) {
    counter!("hr_polling_stopped_total", "reason" => reason.to_string()).increment(1);
}

// ============================================================================
// Actions and broadcasts
// ============================================================================

/// Record a user action.
///
/// Metric: `hr_actions_total`
/// Labels: `action` (toggle, acknowledge, clear), `status` (success, error, skipped)
pub fn record_action(action: &str, status: &str) {
    counter!(
        "hr_actions_total",
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an outbound data channel send.
///
/// Metric: `hr_broadcasts_sent_total`
/// Labels: `message_type`, `status` (success, error)
///
/// Errors here are swallowed by the coordinator; this counter is the only
/// place they stay visible.
pub fn record_broadcast_sent(message_type: &str, status: &str) {
    counter!(
        "hr_broadcasts_sent_total",
        "message_type" => message_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an inbound data channel message.
///
/// Metric: `hr_inbound_messages_total`
/// Labels: `message_type` (one of the four kinds, or `ignored`)
pub fn record_inbound_message(message_type: &str) {
    counter!("hr_inbound_messages_total", "message_type" => message_type.to_string())
        .increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_record_poll() {
        record_poll("success", None);
        record_poll("error", Some("http"));
        record_poll("error", Some("not_found"));
    }

    #[test]
    fn test_record_refresh_duration() {
        record_refresh_duration("timer", Duration::from_millis(40));
        record_refresh_duration("broadcast", Duration::from_millis(15));
        record_refresh_duration("action", Duration::from_secs(1));
    }

    #[test]
    fn test_metrics_are_recorded_with_expected_names() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_poll("success", None);
            record_poll("success", None);
            record_action("toggle", "success");
            record_broadcast_sent("hand_raise_update", "error");
            record_inbound_message("clear_all_hands");
            record_polling_stopped("meeting_gone");
            record_refresh_duration("timer", Duration::from_millis(20));
        });

        let metrics = snapshotter.snapshot().into_vec();
        let names: Vec<String> = metrics
            .iter()
            .map(|(key, _, _, _)| key.key().name().to_string())
            .collect();

        for expected in [
            "hr_polls_total",
            "hr_actions_total",
            "hr_broadcasts_sent_total",
            "hr_inbound_messages_total",
            "hr_polling_stopped_total",
            "hr_refresh_duration_seconds",
        ] {
            assert!(
                names.iter().any(|n| n == expected),
                "missing metric {expected}, got {names:?}"
            );
        }

        let polls = metrics
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "hr_polls_total")
            .map(|(_, _, _, value)| value.clone())
            .unwrap();
        assert!(matches!(polls, DebugValue::Counter(2)), "got {polls:?}");
    }
}
