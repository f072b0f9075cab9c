//! hand-raise-watch
//!
//! Runs one hand-raise coordinator against a live service and logs roster
//! changes until Ctrl+C / SIGTERM, or until the meeting ends.

use common::config::ObservabilityConfig;
use hand_raise::config::Config;
use hand_raise::observability::{init_metrics_recorder, DEFAULT_LOG_FILTER};
use hand_raise::{
    CoordinatorPhase, DisconnectedChannel, HandRaiseCoordinator, HandRaiseError,
    HandRaiseSnapshot, HttpHandRaiseService,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration before tracing so the log format can follow it
    let config = Config::from_env()?;

    ObservabilityConfig::new(DEFAULT_LOG_FILTER)
        .with_json_logs(config.json_logs)
        .init_tracing()?;

    info!(
        poll_interval_ms = u64::try_from(config.timing.poll_interval.as_millis()).unwrap_or(u64::MAX),
        "Starting hand-raise watcher"
    );

    let _metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let session = config.session.clone().ok_or_else(|| {
        error!("HAND_RAISE_MEETING_ID is required to watch a meeting");
        HandRaiseError::Config("no meeting session configured".to_string())
    })?;

    let service = HttpHandRaiseService::new(
        config.api_url.clone(),
        config.api_token.clone(),
        config.http_timeout,
    )?;
    info!(api_url = %service.base_url(), "Hand-raise service client ready");

    let coordinator = HandRaiseCoordinator::new(
        Arc::new(service),
        Arc::new(DisconnectedChannel),
        config.timing,
    );

    info!(
        meeting_id = %session.meeting_id,
        user_id = %session.user.user_id,
        role = ?session.user.role,
        "Binding coordinator"
    );
    coordinator.bind(session.meeting_id.clone(), session.user)?;

    let mut updates = coordinator.subscribe();
    let mut last_logged = HandRaiseSnapshot::default();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                log_changes(&last_logged, &snapshot);
                if snapshot.phase == CoordinatorPhase::Stopped {
                    warn!(meeting_id = %session.meeting_id, "Meeting ended, exiting");
                    break;
                }
                last_logged = snapshot;
            }
        }
    }

    match coordinator.stats().await {
        Ok(stats) => info!(
            total_raised = stats.total_raised,
            waiting = stats.waiting,
            acknowledged = stats.acknowledged,
            total_lowered = stats.total_lowered,
            "Final hand-raise stats"
        ),
        Err(e) => warn!(error = %e, "Failed to fetch final stats"),
    }

    coordinator.cleanup().await;
    info!("Hand-raise watcher shutdown complete");

    Ok(())
}

fn log_changes(previous: &HandRaiseSnapshot, current: &HandRaiseSnapshot) {
    if previous.phase != current.phase {
        info!(phase = ?current.phase, "Coordinator phase changed");
    }
    if previous.is_hand_raised != current.is_hand_raised {
        info!(raised = current.is_hand_raised, "Own hand state changed");
    }
    if previous.roster != current.roster {
        let queue: Vec<&str> = current
            .roster
            .iter()
            .map(|hand| hand.display_name.as_str())
            .collect();
        info!(count = current.roster.len(), queue = ?queue, "Raised hands updated");
    }
    if previous.last_error != current.last_error {
        if let Some(message) = &current.last_error {
            warn!(error = %message, "Hand-raise error");
        }
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, shutting down..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, shutting down...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
