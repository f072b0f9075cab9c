//! Common observability configuration for iMeetPro components.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is not set (e.g. `hand_raise=debug`)
    pub default_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

/// Failure to install the global tracing subscriber.
#[derive(Debug, Error)]
#[error("Failed to initialize tracing: {0}")]
pub struct TracingInitError(String);

impl ObservabilityConfig {
    /// Create a config with the given default filter and plain-text output.
    #[must_use]
    pub fn new(default_filter: impl Into<String>) -> Self {
        Self {
            default_filter: default_filter.into(),
            json_logs: false,
        }
    }

    /// Switch to JSON log lines.
    #[must_use]
    pub fn with_json_logs(mut self, json_logs: bool) -> Self {
        self.json_logs = json_logs;
        self
    }

    /// Build the `EnvFilter`, preferring `RUST_LOG` over the default directive.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| self.default_filter.as_str().into())
    }

    /// Install the global subscriber.
    ///
    /// # Errors
    ///
    /// Returns `TracingInitError` if a global subscriber is already set.
    pub fn init_tracing(&self) -> Result<(), TracingInitError> {
        let registry = tracing_subscriber::registry().with(self.env_filter());

        if self.json_logs {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
        } else {
            registry.with(tracing_subscriber::fmt::layer()).try_init()
        }
        .map_err(|e| TracingInitError(e.to_string()))
    }
}
