//! Hand-raise configuration.
//!
//! Configuration is loaded from environment variables. The API token is
//! redacted in Debug output.

use crate::models::{CurrentUser, ParticipantRole};
use common::secret::SecretString;
use common::types::{MeetingId, UserId};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default roster polling interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default grace period between session bind and initialization, in milliseconds.
///
/// Gives the media session time to finish its own connection handshake.
pub const DEFAULT_INIT_DELAY_MS: u64 = 1000;

/// Default upper bound on initialization before polling starts anyway, in milliseconds.
pub const DEFAULT_INIT_TIMEOUT_MS: u64 = 5000;

/// Default HTTP request timeout in milliseconds.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Timing knobs for one coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorTiming {
    /// Interval between roster polls.
    pub poll_interval: Duration,
    /// Delay after bind before initialization starts.
    pub init_delay: Duration,
    /// Fallback: start polling if initialization takes longer than this.
    pub init_timeout: Duration,
}

impl Default for CoordinatorTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            init_delay: Duration::from_millis(DEFAULT_INIT_DELAY_MS),
            init_timeout: Duration::from_millis(DEFAULT_INIT_TIMEOUT_MS),
        }
    }
}

/// Meeting and participant identity, used by the `hand-raise-watch` binary.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Meeting to join.
    pub meeting_id: MeetingId,
    /// Participant this client acts as.
    pub user: CurrentUser,
}

/// Hand-raise client configuration.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the hand-raise REST service.
    pub api_url: String,

    /// Optional bearer token for the REST service.
    /// Protected by `SecretString` to prevent accidental logging.
    pub api_token: Option<SecretString>,

    /// HTTP request timeout.
    pub http_timeout: Duration,

    /// Coordinator timing.
    pub timing: CoordinatorTiming,

    /// Emit JSON log lines.
    pub json_logs: bool,

    /// Session identity, present when `HAND_RAISE_MEETING_ID` is set.
    pub session: Option<SessionConfig>,
}

/// Custom Debug implementation that redacts the API token.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("http_timeout", &self.http_timeout)
            .field("timing", &self.timing)
            .field("json_logs", &self.json_logs)
            .field("session", &self.session)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

fn parse_millis(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match vars.get(key) {
        None => Ok(Duration::from_millis(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(format!("{key}={raw}: {e}"))),
    }
}

fn parse_bool(vars: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match vars.get(key).map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" || v.is_empty() => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue(format!("{key}={v}"))),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_url = vars
            .get("HAND_RAISE_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("HAND_RAISE_API_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(format!(
                "HAND_RAISE_API_URL must be an http(s) URL, got {api_url}"
            )));
        }

        let api_token = vars
            .get("HAND_RAISE_API_TOKEN")
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.clone()));

        let poll_interval = parse_millis(vars, "HAND_RAISE_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "HAND_RAISE_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        let timing = CoordinatorTiming {
            poll_interval,
            init_delay: parse_millis(vars, "HAND_RAISE_INIT_DELAY_MS", DEFAULT_INIT_DELAY_MS)?,
            init_timeout: parse_millis(
                vars,
                "HAND_RAISE_INIT_TIMEOUT_MS",
                DEFAULT_INIT_TIMEOUT_MS,
            )?,
        };

        let http_timeout =
            parse_millis(vars, "HAND_RAISE_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?;

        let json_logs = parse_bool(vars, "HAND_RAISE_LOG_JSON")?;

        let session = match vars.get("HAND_RAISE_MEETING_ID") {
            None => None,
            Some(meeting_id) => Some(Self::session_from_vars(vars, meeting_id)?),
        };

        Ok(Config {
            api_url,
            api_token,
            http_timeout,
            timing,
            json_logs,
            session,
        })
    }

    fn session_from_vars(
        vars: &HashMap<String, String>,
        meeting_id: &str,
    ) -> Result<SessionConfig, ConfigError> {
        let user_id = vars
            .get("HAND_RAISE_USER_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("HAND_RAISE_USER_ID".to_string()))?;

        let display_name = vars
            .get("HAND_RAISE_DISPLAY_NAME")
            .cloned()
            .unwrap_or_else(|| user_id.clone());

        // The media SDK identity defaults to the user id
        let connection_identity = vars
            .get("HAND_RAISE_CONNECTION_IDENTITY")
            .cloned()
            .unwrap_or_else(|| user_id.clone());

        let role = match vars.get("HAND_RAISE_ROLE") {
            None => ParticipantRole::Participant,
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("HAND_RAISE_ROLE: {e}")))?,
        };

        Ok(SessionConfig {
            meeting_id: MeetingId::new(meeting_id),
            user: CurrentUser {
                user_id: UserId::new(user_id.clone()),
                display_name,
                connection_identity,
                role,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "HAND_RAISE_API_URL".to_string(),
            "http://localhost:8000/".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.api_url, "http://localhost:8000");
        assert!(config.api_token.is_none());
        assert_eq!(
            config.http_timeout,
            Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS)
        );
        assert_eq!(config.timing, CoordinatorTiming::default());
        assert_eq!(config.timing.poll_interval, Duration::from_secs(2));
        assert!(!config.json_logs);
        assert!(config.session.is_none());
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("HAND_RAISE_API_TOKEN".to_string(), "tok-123".to_string());
        vars.insert("HAND_RAISE_POLL_INTERVAL_MS".to_string(), "500".to_string());
        vars.insert("HAND_RAISE_INIT_DELAY_MS".to_string(), "0".to_string());
        vars.insert("HAND_RAISE_INIT_TIMEOUT_MS".to_string(), "750".to_string());
        vars.insert("HAND_RAISE_HTTP_TIMEOUT_MS".to_string(), "3000".to_string());
        vars.insert("HAND_RAISE_LOG_JSON".to_string(), "true".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(
            config.api_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("tok-123".to_string())
        );
        assert_eq!(config.timing.poll_interval, Duration::from_millis(500));
        assert_eq!(config.timing.init_delay, Duration::ZERO);
        assert_eq!(config.timing.init_timeout, Duration::from_millis(750));
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert!(config.json_logs);
    }

    #[test]
    fn test_from_vars_missing_api_url() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "HAND_RAISE_API_URL"));
    }

    #[test]
    fn test_from_vars_rejects_non_http_url() {
        let mut vars = base_vars();
        vars.insert("HAND_RAISE_API_URL".to_string(), "ftp://host".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_vars_rejects_zero_poll_interval() {
        let mut vars = base_vars();
        vars.insert("HAND_RAISE_POLL_INTERVAL_MS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_vars_rejects_garbage_numbers() {
        let mut vars = base_vars();
        vars.insert(
            "HAND_RAISE_HTTP_TIMEOUT_MS".to_string(),
            "ten seconds".to_string(),
        );
        let err = Config::from_vars(&vars).unwrap_err();
        assert!(err.to_string().contains("HAND_RAISE_HTTP_TIMEOUT_MS"));
    }

    #[test]
    fn test_session_vars() {
        let mut vars = base_vars();
        vars.insert("HAND_RAISE_MEETING_ID".to_string(), "mtg-42".to_string());
        vars.insert("HAND_RAISE_USER_ID".to_string(), "17".to_string());
        vars.insert("HAND_RAISE_DISPLAY_NAME".to_string(), "Ada".to_string());
        vars.insert("HAND_RAISE_ROLE".to_string(), "host".to_string());

        let session = Config::from_vars(&vars).unwrap().session.unwrap();
        assert_eq!(session.meeting_id.as_str(), "mtg-42");
        assert_eq!(session.user.user_id.as_str(), "17");
        assert_eq!(session.user.display_name, "Ada");
        assert_eq!(session.user.connection_identity, "17");
        assert_eq!(session.user.role, ParticipantRole::Host);
    }

    #[test]
    fn test_session_requires_user_id() {
        let mut vars = base_vars();
        vars.insert("HAND_RAISE_MEETING_ID".to_string(), "mtg-42".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::MissingEnvVar(v)) if v == "HAND_RAISE_USER_ID"
        ));
    }

    #[test]
    fn test_debug_redacts_api_token() {
        let mut vars = base_vars();
        vars.insert(
            "HAND_RAISE_API_TOKEN".to_string(),
            "super-secret-token".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-token"));
    }
}
