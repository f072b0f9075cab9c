//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across the workspace. The API bearer
//! token handed to the hand-raise service client is the main consumer: any
//! struct that derives `Debug` and holds a `SecretString` prints
//! `[REDACTED]` instead of the value, so tokens never reach `tracing` output.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ApiCredentials {
//!     base_url: String,
//!     token: SecretString,
//! }
//!
//! let creds = ApiCredentials {
//!     base_url: "https://api.imeetpro.example".to_string(),
//!     token: SecretString::from("bearer-value"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("bearer-value"));
//! assert_eq!(creds.token.expose_secret(), "bearer-value");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("session-token-abc");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("session-token-abc"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("token123");
        assert_eq!(secret.expose_secret(), "token123");
    }

    #[test]
    fn test_deserialize_keeps_value_hidden() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct ApiAuth {
            base_url: String,
            token: SecretString,
        }

        let json = r#"{"base_url": "http://localhost:8000", "token": "my-api-token"}"#;
        let auth: ApiAuth = serde_json::from_str(json).expect("deserialize");

        assert_eq!(auth.token.expose_secret(), "my-api-token");

        let debug = format!("{auth:?}");
        assert!(debug.contains("localhost:8000"));
        assert!(!debug.contains("my-api-token"));
    }
}
