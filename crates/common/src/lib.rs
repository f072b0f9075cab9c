//! Common utilities and types shared across iMeetPro client crates.

#![warn(clippy::pedantic)]

/// Module for shared identifier types
pub mod types;

/// Module for shared observability configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;
