//! sofia-core: Error types and configuration for the SOFIA device client
//!
//! This crate holds what the client library and the CLI share: the error
//! taxonomy and the TOML configuration structures.

pub mod config;
pub mod error;

pub use error::{ConfigError, ConnectionError, SessionError, SofiaError};
