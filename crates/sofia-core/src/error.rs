//! Core error types for the SOFIA client

use std::path::PathBuf;
use std::time::Duration;

use sofia_protocol::{ProtocolError, ReturnCode};
use thiserror::Error;

/// Top-level error type for the SOFIA client
#[derive(Error, Debug)]
pub enum SofiaError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport-level errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Every dial attempt failed
    #[error("Failed to connect to {address} after {attempts} attempt(s): {source}")]
    ConnectFailed {
        address: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// `connect` called on a live connection
    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    /// No transport attached yet
    #[error("Not connected")]
    NotConnected,

    /// Writing a frame to the transport failed
    #[error("Write failed: {0}")]
    Write(#[source] ProtocolError),

    /// The read loop has ended
    #[error("Connection closed")]
    Closed,
}

/// Errors local to one session's request/response cycle
#[derive(Error, Debug)]
pub enum SessionError {
    /// No free correlation identifier
    #[error("Session limit reached: all {0} correlation ids are in use")]
    CapacityExhausted(usize),

    /// Device answered the login with a non-success code
    #[error("Login rejected: {0}")]
    LoginRejected(ReturnCode),

    /// Device answered a command with a failure code
    #[error("Command {name} failed: {ret}")]
    CommandFailed { name: String, ret: ReturnCode },

    /// Reply body could not be parsed
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[source] ProtocolError),

    /// Operation requires a logged-in session
    #[error("Session is not active")]
    NotActive,

    /// Login attempted on a session that already has a device identity
    #[error("Session is already logged in")]
    AlreadyLoggedIn,

    /// Mailbox closed while waiting for a reply
    #[error("Session closed")]
    Closed,

    /// No reply within the configured receive timeout
    #[error("No response within {0:?}")]
    Timeout(Duration),

    /// Underlying connection failed
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
