//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame does not start with the header flag
    #[error("Invalid frame header: expected flag 0xFF, got {0:#04x}")]
    InvalidHeader(u8),

    /// Declared body exceeds the configured maximum
    #[error("Frame body too large: {size} bytes exceeds maximum of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },

    /// Datagram or buffer ended before the declared body
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// Payload is not the JSON we expected
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
