//! Session and correlation identifier types
//!
//! Both identifiers are a single byte on the wire but they live in
//! different namespaces: a [`CorrelationId`] is chosen by the client and only
//! matters until the login response arrives, a [`SessionId`] is assigned by
//! the device and tags all traffic afterwards.

use std::fmt;

/// Device-assigned session identifier (header byte 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct SessionId(pub u8);

impl SessionId {
    /// Session ID carried before the device has assigned one
    pub const UNASSIGNED: SessionId = SessionId(0);

    /// Create a new session ID
    pub fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

impl From<u8> for SessionId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// Client-chosen login correlation identifier (header byte 9)
///
/// Zero is reserved and never handed out; it marks "no identifier".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct CorrelationId(pub u8);

impl CorrelationId {
    /// Reserved sentinel value
    pub const NONE: CorrelationId = CorrelationId(0);

    /// Create a new correlation ID
    pub fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Whether this is the reserved sentinel
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corr-{}", self.0)
    }
}
