//! Shared per-session state
//!
//! The cell is read by the session handle and written by the read loop,
//! so every field is atomic. The correlation id never changes.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use sofia_protocol::{CorrelationId, SessionId};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered by correlation id, waiting for the login response
    Pending,
    /// Promoted; routed by the device-assigned session id
    Active,
    /// Removed from routing
    Closed,
}

impl SessionState {
    fn as_u8(self) -> u8 {
        match self {
            SessionState::Pending => 0,
            SessionState::Active => 1,
            SessionState::Closed => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Pending,
            1 => SessionState::Active,
            _ => SessionState::Closed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Pending => "pending",
            SessionState::Active => "active",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub(crate) struct SessionCell {
    correlation_id: CorrelationId,
    session_id: AtomicU8,
    sequence: AtomicU8,
    state: AtomicU8,
}

impl SessionCell {
    pub(crate) fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            session_id: AtomicU8::new(SessionId::UNASSIGNED.as_u8()),
            sequence: AtomicU8::new(0),
            state: AtomicU8::new(SessionState::Pending.as_u8()),
        }
    }

    pub(crate) fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub(crate) fn session_id(&self) -> SessionId {
        SessionId::new(self.session_id.load(Ordering::Acquire))
    }

    pub(crate) fn sequence(&self) -> u8 {
        self.sequence.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Record the device-assigned id and mark the session active
    pub(crate) fn activate(&self, session_id: SessionId) {
        self.session_id.store(session_id.as_u8(), Ordering::Release);
        self.state
            .store(SessionState::Active.as_u8(), Ordering::Release);
    }

    /// Advance the sequence counter, wrapping at 256
    pub(crate) fn advance_sequence(&self) {
        self.sequence.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark closed; returns false if it already was
    pub(crate) fn close(&self) -> bool {
        self.state.swap(SessionState::Closed.as_u8(), Ordering::AcqRel)
            != SessionState::Closed.as_u8()
    }
}
