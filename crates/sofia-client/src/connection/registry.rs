//! Routing tables shared by the read loop and session handles
//!
//! The allocator and both tables sit behind a single lock so that
//! promoting a session (remove from pending, release its correlation id,
//! insert into active) is one step that nothing can observe half-done.

use std::collections::HashMap;
use std::sync::Arc;

use sofia_protocol::{CorrelationId, Frame, SessionId};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::allocator::IdAllocator;
use crate::session::state::SessionCell;

/// A registered session: its state cell and the sending half of its mailbox
#[derive(Debug)]
pub(crate) struct SessionSlot {
    pub(crate) cell: Arc<SessionCell>,
    pub(crate) mailbox: mpsc::Sender<Frame>,
}

/// What happened to an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Routed {
    /// Queued in the owning session's mailbox
    Delivered,
    /// Login response whose correlation id has no pending session
    UnknownCorrelation(CorrelationId),
    /// Frame whose session id has no active session
    UnknownSession(SessionId),
    /// The owning session's mailbox is full; frame dropped
    MailboxFull,
    /// The owning session stopped listening; frame dropped
    MailboxClosed,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    allocator: IdAllocator,
    pending: HashMap<CorrelationId, SessionSlot>,
    active: HashMap<SessionId, SessionSlot>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new pending session, or None if no correlation id is free
    pub(crate) fn reserve(&mut self, mailbox: mpsc::Sender<Frame>) -> Option<Arc<SessionCell>> {
        let correlation_id = self.allocator.acquire();
        if correlation_id.is_none() {
            return None;
        }

        let cell = Arc::new(SessionCell::new(correlation_id));
        self.pending.insert(
            correlation_id,
            SessionSlot {
                cell: Arc::clone(&cell),
                mailbox,
            },
        );
        Some(cell)
    }

    /// Route one inbound frame to its session
    pub(crate) fn route(&mut self, frame: Frame) -> Routed {
        if frame.message_id.is_login_response() {
            self.route_login(frame)
        } else {
            let session_id = frame.session_id;
            let Some(slot) = self.active.get(&session_id) else {
                return Routed::UnknownSession(session_id);
            };
            let routed = deliver(&slot.mailbox, frame);
            if routed == Routed::Delivered {
                slot.cell.advance_sequence();
            }
            routed
        }
    }

    fn route_login(&mut self, frame: Frame) -> Routed {
        let correlation_id = frame.correlation_id;
        let session_id = frame.session_id;
        let Some(slot) = self.pending.remove(&correlation_id) else {
            return Routed::UnknownCorrelation(correlation_id);
        };

        self.allocator.release(correlation_id);
        slot.cell.activate(session_id);
        let routed = deliver(&slot.mailbox, frame);

        if let Some(previous) = self.active.insert(session_id, slot) {
            tracing::warn!(
                "Device reassigned {} while still active; the older session stops receiving",
                session_id
            );
            previous.cell.close();
        }
        routed
    }

    /// Drop a session from routing, releasing its correlation id if it never logged in
    pub(crate) fn remove(&mut self, cell: &Arc<SessionCell>) {
        let correlation_id = cell.correlation_id();
        if self
            .pending
            .get(&correlation_id)
            .is_some_and(|slot| Arc::ptr_eq(&slot.cell, cell))
        {
            self.pending.remove(&correlation_id);
            self.allocator.release(correlation_id);
        }

        let session_id = cell.session_id();
        if self
            .active
            .get(&session_id)
            .is_some_and(|slot| Arc::ptr_eq(&slot.cell, cell))
        {
            self.active.remove(&session_id);
        }
    }

    /// Drop every session, closing all mailboxes; returns how many were registered
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.pending.len() + self.active.len();
        for (correlation_id, slot) in self.pending.drain() {
            self.allocator.release(correlation_id);
            slot.cell.close();
        }
        for (_, slot) in self.active.drain() {
            slot.cell.close();
        }
        count
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn active_len(&self) -> usize {
        self.active.len()
    }

    #[cfg(test)]
    pub(crate) fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }
}

fn deliver(mailbox: &mpsc::Sender<Frame>, frame: Frame) -> Routed {
    match mailbox.try_send(frame) {
        Ok(()) => Routed::Delivered,
        Err(TrySendError::Full(_)) => Routed::MailboxFull,
        Err(TrySendError::Closed(_)) => Routed::MailboxClosed,
    }
}
