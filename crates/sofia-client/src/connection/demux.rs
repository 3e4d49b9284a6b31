//! Read loop
//!
//! A single task per connection decodes inbound frames and hands each one
//! to the session that owns it. It never blocks on a session: a full
//! mailbox loses the frame instead of stalling every other session.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use sofia_protocol::FrameCodec;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::registry::{Registry, Routed};

/// Run until the transport ends, fails or `cancel` fires
///
/// On exit `cancel` is fired so the device reports itself disconnected,
/// then every registered session is dropped from routing, which closes
/// their mailboxes and unblocks anyone waiting for a reply.
pub(crate) async fn run_demux<R>(
    mut frames: FramedRead<R, FrameCodec>,
    registry: Arc<Mutex<Registry>>,
    cancel: CancellationToken,
    address: String,
) where
    R: AsyncRead + Unpin,
{
    debug!("Read loop started for {}", address);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Read loop for {} cancelled", address);
                break;
            }
            next = frames.next() => match next {
                Some(Ok(frame)) => {
                    trace!(
                        bytes = frame.wire_size(),
                        message_id = %frame.message_id,
                        session_id = %frame.session_id,
                        "Frame received"
                    );
                    let message_id = frame.message_id;
                    let routed = registry.lock().route(frame);
                    match routed {
                        Routed::Delivered => {}
                        Routed::UnknownCorrelation(id) => {
                            warn!("Dropping {}: no pending session with {}", message_id, id);
                        }
                        Routed::UnknownSession(id) => {
                            warn!("Dropping {}: no active session with {}", message_id, id);
                        }
                        Routed::MailboxFull => {
                            warn!("Dropping {}: session mailbox is full", message_id);
                        }
                        Routed::MailboxClosed => {
                            debug!("Dropping {}: session no longer listening", message_id);
                        }
                    }
                }
                Some(Err(e)) => {
                    error!("Read from {} failed: {}", address, e);
                    break;
                }
                None => {
                    info!("{} closed the connection", address);
                    break;
                }
            }
        }
    }

    cancel.cancel();
    let dropped = registry.lock().clear();
    if dropped > 0 {
        debug!("Closed {} session(s) after read loop ended", dropped);
    }
}
