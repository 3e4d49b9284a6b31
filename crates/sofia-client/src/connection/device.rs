//! Device handle

use std::io;
use std::sync::Arc;

use futures::SinkExt;
use parking_lot::Mutex;
use sofia_core::config::DeviceConfig;
use sofia_core::{ConnectionError, SessionError};
use sofia_protocol::{Frame, FrameCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::ExponentialBackoff;
use super::demux::run_demux;
use super::registry::Registry;
use crate::allocator::ID_CAPACITY;
use crate::session::state::SessionCell;
use crate::session::Session;

type FrameWriter = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, FrameCodec>;

/// A live transport and its read loop
struct Link {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct DeviceInner {
    config: DeviceConfig,
    registry: Arc<Mutex<Registry>>,
    /// Serializes frame writes so frames never interleave on the wire
    writer: tokio::sync::Mutex<Option<FrameWriter>>,
    link: Mutex<Option<Link>>,
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.cancel.cancel();
        }
    }
}

/// Connection to one device, shared by all of its sessions
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl Device {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                config,
                registry: Arc::new(Mutex::new(Registry::new())),
                writer: tokio::sync::Mutex::new(None),
                link: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    /// `host:port` of the device
    pub fn address(&self) -> String {
        self.inner.config.address()
    }

    /// Whether a transport is attached and its read loop is running
    pub fn is_connected(&self) -> bool {
        self.inner
            .link
            .lock()
            .as_ref()
            .is_some_and(|link| !link.cancel.is_cancelled())
    }

    /// Dial the device over TCP and start the read loop
    ///
    /// Makes up to `connect_attempts` attempts, each bounded by
    /// `connect_timeout`, sleeping on the configured backoff in between.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let config = &self.inner.config;
        let address = config.address();
        if self.is_connected() {
            return Err(ConnectionError::AlreadyConnected(address));
        }

        let attempts = config.connect_attempts.max(1);
        let mut backoff = ExponentialBackoff::from_config(&config.backoff);
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!("Dialing {} (attempt {}/{})", address, attempt, attempts);

            let outcome =
                tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address)).await;
            match outcome {
                Ok(Ok(stream)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not set TCP_NODELAY: {}", e);
                    }
                    info!("Connected to {}", address);
                    return self.attach(stream).await;
                }
                Ok(Err(e)) => last_error = Some(e),
                Err(_) => {
                    last_error = Some(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no answer within {:?}", config.connect_timeout),
                    ));
                }
            }

            if attempt < attempts {
                let delay = backoff.next_delay();
                if let Some(e) = &last_error {
                    warn!(
                        "Connection to {} failed: {}. Retrying in {:?}",
                        address, e, delay
                    );
                }
                tokio::time::sleep(delay).await;
            }
        }

        Err(ConnectionError::ConnectFailed {
            address,
            attempts,
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no attempt was made")),
        })
    }

    /// Start the read loop over an already-open byte stream
    ///
    /// `connect` uses this for TCP; tests and tunnels can hand in any
    /// duplex stream.
    pub async fn attach<S>(&self, stream: S) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut writer = self.inner.writer.lock().await;
        if self.is_connected() {
            return Err(ConnectionError::AlreadyConnected(self.address()));
        }

        let max_body_size = self.inner.config.max_body_size;
        let (read_half, write_half) = tokio::io::split(stream);
        let sink: Box<dyn AsyncWrite + Send + Unpin> = Box::new(write_half);
        *writer = Some(FramedWrite::new(
            sink,
            FrameCodec::with_max_body_size(max_body_size),
        ));

        let cancel = CancellationToken::new();
        let frames = FramedRead::new(read_half, FrameCodec::with_max_body_size(max_body_size));
        let task = tokio::spawn(run_demux(
            frames,
            Arc::clone(&self.inner.registry),
            cancel.clone(),
            self.address(),
        ));

        if let Some(stale) = self.inner.link.lock().replace(Link { cancel, task }) {
            stale.cancel.cancel();
        }
        Ok(())
    }

    /// Write one frame to the device
    ///
    /// Concurrent callers are serialized; each frame goes out whole.
    pub async fn send(&self, frame: Frame) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(if self.inner.link.lock().is_some() {
                ConnectionError::Closed
            } else {
                ConnectionError::NotConnected
            });
        }

        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or(ConnectionError::NotConnected)?;

        let bytes = frame.wire_size();
        let message_id = frame.message_id;
        let session_id = frame.session_id;
        writer.send(frame).await.map_err(ConnectionError::Write)?;

        debug!(bytes, %message_id, %session_id, "Frame written");
        Ok(())
    }

    /// Register a new pending session
    ///
    /// Empty credentials fall back to the configured ones. Fails when all
    /// correlation ids are held by sessions that have not logged in yet.
    pub fn new_session(&self, username: &str, password: &str) -> Result<Session, SessionError> {
        let config = &self.inner.config;
        let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));

        let cell = self
            .inner
            .registry
            .lock()
            .reserve(tx)
            .ok_or(SessionError::CapacityExhausted(ID_CAPACITY))?;

        let username = if username.is_empty() {
            config.username.clone()
        } else {
            username.to_string()
        };
        let password = if password.is_empty() {
            config.password.clone()
        } else {
            password.to_string()
        };

        debug!("New session with {}", cell.correlation_id());
        Ok(Session::new(self.clone(), cell, username, password, rx))
    }

    /// Stop the read loop and close the transport
    ///
    /// Every session is dropped from routing; their pending receives fail.
    pub async fn disconnect(&self) {
        let link = self.inner.link.lock().take();
        if let Some(link) = link {
            link.cancel.cancel();
            if let Err(e) = link.task.await {
                warn!("Read loop for {} ended abnormally: {}", self.address(), e);
            }
        }

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!("Error closing transport: {}", e);
            }
        }
        info!("Disconnected from {}", self.address());
    }

    /// Sessions waiting for a login response
    pub fn pending_sessions(&self) -> usize {
        self.inner.registry.lock().pending_len()
    }

    /// Logged-in sessions
    pub fn active_sessions(&self) -> usize {
        self.inner.registry.lock().active_len()
    }

    pub(crate) fn unregister(&self, cell: &Arc<SessionCell>) {
        self.inner.registry.lock().remove(cell);
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("address", &self.address())
            .field("connected", &self.is_connected())
            .finish()
    }
}
