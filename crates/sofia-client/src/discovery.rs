//! Broadcast discovery listener
//!
//! Devices announce themselves with a framed JSON datagram on UDP port
//! 34569. The listener decodes each datagram, keeps the latest
//! announcement per sender and forwards it to a bounded event channel.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use sofia_core::config::DiscoveryConfig;
use sofia_protocol::{decode_datagram, DiscoveryAnnouncement, MessageId, ProtocolError};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A device heard on the discovery port
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Where the datagram came from
    pub source: SocketAddr,
    pub message_id: MessageId,
    pub announcement: DiscoveryAnnouncement,
    pub last_seen: SystemTime,
}

impl DiscoveredDevice {
    /// Decode one datagram received from `source`
    pub fn from_datagram(source: SocketAddr, datagram: &[u8]) -> Result<Self, ProtocolError> {
        let frame = decode_datagram(datagram)?;
        let announcement = frame.json::<DiscoveryAnnouncement>()?;
        Ok(Self {
            source,
            message_id: frame.message_id,
            announcement,
            last_seen: SystemTime::now(),
        })
    }

    /// Announced host name, if any
    pub fn host_name(&self) -> Option<&str> {
        self.announcement
            .net_common
            .as_ref()
            .map(|net| net.host_name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Announced TCP port, falling back to the standard one
    pub fn tcp_port(&self) -> u16 {
        self.announcement
            .net_common
            .as_ref()
            .map(|net| net.tcp_port)
            .filter(|port| *port != 0)
            .unwrap_or(sofia_core::config::DEFAULT_PORT)
    }
}

/// Listener for device announcements
pub struct Discovery {
    socket: Arc<UdpSocket>,
    config: DiscoveryConfig,
    devices: Arc<DashMap<SocketAddr, DiscoveredDevice>>,
}

impl Discovery {
    /// Bind the discovery socket
    pub async fn bind(config: DiscoveryConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind(&config.bind_address).await?;
        socket.set_broadcast(true)?;
        info!("Listening for announcements on {}", socket.local_addr()?);

        Ok(Self {
            socket: Arc::new(socket),
            config,
            devices: Arc::new(DashMap::new()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Every device heard so far, latest announcement each
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.devices.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Start receiving until `cancel` fires
    ///
    /// Announcements are forwarded on the returned channel; when the
    /// consumer falls behind, events are dropped but the device table is
    /// still updated.
    pub fn spawn(
        &self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<DiscoveredDevice>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.config.event_capacity.max(1));
        let socket = Arc::clone(&self.socket);
        let devices = Arc::clone(&self.devices);
        let buffer_size = self.config.buffer_size;

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; buffer_size];
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Discovery listener stopped");
                        break;
                    }
                    received = socket.recv_from(&mut buf) => {
                        let (len, source) = match received {
                            Ok(received) => received,
                            Err(e) => {
                                error!("Discovery receive failed: {}", e);
                                break;
                            }
                        };

                        let device = match DiscoveredDevice::from_datagram(source, &buf[..len]) {
                            Ok(device) => device,
                            Err(e) => {
                                warn!("Ignoring datagram from {}: {}", source, e);
                                continue;
                            }
                        };

                        if devices.insert(source, device.clone()).is_none() {
                            info!("Discovered device at {}", source);
                        }
                        if tx.try_send(device).is_err() {
                            debug!("Discovery event for {} dropped", source);
                        }
                    }
                }
            }
        });

        (rx, task)
    }
}
