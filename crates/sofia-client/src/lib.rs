//! sofia-client: Session-multiplexing client for SOFIA network video devices
//!
//! One [`Device`] owns a TCP connection and a read loop that routes every
//! inbound frame to the [`Session`] it belongs to. Sessions log in, issue
//! commands and keep themselves alive. [`Discovery`] listens for the UDP
//! announcements devices broadcast on the local network.

pub mod allocator;
pub mod connection;
pub mod discovery;
pub mod session;

pub use allocator::{IdAllocator, ID_CAPACITY};
pub use connection::{Device, ExponentialBackoff};
pub use discovery::{DiscoveredDevice, Discovery};
pub use session::{Session, SessionState};

use sofia_core::config::DeviceConfig;
use sofia_core::SofiaError;

/// Connect to the configured device and log in with the configured credentials
///
/// On a failed login the connection is torn down before returning.
pub async fn connect_and_login(config: DeviceConfig) -> Result<(Device, Session), SofiaError> {
    let device = Device::new(config);
    device.connect().await?;

    let session = device.new_session("", "")?;
    if let Err(e) = session.login().await {
        drop(session);
        device.disconnect().await;
        return Err(e.into());
    }
    Ok((device, session))
}
