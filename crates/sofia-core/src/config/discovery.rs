//! Discovery listener configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// UDP port devices broadcast their announcements to
pub const DISCOVERY_PORT: u16 = 34569;

/// Configuration for the broadcast discovery listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Local address to bind
    pub bind_address: String,

    /// Receive buffer size; one datagram per read
    pub buffer_size: usize,

    /// Announcements buffered for the consumer
    pub event_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DISCOVERY_PORT),
            buffer_size: 1500,
            event_capacity: 64,
        }
    }
}

impl DiscoveryConfig {
    /// Check values that would make the listener unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size < sofia_protocol::HEADER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "buffer_size must hold at least a frame header ({} bytes)",
                sofia_protocol::HEADER_SIZE
            )));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
