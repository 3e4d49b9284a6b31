//! Device connection configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_secs, timeout_secs};
use crate::error::ConfigError;

/// Default TCP port of the SOFIA service
pub const DEFAULT_PORT: u16 = 34567;

/// Factory username
pub const DEFAULT_USERNAME: &str = "admin";

/// Factory password (the hashed form of an empty password)
pub const DEFAULT_PASSWORD: &str = "tlJwpbo6";

/// Configuration for one device connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Hostname or IP address of the device
    pub host: String,

    /// TCP port
    pub port: u16,

    /// Username used when a session is created without one
    pub username: String,

    /// Password used when a session is created without one
    pub password: String,

    /// Timeout for each dial attempt
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Number of dial attempts before giving up
    pub connect_attempts: u32,

    /// Frames buffered per session before the read loop starts dropping
    pub mailbox_capacity: usize,

    /// How long a session waits for a reply; `0` in the file waits forever
    #[serde(with = "timeout_secs")]
    pub response_timeout: Option<Duration>,

    /// Largest frame body accepted from the device
    pub max_body_size: usize,

    /// Delay between dial attempts
    pub backoff: BackoffConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.10".to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            connect_timeout: Duration::from_secs(5),
            connect_attempts: 5,
            mailbox_capacity: 32,
            response_timeout: Some(Duration::from_secs(15)),
            max_body_size: sofia_protocol::MAX_BODY_SIZE,
            backoff: BackoffConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Default configuration pointed at a host
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// `host:port` string used for dialing
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check values that would make the connection unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("device host is empty".to_string()));
        }
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid(
                "mailbox_capacity must be at least 1".to_string(),
            ));
        }
        if self.connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "connect_attempts must be at least 1".to_string(),
            ));
        }
        self.backoff.validate()
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_secs")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl BackoffConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "backoff multiplier must be >= 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(
                "backoff jitter must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}
