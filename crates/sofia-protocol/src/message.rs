//! Operation codes for the SOFIA protocol
//!
//! Message IDs are a 16-bit field at header offset 14. Devices use a
//! request/response pairing where the response code is the request code
//! plus one. Unknown codes are carried through untouched; the core never
//! rejects a frame because of its opcode.
//!
//! # Message Flow
//!
//! 1. Client sends `LOGIN_REQ2` carrying a correlation byte
//! 2. Device answers `LOGIN_RSP`, echoing the correlation byte and
//!    assigning the session ID in the header
//! 3. Client sends `KEEPALIVE_REQ` every `AliveInterval` seconds
//! 4. Commands (`SYSINFO_REQ`, `CONFIG_GET`, ...) are strict request/response

use std::fmt;

/// 16-bit operation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MessageId(pub u16);

impl MessageId {
    /// Legacy login request
    pub const LOGIN_REQ1: MessageId = MessageId(999);
    /// Login request
    pub const LOGIN_REQ2: MessageId = MessageId(1000);
    /// Login response
    pub const LOGIN_RSP: MessageId = MessageId(1001);
    /// Logout request (shares its code with the login response)
    pub const LOGOUT_REQ: MessageId = MessageId(1001);
    /// Logout response
    pub const LOGOUT_RSP: MessageId = MessageId(1002);
    /// Keepalive request (1005 on some firmware)
    pub const KEEPALIVE_REQ: MessageId = MessageId(1006);
    /// Keepalive response (1006 on some firmware)
    pub const KEEPALIVE_RSP: MessageId = MessageId(1007);
    /// System information request, also used for OEM info
    pub const SYSINFO_REQ: MessageId = MessageId(1020);
    /// System information response
    pub const SYSINFO_RSP: MessageId = MessageId(1021);
    /// Configuration read request
    pub const CONFIG_GET: MessageId = MessageId(1042);
    /// Configuration read response
    pub const CONFIG_GET_RSP: MessageId = MessageId(1043);
    /// Ability (SystemFunction) request
    pub const ABILITY_GET: MessageId = MessageId(1360);
    /// Ability response
    pub const ABILITY_GET_RSP: MessageId = MessageId(1361);
    /// Full authority list request
    pub const AUTHORITY_LIST_REQ: MessageId = MessageId(1470);
    /// Full authority list response
    pub const AUTHORITY_LIST_RSP: MessageId = MessageId(1471);

    /// Create a message ID from its raw code
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    /// Raw code
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Whether this is one of the login request codes
    pub fn is_login_request(&self) -> bool {
        *self == Self::LOGIN_REQ1 || *self == Self::LOGIN_REQ2
    }

    /// Whether this is the login response code
    pub fn is_login_response(&self) -> bool {
        *self == Self::LOGIN_RSP
    }

    /// Whether header byte 9 holds a correlation id for this code
    ///
    /// Only login requests and the login response use it; elsewhere the
    /// byte is overloaded and ignored.
    pub fn carries_correlation(&self) -> bool {
        self.is_login_request() || self.is_login_response()
    }

    /// Code the device is expected to answer with
    pub fn response(&self) -> MessageId {
        MessageId(self.0.wrapping_add(1))
    }

    /// Symbolic name for logging
    pub fn name(&self) -> &'static str {
        match self.0 {
            999 => "LOGIN_REQ1",
            1000 => "LOGIN_REQ2",
            1001 => "LOGIN_RSP",
            1002 => "LOGOUT_RSP",
            1006 => "KEEPALIVE_REQ",
            1007 => "KEEPALIVE_RSP",
            1020 => "SYSINFO_REQ",
            1021 => "SYSINFO_RSP",
            1042 => "CONFIG_GET",
            1043 => "CONFIG_GET_RSP",
            1360 => "ABILITY_GET",
            1361 => "ABILITY_GET_RSP",
            1470 => "AUTHORITY_LIST_REQ",
            1471 => "AUTHORITY_LIST_RSP",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

impl From<u16> for MessageId {
    fn from(code: u16) -> Self {
        Self(code)
    }
}
