//! Device status codes
//!
//! Every JSON reply carries a `Ret` field. 100 means success; the rest of
//! the table is what firmware reports for the usual failure modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status code from the `Ret` field of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnCode(pub u32);

impl ReturnCode {
    /// Success
    pub const OK: ReturnCode = ReturnCode(100);
    /// Unknown error
    pub const UNKNOWN: ReturnCode = ReturnCode(101);
    /// Version not supported
    pub const VERSION_UNSUPPORTED: ReturnCode = ReturnCode(102);
    /// Illegal request
    pub const ILLEGAL_REQUEST: ReturnCode = ReturnCode(103);
    /// User already logged in
    pub const USER_LOGGED_IN: ReturnCode = ReturnCode(104);
    /// User not logged in
    pub const USER_NOT_LOGGED_IN: ReturnCode = ReturnCode(105);
    /// Wrong username or password
    pub const BAD_CREDENTIALS: ReturnCode = ReturnCode(106);
    /// No permission
    pub const NO_PERMISSION: ReturnCode = ReturnCode(107);
    /// Success, device must restart
    pub const OK_RESTART_REQUIRED: ReturnCode = ReturnCode(150);

    /// Raw code
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Whether the code is exactly 100
    pub fn is_success(&self) -> bool {
        *self == Self::OK
    }

    /// Whether a command reply should be treated as having succeeded
    pub fn is_ok(&self) -> bool {
        *self == Self::OK || *self == Self::OK_RESTART_REQUIRED
    }

    /// Human-readable description, if the code is known
    pub fn description(&self) -> Option<&'static str> {
        let text = match self.0 {
            100 => "OK",
            101 => "unknown error",
            102 => "version not supported",
            103 => "illegal request",
            104 => "user has already logged in",
            105 => "user is not logged in",
            106 => "username or password is wrong",
            107 => "no permission",
            108 => "timeout",
            109 => "search failed, no matching file found",
            110 => "search successful, all files returned",
            111 => "search successful, some files returned",
            112 => "user already exists",
            113 => "user does not exist",
            114 => "user group already exists",
            115 => "user group does not exist",
            116 => "error 116",
            117 => "wrong message format",
            118 => "PTZ protocol not set",
            119 => "no file found",
            120 => "configured to enable",
            121 => "digital channel is not connected",
            150 => "success, device needs to restart",
            202 => "user not logged in",
            203 => "password is incorrect",
            204 => "user is illegal",
            205 => "user is locked",
            206 => "user is on the blacklist",
            207 => "username is already logged in",
            208 => "input is illegal",
            209 => "index is repeated",
            210 => "object does not exist",
            211 => "object does not exist",
            212 => "account is in use",
            213 => "subset is out of scope",
            214 => "password is illegal",
            215 => "passwords do not match",
            216 => "reserved account",
            502 => "command is illegal",
            503 => "intercom has been turned on",
            504 => "intercom is not turned on",
            511 => "upgrade already started",
            512 => "upgrade not started",
            513 => "upgrade data error",
            514 => "upgrade unsuccessful",
            515 => "upgrade succeeded",
            521 => "restore default failed",
            522 => "device needs to restart",
            523 => "illegal default configuration",
            602 => "application needs to restart",
            603 => "system needs to restart",
            604 => "error writing a file",
            605 => "feature not supported",
            606 => "verification failed",
            607 => "configuration does not exist",
            608 => "configuration parsing error",
            _ => return None,
        };
        Some(text)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(text) => write!(f, "{} ({})", self.0, text),
            None => write!(f, "{} (unrecognized return code)", self.0),
        }
    }
}

impl From<u32> for ReturnCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}
