//! JSON payload records
//!
//! The framing layer treats payloads as opaque bytes. These records cover
//! the bodies the session layer itself must read (login, keepalive, generic
//! command replies) plus the few typed replies the CLI prints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::Ipv4Addr;

use crate::return_code::ReturnCode;

/// Client identifier sent in `LoginType`
pub const LOGIN_TYPE: &str = "DVRIP-Web";

/// Login request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Always "MD5"
    #[serde(rename = "EncryptType")]
    pub encrypt_type: String,
    /// Client identifier
    #[serde(rename = "LoginType")]
    pub login_type: String,
    /// Password, already hashed the way the firmware expects
    #[serde(rename = "PassWord")]
    pub password: String,
    /// Username
    #[serde(rename = "UserName")]
    pub username: String,
}

impl LoginRequest {
    /// Build a login body for the given credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            encrypt_type: "MD5".to_string(),
            login_type: LOGIN_TYPE.to_string(),
            password: password.into(),
            username: username.into(),
        }
    }
}

/// Login response body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Keepalive period advised by the device, in seconds
    #[serde(rename = "AliveInterval", default)]
    pub alive_interval: u32,
    /// Number of video channels
    #[serde(rename = "ChannelNum", default)]
    pub channel_num: i32,
    /// Device type. Firmware sends the key with a trailing space.
    #[serde(rename = "DeviceType ", alias = "DeviceType", default)]
    pub device_type: String,
    /// Extra channels
    #[serde(rename = "ExtraChannel", default)]
    pub extra_channel: i32,
    /// Status code
    #[serde(rename = "Ret")]
    pub ret: ReturnCode,
    /// Session ID as hex text, e.g. "0x0000000B"
    #[serde(rename = "SessionID", default)]
    pub session_id: String,
}

/// Generic command request body (also used for keepalive and logout)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command name
    #[serde(rename = "Name")]
    pub name: String,
    /// Session ID as hex text
    #[serde(rename = "SessionID")]
    pub session_id: String,
}

impl CommandRequest {
    /// Build a command body
    pub fn new(name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session_id: session_id.into(),
        }
    }
}

/// Generic command reply
///
/// Everything besides `Name`, `Ret` and `SessionID` is kept in `body`; the
/// interesting section is usually keyed by the command name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    /// Command name
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Status code
    #[serde(rename = "Ret", default)]
    pub ret: ReturnCode,
    /// Session ID as hex text
    #[serde(rename = "SessionID", default)]
    pub session_id: String,
    /// Remaining fields
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl CommandReply {
    /// The section named after the command, if present
    pub fn section(&self) -> Option<&Value> {
        self.body.get(&self.name)
    }
}

/// System information reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfoReply {
    /// Command name
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Status code
    #[serde(rename = "Ret", default)]
    pub ret: ReturnCode,
    /// Session ID as hex text
    #[serde(rename = "SessionID", default)]
    pub session_id: String,
    /// The information block
    #[serde(rename = "SystemInfo", default)]
    pub system_info: SystemInfo,
}

/// Device hardware/software description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemInfo {
    pub alarm_in_channel: i32,
    pub alarm_out_channel: i32,
    pub audio_in_channel: i32,
    pub build_time: String,
    pub combine_switch: i32,
    pub device_model: String,
    pub device_run_time: String,
    pub device_type: i32,
    pub dig_channel: i32,
    pub encrypt_version: String,
    pub extra_channel: i32,
    pub hard_ware: String,
    pub hard_ware_version: String,
    pub serial_no: String,
    pub soft_ware_version: String,
    pub talk_in_channel: i32,
    pub talk_out_channel: i32,
    pub updata_time: String,
    pub updata_type: String,
    pub video_in_channel: i32,
    pub video_out_channel: i32,
}

/// Broadcast announcement received on the discovery port
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryAnnouncement {
    /// Usually "NetWork.NetCommon"
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Network identity of the announcing device
    #[serde(rename = "NetWork.NetCommon", default)]
    pub net_common: Option<NetCommon>,
    /// Status code
    #[serde(rename = "Ret", default)]
    pub ret: ReturnCode,
    /// Session ID, always zero for broadcasts
    #[serde(rename = "SessionID", default)]
    pub session_id: String,
}

/// Network identity block of a discovery announcement
///
/// Addresses are hex text of a little-endian IPv4 address, e.g.
/// `"0x0a01a8c0"` is 192.168.1.10.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetCommon {
    #[serde(rename = "DeviceType")]
    pub device_type: i32,
    #[serde(rename = "GateWay")]
    pub gateway: String,
    #[serde(rename = "HostIP")]
    pub host_ip: String,
    #[serde(rename = "HostName")]
    pub host_name: String,
    #[serde(rename = "HttpPort")]
    pub http_port: u16,
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "MaxBps")]
    pub max_bps: u32,
    #[serde(rename = "MonMode")]
    pub mon_mode: String,
    #[serde(rename = "SN")]
    pub serial_number: String,
    #[serde(rename = "SSLPort")]
    pub ssl_port: u16,
    #[serde(rename = "Submask")]
    pub submask: String,
    #[serde(rename = "TCPMaxConn")]
    pub tcp_max_conn: u32,
    #[serde(rename = "TCPPort")]
    pub tcp_port: u16,
    #[serde(rename = "TransferPlan")]
    pub transfer_plan: String,
    #[serde(rename = "UDPPort")]
    pub udp_port: u16,
    #[serde(rename = "UseHSDownLoad")]
    pub use_hs_download: bool,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "BuildDate")]
    pub build_date: String,
    #[serde(rename = "OtherFunction")]
    pub other_function: String,
}

impl NetCommon {
    /// Host address
    pub fn host_addr(&self) -> Option<Ipv4Addr> {
        parse_hex_ipv4(&self.host_ip)
    }

    /// Gateway address
    pub fn gateway_addr(&self) -> Option<Ipv4Addr> {
        parse_hex_ipv4(&self.gateway)
    }

    /// Subnet mask
    pub fn submask_addr(&self) -> Option<Ipv4Addr> {
        parse_hex_ipv4(&self.submask)
    }
}

/// Parse firmware hex address text (`0x` + little-endian u32)
pub fn parse_hex_ipv4(text: &str) -> Option<Ipv4Addr> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let raw = u32::from_str_radix(digits, 16).ok()?;
    Some(Ipv4Addr::from(raw.to_le_bytes()))
}
