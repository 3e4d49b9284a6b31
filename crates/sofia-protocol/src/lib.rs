//! sofia-protocol: Wire protocol for SOFIA network video devices
//!
//! This crate defines the binary framing spoken by DVR/NVR/IP-camera
//! firmware on TCP port 34567 (and on the UDP discovery port), the
//! operation codes, and the JSON payload records the session layer reads.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod payload;
pub mod return_code;
pub mod session;

pub use codec::{decode_datagram, decode_frame, encode_frame, Frame, FrameCodec};
pub use error::ProtocolError;
pub use frame::{FrameHeader, HEADER_FLAG, HEADER_SIZE, MAX_BODY_SIZE, TRAILER, TRAILER_SIZE};
pub use message::MessageId;
pub use payload::{
    CommandReply, CommandRequest, DiscoveryAnnouncement, LoginRequest, LoginResponse, NetCommon,
    SystemInfo, SystemInfoReply,
};
pub use return_code::ReturnCode;
pub use session::{CorrelationId, SessionId};
