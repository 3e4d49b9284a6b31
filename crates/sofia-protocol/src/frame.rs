//! Frame header encoding/decoding
//!
//! The frame format uses a 20-byte header, all multi-byte fields
//! little-endian:
//!
//! ```text
//!  0    1    2    3    4    5    6    7    8    9    10   11   12   13   14   15   16 .. 19
//! +----+----+---------+----+--------------+----+----+-------------------+---------+---------+
//! |flag|ver | reserved|sess|   reserved   |seq |corr|     reserved      | msg id  | length  |
//! +----+----+---------+----+--------------+----+----+-------------------+---------+---------+
//! ```
//!
//! The header is followed by the payload and the fixed trailer `0x0A 0x00`.
//! The length field counts the payload together with the trailer. The
//! trailer is never escaped, so payloads are expected to be JSON text.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::message::MessageId;
use crate::session::{CorrelationId, SessionId};

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 20;

/// Fixed marker at offset 0
pub const HEADER_FLAG: u8 = 0xFF;

/// Fixed terminator after every payload
pub const TRAILER: [u8; 2] = [0x0A, 0x00];

/// Size of the trailer in bytes
pub const TRAILER_SIZE: usize = 2;

/// Default maximum body size accepted from the wire (16MB)
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version, usually 0
    pub version: u8,
    /// Device-assigned session, 0 before login
    pub session_id: SessionId,
    /// Per-session sequence counter
    pub sequence: u8,
    /// Login correlation byte; only populated for login frames
    pub correlation_id: CorrelationId,
    /// Operation code
    pub message_id: MessageId,
    /// Bytes following the header (payload plus trailer)
    pub body_length: u32,
}

impl FrameHeader {
    /// Encode the header into a byte buffer
    ///
    /// The correlation byte is written only for login frames and zeroed
    /// for everything else.
    pub fn encode(&self, dst: &mut BytesMut) {
        let correlation = if self.message_id.carries_correlation() {
            self.correlation_id.as_u8()
        } else {
            0
        };

        dst.reserve(HEADER_SIZE);
        dst.put_u8(HEADER_FLAG);
        dst.put_u8(self.version);
        dst.put_bytes(0, 2);
        dst.put_u8(self.session_id.as_u8());
        dst.put_bytes(0, 3);
        dst.put_u8(self.sequence);
        dst.put_u8(correlation);
        dst.put_bytes(0, 4);
        dst.put_u16_le(self.message_id.as_u16());
        dst.put_u32_le(self.body_length);
    }

    /// Decode a header from the front of a buffer, consuming it
    ///
    /// Returns None if there aren't enough bytes in the buffer.
    /// Returns Err if the header flag is wrong.
    pub fn decode<B: Buf>(src: &mut B) -> Result<Option<Self>, ProtocolError> {
        if src.remaining() < HEADER_SIZE {
            return Ok(None);
        }

        let flag = src.get_u8();
        if flag != HEADER_FLAG {
            return Err(ProtocolError::InvalidHeader(flag));
        }

        let version = src.get_u8();
        src.advance(2);
        let session_id = SessionId::new(src.get_u8());
        src.advance(3);
        let sequence = src.get_u8();
        let correlation = src.get_u8();
        src.advance(4);
        let message_id = MessageId::new(src.get_u16_le());
        let body_length = src.get_u32_le();

        // The byte is overloaded outside of login and must not leak through
        let correlation_id = if message_id.carries_correlation() {
            CorrelationId::new(correlation)
        } else {
            CorrelationId::NONE
        };

        Ok(Some(Self {
            version,
            session_id,
            sequence,
            correlation_id,
            message_id,
            body_length,
        }))
    }
}
