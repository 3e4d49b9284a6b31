//! Tokio codec for framed protocol messages

use bytes::{Buf, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, HEADER_SIZE, MAX_BODY_SIZE, TRAILER, TRAILER_SIZE};
use crate::message::MessageId;
use crate::session::{CorrelationId, SessionId};

/// A complete frame with header fields and payload
///
/// `payload` never includes the trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version
    pub version: u8,
    /// Device-assigned session ID
    pub session_id: SessionId,
    /// Per-session sequence counter
    pub sequence: u8,
    /// Login correlation byte (login frames only)
    pub correlation_id: CorrelationId,
    /// Operation code
    pub message_id: MessageId,
    /// Opaque payload, usually JSON text
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame with all header fields zeroed
    pub fn new(message_id: MessageId, payload: impl Into<Bytes>) -> Self {
        Self {
            version: 0,
            session_id: SessionId::UNASSIGNED,
            sequence: 0,
            correlation_id: CorrelationId::NONE,
            message_id,
            payload: payload.into(),
        }
    }

    /// Create a frame whose payload is the JSON encoding of `body`
    pub fn json_request<T: Serialize>(message_id: MessageId, body: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(body)?;
        Ok(Self::new(message_id, payload))
    }

    /// Set the session ID
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    /// Set the sequence number
    pub fn with_sequence(mut self, sequence: u8) -> Self {
        self.sequence = sequence;
        self
    }

    /// Set the correlation ID
    pub fn with_correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Payload length, excluding the trailer
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// The total wire size of this frame (header + payload + trailer)
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + TRAILER_SIZE
    }

    /// Header describing this frame on the wire
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            version: self.version,
            session_id: self.session_id,
            sequence: self.sequence,
            correlation_id: self.correlation_id,
            message_id: self.message_id,
            body_length: (self.payload.len() + TRAILER_SIZE) as u32,
        }
    }

    /// Parse the payload as JSON
    ///
    /// Firmware pads some replies with NULs or newlines; those are ignored.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let end = self
            .payload
            .iter()
            .rposition(|b| !matches!(b, 0 | b'\n' | b'\r' | b' '))
            .map_or(0, |i| i + 1);
        Ok(serde_json::from_slice(&self.payload[..end])?)
    }

    /// Build a frame from a decoded header and its body
    fn from_parts(header: FrameHeader, mut body: Bytes) -> Self {
        if body.ends_with(&TRAILER) {
            body.truncate(body.len() - TRAILER_SIZE);
        } else {
            trace!("{} frame arrived without trailer", header.message_id);
        }

        Self {
            version: header.version,
            session_id: header.session_id,
            sequence: header.sequence,
            correlation_id: header.correlation_id,
            message_id: header.message_id,
            payload: body,
        }
    }
}

/// Encode a frame into the wire format
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let body_len = frame.payload.len() + TRAILER_SIZE;
    if body_len > u32::MAX as usize {
        return Err(ProtocolError::BodyTooLarge {
            size: body_len,
            max: u32::MAX as usize,
        });
    }

    dst.reserve(HEADER_SIZE + body_len);
    frame.header().encode(dst);
    dst.extend_from_slice(&frame.payload);
    dst.extend_from_slice(&TRAILER);
    Ok(())
}

/// Decode a frame from a buffer
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_body: usize) -> Result<Option<Frame>, ProtocolError> {
    let header = match FrameHeader::decode(&mut &src[..])? {
        Some(h) => h,
        None => return Ok(None),
    };

    let body_len = header.body_length as usize;
    if body_len > max_body {
        return Err(ProtocolError::BodyTooLarge {
            size: body_len,
            max: max_body,
        });
    }

    if src.len() < HEADER_SIZE + body_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(body_len).freeze();
    Ok(Some(Frame::from_parts(header, body)))
}

/// Decode a single frame carried in one UDP datagram
pub fn decode_datagram(datagram: &[u8]) -> Result<Frame, ProtocolError> {
    let mut cursor = datagram;
    let header = FrameHeader::decode(&mut cursor)?.ok_or(ProtocolError::IncompleteFrame {
        expected: HEADER_SIZE,
        actual: datagram.len(),
    })?;

    let body_len = header.body_length as usize;
    if cursor.len() < body_len {
        return Err(ProtocolError::IncompleteFrame {
            expected: HEADER_SIZE + body_len,
            actual: datagram.len(),
        });
    }

    Ok(Frame::from_parts(
        header,
        Bytes::copy_from_slice(&cursor[..body_len]),
    ))
}

/// Codec for encoding/decoding protocol frames
#[derive(Debug)]
pub struct FrameCodec {
    /// Current header being decoded (if any)
    pending_header: Option<FrameHeader>,
    /// Largest body accepted from the wire
    max_body_size: usize,
}

impl FrameCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self::with_max_body_size(MAX_BODY_SIZE)
    }

    /// Create a codec with a custom body limit
    pub fn with_max_body_size(max_body_size: usize) -> Self {
        Self {
            pending_header: None,
            max_body_size,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Try to decode header if we don't have one
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None), // Need more data
            },
        };

        let body_len = header.body_length as usize;
        if body_len > self.max_body_size {
            debug!(
                "Rejecting {} frame: body of {} bytes exceeds {}",
                header.message_id, body_len, self.max_body_size
            );
            return Err(ProtocolError::BodyTooLarge {
                size: body_len,
                max: self.max_body_size,
            });
        }

        if src.len() < body_len {
            // Save header and wait for more data
            src.reserve(body_len - src.len());
            self.pending_header = Some(header);
            return Ok(None);
        }

        let body = src.split_to(body_len).freeze();
        Ok(Some(Frame::from_parts(header, body)))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body_len = frame.payload.len() + TRAILER_SIZE;
        if body_len > self.max_body_size {
            return Err(ProtocolError::BodyTooLarge {
                size: body_len,
                max: self.max_body_size,
            });
        }
        encode_frame(&frame, dst)
    }
}
