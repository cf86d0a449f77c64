//! Length-prefixed frame envelope.
//!
//! Every message in either direction is a single frame:
//!
//! ```text
//! +-------------+------------------------+
//! | length      | payload                |
//! | i32 (LE)    | `length` bytes         |
//! +-------------+------------------------+
//! ```
//!
//! `length` counts payload bytes only, never the header. A negative length
//! is a protocol violation.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// The fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length as carried on the wire.
    pub len: i32,
}

impl FrameHeader {
    /// Creates the header for a payload of `payload_len` bytes.
    pub fn for_payload(payload_len: usize) -> Result<Self, ProtocolError> {
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self {
            len: payload_len as i32,
        })
    }

    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        self.len.to_le_bytes()
    }

    pub fn decode(bytes: [u8; FRAME_HEADER_SIZE]) -> Self {
        Self {
            len: i32::from_le_bytes(bytes),
        }
    }

    /// Returns the payload length, rejecting negative values.
    pub fn payload_len(&self) -> Result<usize, ProtocolError> {
        if self.len < 0 {
            return Err(ProtocolError::NegativeLength(self.len));
        }
        Ok(self.len as usize)
    }
}

/// Builds a complete frame (header followed by payload) ready to be written.
pub fn encode_frame(payload: &[u8]) -> Result<BytesMut, ProtocolError> {
    let header = FrameHeader::for_payload(payload.len())?;
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_slice(&header.encode());
    buf.put_slice(payload);
    Ok(buf)
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        encode_frame(&self.payload)
    }

    /// Decodes a frame from an accumulating buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let header = FrameHeader::decode([buf[0], buf[1], buf[2], buf[3]]);
        let payload_len = header.payload_len()?;

        if buf.len() < FRAME_HEADER_SIZE + payload_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();

        Ok(Some(Self { payload }))
    }
}
