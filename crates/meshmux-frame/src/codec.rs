use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: role prefix (1) + length (2) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Role prefix of the frame.
    pub prefix: u8,
    /// Payload length in bytes.
    pub len: u16,
}

impl FrameHeader {
    pub fn new(prefix: u8, len: u16) -> Self {
        Self { prefix, len }
    }

    /// Header for `payload`, or `PayloadTooLarge` if it does not fit.
    pub fn for_payload(prefix: u8, payload: &[u8]) -> Result<Self> {
        let len = u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        })?;
        Ok(Self { prefix, len })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let len = self.len.to_be_bytes();
        [self.prefix, len[0], len[1]]
    }

    pub fn decode(raw: [u8; HEADER_SIZE]) -> Self {
        Self {
            prefix: raw[0],
            len: u16::from_be_bytes([raw[1], raw[2]]),
        }
    }

    pub fn payload_len(&self) -> usize {
        usize::from(self.len)
    }
}

/// A framed payload tagged with its role prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The role prefix this payload was sent under.
    pub prefix: u8,
    /// The payload bytes.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(prefix: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            prefix,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬─────────────┬──────────────────┐
/// │ Prefix     │ Length      │ Payload          │
/// │ (1B, 0|1)  │ (2B BE u16) │ (Length bytes)   │
/// └────────────┴─────────────┴──────────────────┘
/// ```
///
/// Nothing is written to `dst` when the payload is too large.
pub fn encode_frame(prefix: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let header = FrameHeader::for_payload(prefix, payload)?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(header.prefix);
    dst.put_u16(header.len);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Option<Frame> {
    if src.len() < HEADER_SIZE {
        return None;
    }

    let header = FrameHeader::decode([src[0], src[1], src[2]]);
    let total = HEADER_SIZE + header.payload_len();
    if src.len() < total {
        src.reserve(total - src.len());
        return None;
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(header.payload_len()).freeze();
    Some(Frame {
        prefix: header.prefix,
        payload,
    })
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest payload a writer accepts. Capped at [`MAX_PAYLOAD`].
    pub max_payload_size: usize,
}

impl FrameConfig {
    /// The effective payload limit, never above what the length field holds.
    pub fn payload_limit(&self) -> usize {
        self.max_payload_size.min(MAX_PAYLOAD)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
        }
    }
}
