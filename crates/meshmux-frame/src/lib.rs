//! Role-prefixed framing for duplex multiplexing.
//!
//! Two logical streams share one physical connection. Every write is framed
//! with:
//! - A 1-byte role prefix (0 or 1) naming the logical stream
//! - A 2-byte big-endian payload length
//!
//! followed by exactly that many payload bytes. Payloads larger than 65535
//! bytes must be split by the caller.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod role;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, FrameHeader, HEADER_SIZE, MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use role::{is_valid_prefix, Role, Side, PREFIX_0, PREFIX_1};
pub use writer::FrameWriter;
