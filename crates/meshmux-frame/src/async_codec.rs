//! `tokio_util::codec` adapter for the role-prefixed wire format.
//!
//! Lets async code read and write duplex frames through `FramedRead` /
//! `FramedWrite` while speaking exactly the bytes the blocking
//! [`FrameReader`](crate::FrameReader) and [`FrameWriter`](crate::FrameWriter)
//! produce.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, HEADER_SIZE};
use crate::error::FrameError;

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        Ok(decode_frame(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = decode_frame(src) {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let expected = if src.len() < HEADER_SIZE {
            HEADER_SIZE
        } else {
            HEADER_SIZE + usize::from(u16::from_be_bytes([src[1], src[2]]))
        };
        Err(FrameError::UnexpectedEof {
            expected,
            received: src.len(),
        })
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(frame.prefix, frame.payload.as_ref(), dst)
    }
}

impl<'a> Encoder<(u8, &'a [u8])> for FrameCodec {
    type Error = FrameError;

    fn encode(
        &mut self,
        (prefix, payload): (u8, &'a [u8]),
        dst: &mut BytesMut,
    ) -> Result<(), FrameError> {
        encode_frame(prefix, payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::MAX_PAYLOAD;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex_pipe() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink = FramedWrite::new(client, FrameCodec::new());
        let mut stream = FramedRead::new(server, FrameCodec::new());

        sink.send(Frame::new(0, "foo")).await.unwrap();
        sink.send((1u8, &b"bar"[..])).await.unwrap();
        drop(sink);

        let f1 = stream.next().await.unwrap().unwrap();
        let f2 = stream.next().await.unwrap().unwrap();
        assert_eq!((f1.prefix, f1.payload.as_ref()), (0, b"foo".as_ref()));
        assert_eq!((f2.prefix, f2.payload.as_ref()), (1, b"bar".as_ref()));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_by_encoder() {
        let (client, _server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, FrameCodec::new());
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let err = sink.send(Frame::new(0, payload)).await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn truncated_stream_errors_at_eof() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"\x00\x00\x05ab"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(FrameError::UnexpectedEof {
                expected: 8,
                received: 5
            })
        ));
    }
}
