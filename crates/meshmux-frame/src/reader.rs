use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{Frame, FrameHeader, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads frame headers and payloads from any `Read` stream.
///
/// Short reads are retried internally: `read_header` returns only once all
/// three header bytes are in, `read_payload` only once the whole payload is.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_capacity(inner, INITIAL_BUFFER_CAPACITY)
    }

    /// Create a reader whose scratch buffer starts at `capacity` bytes.
    pub fn with_capacity(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Read exactly one 3-byte header (blocking).
    ///
    /// Returns `ConnectionClosed` if the stream ends before the first byte
    /// and `UnexpectedEof` if it ends inside the header.
    pub fn read_header(&mut self) -> Result<FrameHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        match fill(&mut self.inner, &mut raw)? {
            0 => return Err(FrameError::ConnectionClosed),
            n if n < HEADER_SIZE => {
                return Err(FrameError::UnexpectedEof {
                    expected: HEADER_SIZE,
                    received: n,
                })
            }
            _ => {}
        }
        let header = FrameHeader::decode(raw);
        trace!(prefix = header.prefix, len = header.len, "read frame header");
        Ok(header)
    }

    /// Read exactly `len` payload bytes (blocking).
    pub fn read_payload(&mut self, len: usize) -> Result<Bytes> {
        self.buf.clear();
        self.buf.resize(len, 0);
        let received = fill(&mut self.inner, &mut self.buf[..])?;
        if received < len {
            return Err(FrameError::UnexpectedEof {
                expected: len,
                received,
            });
        }
        Ok(self.buf.split().freeze())
    }

    /// Read the next complete frame (blocking).
    pub fn read_frame(&mut self) -> Result<Frame> {
        let header = self.read_header()?;
        let payload = self.read_payload(header.payload_len())?;
        Ok(Frame {
            prefix: header.prefix,
            payload,
        })
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Fill `buf` completely unless the stream ends first; returns bytes read.
fn fill<T: Read>(inner: &mut T, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(filled)
}
