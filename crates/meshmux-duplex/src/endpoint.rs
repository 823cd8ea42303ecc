use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use meshmux_frame::{FrameError, Role, Side};
use meshmux_transport::Conn;
use tracing::trace;

use crate::duplex::Shared;
use crate::error::{CloseReason, DuplexError, Result};
use crate::inbound::lock;

/// One logical byte stream of a [`Duplex`](crate::Duplex).
///
/// Handles are cheap to clone and may be moved to other threads. Every
/// clone reads from the same inbound queue and writes under the same
/// prefix.
pub struct Endpoint<T: Conn> {
    role: Role,
    prefix: u8,
    shared: Arc<Shared<T>>,
}

impl<T: Conn> Endpoint<T> {
    pub(crate) fn new(role: Role, shared: Arc<Shared<T>>) -> Self {
        let prefix = shared.side.prefix_for(role);
        Self {
            role,
            prefix,
            shared,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Prefix byte this endpoint writes and receives under.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn side(&self) -> Side {
        self.shared.side
    }

    /// Send `payload` as exactly one frame (blocking).
    ///
    /// Returns the number of payload bytes sent. Payloads above the payload
    /// limit fail with [`FrameError::PayloadTooLarge`] and leave the
    /// connection untouched; any other write failure closes the multiplexer.
    pub fn send(&self, payload: &[u8]) -> Result<usize> {
        let mut writer = lock(&self.shared.writer);
        if let Some(reason) = self.shared.close_reason() {
            return Err(DuplexError::Closed(reason));
        }

        match writer.send(self.prefix, payload) {
            Ok(()) => {
                trace!(role = %self.role, prefix = self.prefix, len = payload.len(), "sent");
                Ok(payload.len())
            }
            Err(err @ FrameError::PayloadTooLarge { .. }) => Err(err.into()),
            Err(err) => {
                drop(writer);
                self.shared.terminate(CloseReason::from_frame_error(&err));
                Err(err.into())
            }
        }
    }

    /// Send `data` split into as many maximum-size frames as needed.
    ///
    /// Frames from other writers may interleave between chunks. An empty
    /// `data` still produces one empty frame.
    pub fn write_chunked(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return self.send(data);
        }
        let limit = lock(&self.shared.writer).config().payload_limit().max(1);
        let mut sent = 0usize;
        for chunk in data.chunks(limit) {
            sent += self.send(chunk)?;
        }
        Ok(sent)
    }

    /// Read up to `buf.len()` bytes delivered to this endpoint (blocking).
    ///
    /// Returns fewer bytes than requested whenever fewer are queued. After
    /// the multiplexer closes, queued bytes are still returned; then an
    /// orderly close yields `Ok(0)` and a failure yields `Closed`.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.shared.inbound(self.prefix).read(buf)
    }

    /// Bytes queued for this endpoint and not yet read.
    pub fn buffered(&self) -> usize {
        self.shared.inbound(self.prefix).len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.close_reason().is_some()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.close_reason()
    }
}

impl<T: Conn> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            role: self.role,
            prefix: self.prefix,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Conn> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("side", &self.shared.side)
            .field("role", &self.role)
            .field("prefix", &self.prefix)
            .field("buffered", &self.buffered())
            .finish()
    }
}

impl<T: Conn> Read for &Endpoint<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf).map_err(io::Error::from)
    }
}

impl<T: Conn> Read for Endpoint<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
}

impl<T: Conn> Write for &Endpoint<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf).map_err(io::Error::from)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_chunked(buf).map(|_| ()).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Every send is flushed before it returns.
        Ok(())
    }
}

impl<T: Conn> Write for Endpoint<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (&*self).write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
