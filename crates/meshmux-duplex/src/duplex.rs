use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use meshmux_frame::{FrameError, FrameHeader, FrameReader, FrameWriter, Role, Side};
use meshmux_transport::{Conn, TransportError};
use tracing::{debug, info, trace, warn};

use crate::config::DuplexConfig;
use crate::endpoint::Endpoint;
use crate::error::{CloseReason, DuplexError, Result};
use crate::inbound::{lock, Inbound};

/// Lifecycle of a multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplexState {
    /// Constructed; the demultiplex loop has not read anything yet.
    Idle,
    /// Waiting for the next 3-byte header.
    AwaitingHeader,
    /// Reading a payload into an endpoint's queue.
    ForwardingPayload,
    /// Terminal. Reads drain then report end-of-stream, writes fail.
    Closed,
}

impl DuplexState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => DuplexState::Idle,
            1 => DuplexState::AwaitingHeader,
            2 => DuplexState::ForwardingPayload,
            _ => DuplexState::Closed,
        }
    }
}

/// State shared between the demultiplex loop and every endpoint handle.
pub(crate) struct Shared<T> {
    pub(crate) side: Side,
    pub(crate) writer: Mutex<FrameWriter<T>>,
    closer: Mutex<T>,
    /// Indexed by role prefix.
    inbound: [Inbound; 2],
    state: AtomicU8,
    close_reason: Mutex<Option<CloseReason>>,
}

impl<T: Conn> Shared<T> {
    pub(crate) fn inbound(&self, prefix: u8) -> &Inbound {
        &self.inbound[usize::from(prefix)]
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        lock(&self.close_reason).clone()
    }

    pub(crate) fn state(&self) -> DuplexState {
        DuplexState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, next: DuplexState) {
        let closed = DuplexState::Closed as u8;
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != closed).then_some(next as u8)
            });
    }

    /// Move to `Closed`, wake every reader and shut the connection down.
    ///
    /// Only the first call has any effect; its reason is the one endpoints
    /// report from then on.
    pub(crate) fn terminate(&self, reason: CloseReason) {
        {
            let mut slot = lock(&self.close_reason);
            if slot.is_some() {
                return;
            }
            *slot = Some(reason.clone());
        }
        self.state
            .store(DuplexState::Closed as u8, Ordering::SeqCst);

        if reason.is_clean() {
            info!(side = %self.side, %reason, "duplex closed");
        } else {
            warn!(side = %self.side, %reason, "duplex terminated");
        }

        for inbound in &self.inbound {
            inbound.close(reason.clone());
        }
        if let Err(err) = lock(&self.closer).shutdown() {
            debug!(%err, "connection already shut down");
        }
    }
}

/// Two logical byte streams over one physical connection.
///
/// Owns the read side of the connection: [`read_header`](Self::read_header)
/// and [`forward`](Self::forward) take `&mut self`, so only one demultiplex
/// loop can ever read. Writes go through the [`Endpoint`] handles, which
/// share a single connection-wide write lock.
pub struct Duplex<T: Conn> {
    reader: FrameReader<T>,
    shared: Arc<Shared<T>>,
    config: DuplexConfig,
}

impl<T: Conn> Duplex<T> {
    /// Bind a multiplexer to `conn` with default configuration.
    ///
    /// `side` must be the opposite of what the remote peer passes. Nothing
    /// on the wire checks this.
    pub fn new(conn: T, side: Side) -> Result<Self> {
        Self::with_config(conn, side, DuplexConfig::default())
    }

    /// Bind a multiplexer to `conn` with explicit configuration.
    pub fn with_config(conn: T, side: Side, config: DuplexConfig) -> Result<Self> {
        conn.set_read_timeout(config.read_timeout)
            .map_err(TransportError::Io)?;
        conn.set_write_timeout(config.write_timeout)
            .map_err(TransportError::Io)?;

        let write_half = conn.try_clone().map_err(TransportError::Io)?;
        let closer = conn.try_clone().map_err(TransportError::Io)?;

        let shared = Arc::new(Shared {
            side,
            writer: Mutex::new(FrameWriter::with_config(write_half, config.frame_config())),
            closer: Mutex::new(closer),
            inbound: [
                Inbound::with_capacity(config.initial_buffer_capacity),
                Inbound::with_capacity(config.initial_buffer_capacity),
            ],
            state: AtomicU8::new(DuplexState::Idle as u8),
            close_reason: Mutex::new(None),
        });

        debug!(
            %side,
            client_prefix = side.prefix_for(Role::Client),
            server_prefix = side.prefix_for(Role::Server),
            "duplex created"
        );

        Ok(Self {
            reader: FrameReader::new(conn),
            shared,
            config,
        })
    }

    /// Which end of the connection this multiplexer was built as.
    pub fn side(&self) -> Side {
        self.shared.side
    }

    /// The endpoint carrying this peer's client role.
    pub fn client(&self) -> Endpoint<T> {
        self.endpoint(Role::Client)
    }

    /// The endpoint carrying this peer's server role.
    pub fn server(&self) -> Endpoint<T> {
        self.endpoint(Role::Server)
    }

    pub fn endpoint(&self, role: Role) -> Endpoint<T> {
        Endpoint::new(role, Arc::clone(&self.shared))
    }

    pub fn state(&self) -> DuplexState {
        self.shared.state()
    }

    /// Why the multiplexer closed, once it has.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.close_reason()
    }

    pub fn config(&self) -> &DuplexConfig {
        &self.config
    }

    /// Read the next frame header from the connection (blocking).
    ///
    /// Any failure is terminal for the multiplexer.
    pub fn read_header(&mut self) -> Result<FrameHeader> {
        self.ensure_open()?;
        self.shared.set_state(DuplexState::AwaitingHeader);
        let header = self.reader.read_header().map_err(|err| self.fail(err))?;
        trace!(prefix = header.prefix, len = header.len, "frame header");
        Ok(header)
    }

    /// Read `size` payload bytes and queue them on the endpoint owning
    /// `prefix` (blocking).
    ///
    /// A prefix that matches neither endpoint is a fatal desynchronization:
    /// the multiplexer closes and the payload is left unread.
    pub fn forward(&mut self, prefix: u8, size: u16) -> Result<()> {
        self.ensure_open()?;
        let Some(role) = self.shared.side.role_for(prefix) else {
            warn!(prefix, side = %self.shared.side, "frame prefix matches no endpoint");
            self.shared.terminate(CloseReason::Desync { prefix });
            return Err(DuplexError::Desync { prefix });
        };

        self.shared.set_state(DuplexState::ForwardingPayload);
        let payload = self
            .reader
            .read_payload(usize::from(size))
            .map_err(|err| self.fail(err))?;
        self.shared.inbound(prefix).push(&payload);
        trace!(prefix, %role, len = size, "forwarded payload");
        self.shared.set_state(DuplexState::AwaitingHeader);
        Ok(())
    }

    /// Run the demultiplex loop until the connection ends.
    ///
    /// Returns `Ok(())` when the peer closes on a frame boundary or the
    /// multiplexer is closed locally, and the terminal error otherwise.
    pub fn serve(&mut self) -> Result<()> {
        info!(side = %self.shared.side, "demultiplex loop started");
        let err = loop {
            let header = match self.read_header() {
                Ok(header) => header,
                Err(err) => break err,
            };
            if let Err(err) = self.forward(header.prefix, header.len) {
                break err;
            }
        };

        match self.shared.close_reason() {
            Some(reason) if reason.is_clean() => {
                debug!(%reason, "demultiplex loop stopped");
                Ok(())
            }
            _ => Err(err),
        }
    }

    /// Run [`serve`](Self::serve) on a dedicated thread.
    ///
    /// Take the endpoints first; the returned handle can close the
    /// multiplexer and collect the loop's result.
    pub fn spawn(self) -> Result<ServeHandle<T>> {
        let shared = Arc::clone(&self.shared);
        let name = self.config.thread_name.clone();
        let mut duplex = self;
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || duplex.serve())
            .map_err(TransportError::Io)?;
        Ok(ServeHandle { thread, shared })
    }

    /// Close the multiplexer and shut the connection down.
    ///
    /// Blocked reads wake with end-of-stream once their queue drains;
    /// writes that have not yet taken the write lock fail with `Closed`.
    pub fn close(&self) {
        self.shared.terminate(CloseReason::Shutdown);
    }

    fn ensure_open(&self) -> Result<()> {
        match self.shared.close_reason() {
            Some(reason) => Err(DuplexError::Closed(reason)),
            None => Ok(()),
        }
    }

    fn fail(&self, err: FrameError) -> DuplexError {
        self.shared.terminate(CloseReason::from_frame_error(&err));
        err.into()
    }
}

impl<T: Conn> Drop for Duplex<T> {
    fn drop(&mut self) {
        // Nothing can feed the endpoints once the reader is gone.
        self.shared.terminate(CloseReason::Shutdown);
    }
}

impl<T: Conn> fmt::Debug for Duplex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Duplex")
            .field("side", &self.shared.side)
            .field("state", &self.shared.state())
            .finish()
    }
}

/// Handle to a demultiplex loop running on its own thread.
pub struct ServeHandle<T: Conn> {
    thread: JoinHandle<Result<()>>,
    shared: Arc<Shared<T>>,
}

impl<T: Conn> ServeHandle<T> {
    pub fn state(&self) -> DuplexState {
        self.shared.state()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.close_reason()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Close the multiplexer; the loop thread exits shortly after.
    pub fn close(&self) {
        self.shared.terminate(CloseReason::Shutdown);
    }

    /// Wait for the loop thread and return its result.
    pub fn join(self) -> Result<()> {
        self.thread.join().unwrap_or_else(|_| {
            Err(DuplexError::Closed(CloseReason::Io {
                kind: std::io::ErrorKind::Other,
                message: "demultiplex thread panicked".to_string(),
            }))
        })
    }
}

impl<T: Conn> fmt::Debug for ServeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeHandle")
            .field("side", &self.shared.side)
            .field("state", &self.shared.state())
            .finish()
    }
}
