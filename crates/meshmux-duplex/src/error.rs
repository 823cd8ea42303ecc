use std::fmt;
use std::io::ErrorKind;

use meshmux_frame::FrameError;
use meshmux_transport::TransportError;

/// Why a multiplexer stopped. Recorded once, on the first terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the connection on a frame boundary.
    Eof,
    /// `close()` was called locally.
    Shutdown,
    /// The connection failed, or ended inside a frame.
    Io { kind: ErrorKind, message: String },
    /// A frame arrived under a prefix neither endpoint owns.
    Desync { prefix: u8 },
}

impl CloseReason {
    /// True for closures that readers observe as plain end-of-stream.
    pub fn is_clean(&self) -> bool {
        matches!(self, CloseReason::Eof | CloseReason::Shutdown)
    }

    pub(crate) fn from_frame_error(err: &FrameError) -> Self {
        match err {
            FrameError::ConnectionClosed => CloseReason::Eof,
            FrameError::UnexpectedEof { .. } => CloseReason::Io {
                kind: ErrorKind::UnexpectedEof,
                message: err.to_string(),
            },
            FrameError::Io(io) => CloseReason::Io {
                kind: io.kind(),
                message: io.to_string(),
            },
            FrameError::PayloadTooLarge { .. } => CloseReason::Io {
                kind: ErrorKind::InvalidInput,
                message: err.to_string(),
            },
        }
    }

    fn io_kind(&self) -> ErrorKind {
        match self {
            CloseReason::Eof => ErrorKind::UnexpectedEof,
            CloseReason::Shutdown => ErrorKind::NotConnected,
            CloseReason::Io { kind, .. } => *kind,
            CloseReason::Desync { .. } => ErrorKind::InvalidData,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Eof => f.write_str("peer closed the connection"),
            CloseReason::Shutdown => f.write_str("closed locally"),
            CloseReason::Io { message, .. } => write!(f, "transport failure: {message}"),
            CloseReason::Desync { prefix } => {
                write!(f, "protocol desynchronized on prefix {prefix}")
            }
        }
    }
}

/// Errors returned by the multiplexer and its endpoints.
#[derive(Debug, thiserror::Error)]
pub enum DuplexError {
    /// Transport-level error while setting up the connection.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error: I/O failure, truncated frame or oversized payload.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The peer sent a frame under a prefix neither endpoint owns.
    ///
    /// The byte stream can no longer be trusted; the connection must be torn
    /// down and re-established.
    #[error("protocol desynchronized: frame prefix {prefix} matches no endpoint")]
    Desync { prefix: u8 },

    /// The multiplexer already terminated.
    #[error("duplex closed: {0}")]
    Closed(CloseReason),
}

impl DuplexError {
    /// True if this error only reports an orderly end of the connection.
    pub fn is_clean_close(&self) -> bool {
        match self {
            DuplexError::Frame(FrameError::ConnectionClosed) => true,
            DuplexError::Closed(reason) => reason.is_clean(),
            _ => false,
        }
    }
}

impl From<DuplexError> for std::io::Error {
    fn from(err: DuplexError) -> Self {
        let kind = match &err {
            DuplexError::Transport(TransportError::Io(io)) => io.kind(),
            DuplexError::Transport(_) => ErrorKind::Other,
            DuplexError::Frame(FrameError::Io(io)) => io.kind(),
            DuplexError::Frame(FrameError::PayloadTooLarge { .. }) => ErrorKind::InvalidInput,
            DuplexError::Frame(FrameError::ConnectionClosed) => ErrorKind::BrokenPipe,
            DuplexError::Frame(FrameError::UnexpectedEof { .. }) => ErrorKind::UnexpectedEof,
            DuplexError::Desync { .. } => ErrorKind::InvalidData,
            DuplexError::Closed(reason) => reason.io_kind(),
        };
        std::io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, DuplexError>;
