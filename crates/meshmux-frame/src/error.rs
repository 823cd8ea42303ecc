/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit the 16-bit length field (or the configured cap).
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed cleanly on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection was closed in the middle of a header or payload.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    UnexpectedEof { expected: usize, received: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
