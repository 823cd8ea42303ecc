use std::fmt;
use std::io;

use meshmux_duplex::{CloseReason, DuplexError};
use meshmux_frame::FrameError;
use meshmux_routing::RuleError;
use meshmux_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PROTOCOL_ERROR: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidAddress(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed | FrameError::UnexpectedEof { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn duplex_error(context: &str, err: DuplexError) -> CliError {
    match err {
        DuplexError::Transport(err) => transport_error(context, err),
        DuplexError::Frame(err) => frame_error(context, err),
        DuplexError::Desync { .. } => CliError::new(PROTOCOL_ERROR, format!("{context}: {err}")),
        DuplexError::Closed(CloseReason::Desync { .. }) => {
            CliError::new(PROTOCOL_ERROR, format!("{context}: {err}"))
        }
        DuplexError::Closed(CloseReason::Io { kind, .. })
            if matches!(kind, io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
        {
            // Socket read timeouts surface as WouldBlock on Unix.
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        DuplexError::Closed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn rule_error(context: &str, err: RuleError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desync_maps_to_protocol_error() {
        let err = duplex_error("receive failed", DuplexError::Desync { prefix: 5 });
        assert_eq!(err.code, PROTOCOL_ERROR);
        assert!(err.message.starts_with("receive failed: "));
    }

    #[test]
    fn oversized_payload_maps_to_data_invalid() {
        let err = duplex_error(
            "send failed",
            DuplexError::Frame(FrameError::PayloadTooLarge {
                size: 70_000,
                max: 65_535,
            }),
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn refused_connection_is_plain_failure() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                addr: "tcp://127.0.0.1:1".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn socket_timeout_maps_to_timeout() {
        let err = duplex_error(
            "receive failed",
            DuplexError::Closed(CloseReason::Io {
                kind: io::ErrorKind::TimedOut,
                message: "timed out".to_string(),
            }),
        );
        assert_eq!(err.code, TIMEOUT);
    }
}
