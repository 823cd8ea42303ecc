use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

const TCP_SCHEME: &str = "tcp://";
const UNIX_SCHEME: &str = "unix://";

/// Where a physical connection lives.
///
/// Parsed from `tcp://host:port` or `unix:///path/to.sock`. A bare
/// `host:port` is accepted as TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAddr {
    Tcp(String),
    Unix(PathBuf),
}

impl FromStr for TransportAddr {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if let Some(path) = input.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(TransportError::InvalidAddress(input.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        let host_port = input.strip_prefix(TCP_SCHEME).unwrap_or(input);
        match host_port.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Self::Tcp(host_port.to_string()))
            }
            _ => Err(TransportError::InvalidAddress(input.to_string())),
        }
    }
}

impl fmt::Display for TransportAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(host_port) => write!(f, "{TCP_SCHEME}{host_port}"),
            Self::Unix(path) => write!(f, "{UNIX_SCHEME}{}", path.display()),
        }
    }
}
