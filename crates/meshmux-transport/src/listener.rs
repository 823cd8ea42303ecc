use std::net::{TcpListener, TcpStream};

use tracing::{debug, info};

use crate::addr::TransportAddr;
use crate::error::{Result, TransportError};
use crate::traits::MeshStream;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Accepts physical connections on a TCP port or a Unix socket path.
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl Listener {
    /// Bind to `addr`.
    pub fn bind(addr: &TransportAddr) -> Result<Self> {
        match addr {
            TransportAddr::Tcp(host_port) => {
                let listener =
                    TcpListener::bind(host_port.as_str()).map_err(|e| TransportError::Bind {
                        addr: addr.to_string(),
                        source: e,
                    })?;
                info!(addr = %addr, "listening on tcp");
                Ok(Self::Tcp(listener))
            }
            #[cfg(unix)]
            TransportAddr::Unix(path) => Ok(Self::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            TransportAddr::Unix(_) => Err(TransportError::Bind {
                addr: addr.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
        }
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<MeshStream> {
        match self {
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                debug!(%peer, "accepted tcp connection");
                Ok(MeshStream::from(stream))
            }
            #[cfg(unix)]
            Self::Unix(socket) => socket.accept(),
        }
    }

    /// The address this listener is actually bound to.
    ///
    /// For TCP this resolves an ephemeral `:0` port to the real one.
    pub fn local_addr(&self) -> Result<TransportAddr> {
        match self {
            Self::Tcp(listener) => Ok(TransportAddr::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            Self::Unix(socket) => Ok(TransportAddr::Unix(socket.path().to_path_buf())),
        }
    }
}

/// Open a physical connection to `addr` (blocking).
pub fn connect(addr: &TransportAddr) -> Result<MeshStream> {
    match addr {
        TransportAddr::Tcp(host_port) => {
            let stream =
                TcpStream::connect(host_port.as_str()).map_err(|e| TransportError::Connect {
                    addr: addr.to_string(),
                    source: e,
                })?;
            debug!(addr = %addr, "connected over tcp");
            Ok(MeshStream::from(stream))
        }
        #[cfg(unix)]
        TransportAddr::Unix(path) => UnixDomainSocket::connect(path),
        #[cfg(not(unix))]
        TransportAddr::Unix(_) => Err(TransportError::Connect {
            addr: addr.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix domain sockets are not available on this platform",
            ),
        }),
    }
}
