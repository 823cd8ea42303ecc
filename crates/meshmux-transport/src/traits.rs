use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A physical connection that can be shared by a multiplexer.
///
/// The multiplexer needs three handles on the same socket: one for the
/// demultiplex loop, one for the serialized writer and one to shut the
/// socket down from any thread. `try_clone` must therefore return a handle
/// to the *same* underlying connection, as `TcpStream::try_clone` does.
pub trait Conn: Read + Write + Send + Sized + 'static {
    /// Create another handle to the same underlying connection.
    fn try_clone(&self) -> std::io::Result<Self>;

    /// Shut the connection down in both directions.
    ///
    /// Blocked reads and writes on every handle must return promptly.
    fn shutdown(&self) -> std::io::Result<()>;

    /// Set read timeout on the underlying connection, if supported.
    fn set_read_timeout(&self, _timeout: Option<Duration>) -> std::io::Result<()> {
        Ok(())
    }

    /// Set write timeout on the underlying connection, if supported.
    fn set_write_timeout(&self, _timeout: Option<Duration>) -> std::io::Result<()> {
        Ok(())
    }
}

impl Conn for TcpStream {
    fn try_clone(&self) -> std::io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self) -> std::io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }
}

#[cfg(unix)]
impl Conn for std::os::unix::net::UnixStream {
    fn try_clone(&self) -> std::io::Result<Self> {
        std::os::unix::net::UnixStream::try_clone(self)
    }

    fn shutdown(&self) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, Shutdown::Both)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)
    }
}

/// A connected mesh stream over TCP or a Unix socket.
///
/// This is the concrete connection type returned by [`crate::Listener`] and
/// [`crate::connect`]. It wraps either a TCP stream or a Unix domain socket.
pub struct MeshStream {
    inner: MeshStreamInner,
}

enum MeshStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for MeshStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            MeshStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            MeshStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for MeshStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            MeshStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            MeshStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            MeshStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            MeshStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl Conn for MeshStream {
    fn try_clone(&self) -> std::io::Result<Self> {
        let inner = match &self.inner {
            MeshStreamInner::Tcp(stream) => MeshStreamInner::Tcp(stream.try_clone()?),
            #[cfg(unix)]
            MeshStreamInner::Unix(stream) => MeshStreamInner::Unix(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    fn shutdown(&self) -> std::io::Result<()> {
        match &self.inner {
            MeshStreamInner::Tcp(stream) => Conn::shutdown(stream),
            #[cfg(unix)]
            MeshStreamInner::Unix(stream) => Conn::shutdown(stream),
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        match &self.inner {
            MeshStreamInner::Tcp(stream) => stream.set_read_timeout(timeout),
            #[cfg(unix)]
            MeshStreamInner::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        match &self.inner {
            MeshStreamInner::Tcp(stream) => stream.set_write_timeout(timeout),
            #[cfg(unix)]
            MeshStreamInner::Unix(stream) => stream.set_write_timeout(timeout),
        }
    }
}

impl MeshStream {
    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            MeshStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            MeshStreamInner::Unix(_) => "unix-domain-socket",
        }
    }

    /// Human-readable remote address, used in log fields.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            MeshStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:<unknown>".to_string()),
            #[cfg(unix)]
            MeshStreamInner::Unix(stream) => stream
                .peer_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|p| p.display().to_string()))
                .unwrap_or_else(|| "unix:<unnamed>".to_string()),
        }
    }

    /// Disable Nagle's algorithm on TCP streams. No-op for Unix sockets.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        match &self.inner {
            MeshStreamInner::Tcp(stream) => stream.set_nodelay(nodelay).map_err(Into::into),
            #[cfg(unix)]
            MeshStreamInner::Unix(_) => Ok(()),
        }
    }
}

impl From<TcpStream> for MeshStream {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: MeshStreamInner::Tcp(stream),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for MeshStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: MeshStreamInner::Unix(stream),
        }
    }
}

impl std::fmt::Debug for MeshStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
