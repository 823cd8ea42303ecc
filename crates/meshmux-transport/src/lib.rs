//! Physical connection abstraction for meshmux.
//!
//! A multiplexer is bound to exactly one physical connection. This crate
//! provides the [`Conn`] trait it is generic over, plus a concrete
//! [`MeshStream`] and the plumbing to obtain one:
//! - TCP (any platform)
//! - Unix domain sockets (Linux/macOS)

pub mod addr;
pub mod error;
pub mod listener;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use addr::TransportAddr;
pub use error::{Result, TransportError};
pub use listener::{connect, Listener};
pub use traits::{Conn, MeshStream};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
