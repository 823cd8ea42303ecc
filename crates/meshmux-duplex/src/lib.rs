//! Two logical byte streams over one physical connection.
//!
//! A [`Duplex`] wraps any [`Conn`](meshmux_transport::Conn) and exposes a
//! client [`Endpoint`] and a server [`Endpoint`]. Writes on an endpoint are
//! framed under that endpoint's prefix; the demultiplex loop reads frames
//! and queues each payload on the local endpoint owning its prefix.
//!
//! Both peers must agree on which of them is the [`Side::Initiator`]:
//!
//! | side      | client prefix | server prefix |
//! |-----------|---------------|---------------|
//! | initiator | 0             | 1             |
//! | responder | 1             | 0             |
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use std::os::unix::net::UnixStream;
//!
//! use meshmux_duplex::{Duplex, Side};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (a, b) = UnixStream::pair()?;
//! let left = Duplex::new(a, Side::Initiator)?;
//! let right = Duplex::new(b, Side::Responder)?;
//!
//! let mut client = left.client();
//! let mut server = right.server();
//! let _left = left.spawn()?;
//! let _right = right.spawn()?;
//!
//! client.write_all(b"hello")?;
//! let mut buf = [0u8; 5];
//! server.read_exact(&mut buf)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod duplex;
mod endpoint;
mod error;
mod inbound;

pub use config::DuplexConfig;
pub use duplex::{Duplex, DuplexState, ServeHandle};
pub use endpoint::Endpoint;
pub use error::{CloseReason, DuplexError, Result};
pub use meshmux_frame::{FrameHeader, Role, Side, MAX_PAYLOAD};
