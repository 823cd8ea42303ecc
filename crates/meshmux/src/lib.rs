//! Duplex multiplexing of two logical byte streams over one connection.
//!
//! Two peers share a single TCP or Unix socket connection. Each peer exposes
//! a client stream and a server stream; frames carry a one-byte role prefix
//! so the receiving side can route every payload to the right stream.
//!
//! # Crate Structure
//!
//! - [`transport`]: physical connections (TCP, Unix sockets) and addresses
//! - [`frame`]: the 3-byte-header wire format and role/prefix mapping
//! - [`duplex`]: the multiplexer, its endpoints and the demultiplex loop
//! - [`routing`]: routing rule records carried between nodes

/// Re-export transport types.
pub mod transport {
    pub use meshmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use meshmux_frame::*;
}

/// Re-export duplex types.
pub mod duplex {
    pub use meshmux_duplex::*;
}

/// Re-export routing rule types.
pub mod routing {
    pub use meshmux_routing::*;
}

pub use meshmux_duplex::{Duplex, DuplexConfig, DuplexError, Endpoint, Role, Side};
