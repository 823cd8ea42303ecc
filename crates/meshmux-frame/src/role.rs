//! Role prefixes and the initiator/responder mapping.
//!
//! Every frame carries a one-byte role prefix. Both peers derive the
//! prefix-to-role mapping from which side they are, so no handshake is
//! needed:
//!
//! | side      | client | server |
//! |-----------|--------|--------|
//! | initiator | 0      | 1      |
//! | responder | 1      | 0      |
//!
//! An endpoint writes and receives under the same prefix, so the
//! initiator's client talks to the responder's server over prefix 0 and the
//! responder's client talks to the initiator's server over prefix 1.

use std::fmt;

/// Prefix owned by the initiator's client and the responder's server.
pub const PREFIX_0: u8 = 0;

/// Prefix owned by the initiator's server and the responder's client.
pub const PREFIX_1: u8 = 1;

/// Logical stream carried over a duplex connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Client, Role::Server];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of the physical connection this peer is.
///
/// Must be agreed out of band: exactly one peer of a connection is the
/// initiator. Two initiators (or two responders) route each other's client
/// traffic into the client endpoint instead of the server endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Initiator,
    Responder,
}

impl Side {
    /// Map the boolean form used by connection setup code.
    pub fn from_initiator(is_initiator: bool) -> Self {
        if is_initiator {
            Side::Initiator
        } else {
            Side::Responder
        }
    }

    pub fn is_initiator(self) -> bool {
        matches!(self, Side::Initiator)
    }

    /// The side the remote peer must have.
    pub fn peer(self) -> Self {
        match self {
            Side::Initiator => Side::Responder,
            Side::Responder => Side::Initiator,
        }
    }

    /// Prefix this side writes and receives under for `role`.
    pub fn prefix_for(self, role: Role) -> u8 {
        match (self, role) {
            (Side::Initiator, Role::Client) | (Side::Responder, Role::Server) => PREFIX_0,
            (Side::Initiator, Role::Server) | (Side::Responder, Role::Client) => PREFIX_1,
        }
    }

    /// Local role owning `prefix`, or `None` for a prefix outside {0, 1}.
    pub fn role_for(self, prefix: u8) -> Option<Role> {
        if !is_valid_prefix(prefix) {
            return None;
        }
        if self.prefix_for(Role::Client) == prefix {
            Some(Role::Client)
        } else {
            Some(Role::Server)
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Initiator => f.write_str("initiator"),
            Side::Responder => f.write_str("responder"),
        }
    }
}

/// Returns true if `prefix` is a legal role prefix on the wire.
pub fn is_valid_prefix(prefix: u8) -> bool {
    prefix == PREFIX_0 || prefix == PREFIX_1
}
