use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::BufMut;
use uuid::Uuid;

use crate::error::{Result, RuleError};

/// Identifier of a route on one node.
pub type RouteId = u32;

const EXPIRY_END: usize = 8;
const KIND_AT: usize = 8;
const ROUTE_ID_END: usize = 13;
const PUBLIC_KEY_LEN: usize = 33;

/// Encoded size of an app rule.
pub const APP_RULE_LEN: usize = ROUTE_ID_END + PUBLIC_KEY_LEN + 2 + 2;
/// Encoded size of a forward rule.
pub const FORWARD_RULE_LEN: usize = ROUTE_ID_END + 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Deliver to a local application port.
    App,
    /// Forward over another transport.
    Forward,
}

impl RuleKind {
    pub fn as_u8(self) -> u8 {
        match self {
            RuleKind::App => 0,
            RuleKind::Forward => 1,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(RuleKind::App),
            1 => Some(RuleKind::Forward),
            _ => None,
        }
    }

    /// Encoded record size for this kind.
    pub fn encoded_len(self) -> usize {
        match self {
            RuleKind::App => APP_RULE_LEN,
            RuleKind::Forward => FORWARD_RULE_LEN,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::App => f.write_str("app"),
            RuleKind::Forward => f.write_str("forward"),
        }
    }
}

/// Compressed secp256k1 public key of a remote node.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub const LEN: usize = PUBLIC_KEY_LEN;

    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        let mut out = [0u8; PUBLIC_KEY_LEN];
        hex::decode_to_slice(s, &mut out)
            .map_err(|err| RuleError::InvalidPublicKey(format!("{s}: {err}")))?;
        Ok(Self(out))
    }
}

/// A routing rule in its wire layout.
///
/// ```text
/// [0..8]   expiry, unix seconds (u64 BE)
/// [8]      kind: 0 = app, 1 = forward
/// [9..13]  route id (u32 BE)
/// app:     [13..46] remote public key
///          [46..48] remote port (u16 BE)
///          [48..50] local port (u16 BE)
/// forward: [13..29] transport id (UUID)
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    bytes: Vec<u8>,
}

impl Rule {
    /// Build a rule delivering `route_id` to `local_port`.
    pub fn app(
        expire_at: SystemTime,
        route_id: RouteId,
        remote_pk: PublicKey,
        remote_port: u16,
        local_port: u16,
    ) -> Self {
        let mut bytes = Vec::with_capacity(APP_RULE_LEN);
        put_header(&mut bytes, expire_at, RuleKind::App, route_id);
        bytes.put_slice(remote_pk.as_bytes());
        bytes.put_u16(remote_port);
        bytes.put_u16(local_port);
        Self { bytes }
    }

    /// Build a rule forwarding `route_id` over `transport_id`.
    pub fn forward(expire_at: SystemTime, route_id: RouteId, transport_id: Uuid) -> Self {
        let mut bytes = Vec::with_capacity(FORWARD_RULE_LEN);
        put_header(&mut bytes, expire_at, RuleKind::Forward, route_id);
        bytes.put_slice(transport_id.as_bytes());
        Self { bytes }
    }

    /// Expiry, truncated to whole seconds.
    pub fn expire_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.expiry_secs())
    }

    pub fn expiry_secs(&self) -> u64 {
        u64::from_be_bytes(self.array(0))
    }

    /// True once `now` is past the expiry.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now > self.expire_at()
    }

    pub fn kind(&self) -> RuleKind {
        // Constructors and `TryFrom` only admit known kinds.
        RuleKind::from_u8(self.bytes[KIND_AT]).unwrap_or(RuleKind::App)
    }

    pub fn route_id(&self) -> RouteId {
        u32::from_be_bytes(self.array(KIND_AT + 1))
    }

    pub fn set_route_id(&mut self, route_id: RouteId) {
        self.bytes[KIND_AT + 1..ROUTE_ID_END].copy_from_slice(&route_id.to_be_bytes());
    }

    pub fn remote_pk(&self) -> Option<PublicKey> {
        (self.kind() == RuleKind::App).then(|| PublicKey(self.array(ROUTE_ID_END)))
    }

    pub fn remote_port(&self) -> Option<u16> {
        (self.kind() == RuleKind::App)
            .then(|| u16::from_be_bytes(self.array(ROUTE_ID_END + PUBLIC_KEY_LEN)))
    }

    pub fn local_port(&self) -> Option<u16> {
        (self.kind() == RuleKind::App)
            .then(|| u16::from_be_bytes(self.array(ROUTE_ID_END + PUBLIC_KEY_LEN + 2)))
    }

    pub fn transport_id(&self) -> Option<Uuid> {
        (self.kind() == RuleKind::Forward).then(|| Uuid::from_bytes(self.array(ROUTE_ID_END)))
    }

    /// Point a forward rule at a different transport.
    pub fn set_transport_id(&mut self, transport_id: Uuid) -> Result<()> {
        let actual = self.kind();
        if actual != RuleKind::Forward {
            return Err(RuleError::KindMismatch {
                expected: RuleKind::Forward,
                actual,
            });
        }
        self.bytes[ROUTE_ID_END..FORWARD_RULE_LEN].copy_from_slice(transport_id.as_bytes());
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn array<const N: usize>(&self, at: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[at..at + N]);
        out
    }
}

fn put_header(buf: &mut Vec<u8>, expire_at: SystemTime, kind: RuleKind, route_id: RouteId) {
    // Pre-epoch expiries clamp to zero.
    let secs = expire_at
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_secs())
        .unwrap_or(0);
    buf.put_u64(secs);
    buf.put_u8(kind.as_u8());
    buf.put_u32(route_id);
}

impl TryFrom<&[u8]> for Rule {
    type Error = RuleError;

    fn try_from(raw: &[u8]) -> Result<Self> {
        if raw.len() < ROUTE_ID_END {
            return Err(RuleError::InvalidLength {
                expected: ROUTE_ID_END,
                actual: raw.len(),
            });
        }
        let kind = RuleKind::from_u8(raw[KIND_AT]).ok_or(RuleError::UnknownKind(raw[KIND_AT]))?;
        if raw.len() != kind.encoded_len() {
            return Err(RuleError::InvalidLength {
                expected: kind.encoded_len(),
                actual: raw.len(),
            });
        }
        Ok(Self {
            bytes: raw.to_vec(),
        })
    }
}

impl TryFrom<Vec<u8>> for Rule {
    type Error = RuleError;

    fn try_from(raw: Vec<u8>) -> Result<Self> {
        Rule::try_from(raw.as_slice())?;
        Ok(Self { bytes: raw })
    }
}

impl AsRef<[u8]> for Rule {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Rule");
        dbg.field("kind", &self.kind())
            .field("expiry_secs", &self.expiry_secs())
            .field("route_id", &self.route_id());
        match self.kind() {
            RuleKind::App => dbg
                .field("remote_pk", &self.remote_pk())
                .field("remote_port", &self.remote_port())
                .field("local_port", &self.local_port()),
            RuleKind::Forward => dbg.field("transport_id", &self.transport_id()),
        };
        dbg.finish()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rule {}", self.kind(), self.route_id())?;
        match self.kind() {
            RuleKind::App => {
                if let (Some(pk), Some(rport), Some(lport)) =
                    (self.remote_pk(), self.remote_port(), self.local_port())
                {
                    write!(f, " {pk}:{rport} -> :{lport}")?;
                }
            }
            RuleKind::Forward => {
                if let Some(tp) = self.transport_id() {
                    write!(f, " via {tp}")?;
                }
            }
        }
        write!(f, " (expires {})", self.expiry_secs())
    }
}
