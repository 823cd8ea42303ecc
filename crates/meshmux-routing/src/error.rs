use crate::rule::RuleKind;

/// Errors returned when decoding a routing rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The record is shorter or longer than its kind requires.
    #[error("invalid rule length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The kind byte names no known rule type.
    #[error("unknown rule kind {0}")]
    UnknownKind(u8),

    /// A variant-specific operation was applied to the other variant.
    #[error("expected a {expected} rule, found a {actual} rule")]
    KindMismatch { expected: RuleKind, actual: RuleKind },

    /// A public key string was not 33 hex-encoded bytes.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

pub type Result<T> = std::result::Result<T, RuleError>;
