//! Routing rule records exchanged between meshmux nodes.
//!
//! A [`Rule`] is a fixed-layout, big-endian byte record. App rules deliver
//! a route to a local application port; forward rules hand it to another
//! transport.

pub mod error;
pub mod rule;

pub use error::{Result, RuleError};
pub use rule::{PublicKey, RouteId, Rule, RuleKind, APP_RULE_LEN, FORWARD_RULE_LEN};
