//! Access-control resolution.
//!
//! This module decides, for a given actor, whether a named action is
//! permitted. Decisions combine, in strict precedence order: platform rules
//! (super_admin only), per-user overrides, tri-state stances from the
//! dynamic role surface, boolean tenant role rules, and a default. The
//! engine is read-only; all writes go through `store` and the matrix
//! editor.

mod actor;
mod engine;

pub use actor::Actor;
pub use engine::{AuthzEngine, Decision, DecisionLayer, PolicyResolver};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tri-state stance of a dynamic role on one permission.
///
/// `Unset` means "no opinion": resolution falls through to the next layer,
/// and the store represents it as row absence rather than a persisted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
    #[default]
    Unset,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
            Effect::Unset => "unset",
        }
    }

    /// Decode a stored stance. Only explicit stances are persisted, so
    /// anything unrecognized reads as Unset.
    pub fn from_db(value: &str) -> Effect {
        match value {
            "allow" => Effect::Allow,
            "deny" => Effect::Deny,
            _ => Effect::Unset,
        }
    }

    /// The editing surface cycles cells Unset -> Allow -> Deny -> Unset.
    pub fn cycled(&self) -> Effect {
        match self {
            Effect::Unset => Effect::Allow,
            Effect::Allow => Effect::Deny,
            Effect::Deny => Effect::Unset,
        }
    }
}
