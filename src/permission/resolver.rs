//! Permission rule evaluation
//!
//! Converts an (actor standing, claim, action) triple into an allow/deny
//! decision. The universe gathers the inputs (claim lookup, membership,
//! alliance) and the functions here stay pure so rules are testable without
//! shared state.

use serde::{Deserialize, Serialize};

use crate::core::config::WildernessAccess;
use crate::core::types::ActionKind;
use crate::territory::claim::Claim;

/// The relationship between an acting player and the polity owning a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    /// Member of the owning polity
    Member,
    /// Member of an allied polity (same federation, or mutually allied
    /// federations)
    Ally,
    /// Everyone else
    Outsider,
}

/// Which standings an action is open to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessMatrix {
    pub member: bool,
    pub ally: bool,
    pub outsider: bool,
}

impl AccessMatrix {
    pub const fn members_only() -> Self {
        Self {
            member: true,
            ally: false,
            outsider: false,
        }
    }

    pub fn permits(&self, standing: Standing) -> bool {
        match standing {
            Standing::Member => self.member,
            Standing::Ally => self.ally,
            Standing::Outsider => self.outsider,
        }
    }
}

impl Default for AccessMatrix {
    fn default() -> Self {
        Self::members_only()
    }
}

/// A polity's permission rules, one access matrix per action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolityPermissions {
    pub build: AccessMatrix,
    pub destroy: AccessMatrix,
    pub switch: AccessMatrix,
    pub item_use: AccessMatrix,
}

impl PolityPermissions {
    pub fn matrix(&self, action: ActionKind) -> &AccessMatrix {
        match action {
            ActionKind::Build => &self.build,
            ActionKind::Destroy => &self.destroy,
            ActionKind::Switch => &self.switch,
            ActionKind::ItemUse => &self.item_use,
        }
    }
}

/// A resolved permission decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn deny_reason(&self) -> Option<&str> {
        match self {
            Decision::Allow => None,
            Decision::Deny { reason } => Some(reason),
        }
    }
}

/// Decide an action on claimed territory
pub fn decide_claimed(
    claim: &Claim,
    owner_name: &str,
    permissions: &PolityPermissions,
    standing: Standing,
    action: ActionKind,
) -> Decision {
    if permissions.matrix(action).permits(standing) {
        Decision::Allow
    } else {
        Decision::Deny {
            reason: format!(
                "You are not permitted to {} in {} at {}",
                action.label(),
                owner_name,
                claim.coord
            ),
        }
    }
}

/// Decide an action on unclaimed territory
pub fn decide_wilderness(wilderness: &WildernessAccess, action: ActionKind) -> Decision {
    let allowed = match action {
        ActionKind::Build => wilderness.build,
        ActionKind::Destroy => wilderness.destroy,
        ActionKind::Switch => wilderness.switch,
        ActionKind::ItemUse => wilderness.item_use,
    };
    if allowed {
        Decision::Allow
    } else {
        Decision::Deny {
            reason: format!("You are not permitted to {} in the wilderness", action.label()),
        }
    }
}
