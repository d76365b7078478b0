//! Claims and claim groups

use serde::{Deserialize, Serialize};

use crate::core::types::{ClaimGroupId, Coordinate, PolityId};

/// The designation of a claimed cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimKind {
    Plain,
    Commercial,
    Embassy,
    Farm,
    Outpost,
    Jail,
}

impl Default for ClaimKind {
    fn default() -> Self {
        ClaimKind::Plain
    }
}

/// A unit of owned territory at one coordinate.
///
/// Exactly one polity owns a claim, and at most one claim exists per
/// coordinate. The owning polity's claim set is authoritative; the territory
/// index carries a copy for lookups and both are mutated together under the
/// universe's operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub coord: Coordinate,
    pub owner: PolityId,
    pub kind: ClaimKind,
    pub group: Option<ClaimGroupId>,
}

impl Claim {
    pub fn new(coord: Coordinate, owner: PolityId, kind: ClaimKind) -> Self {
        Self {
            coord,
            owner,
            kind,
            group: None,
        }
    }

    /// A copy of this claim re-owned by another polity, kind and group intact
    pub fn reowned(&self, owner: PolityId) -> Self {
        Self { owner, ..*self }
    }
}

/// A named set of claims sharing configuration, e.g. a row of shop plots
/// offered at one price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimGroup {
    pub id: ClaimGroupId,
    pub name: String,
    pub price: f64,
}

impl ClaimGroup {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            id: ClaimGroupId::new(),
            name: name.into(),
            price,
        }
    }
}
