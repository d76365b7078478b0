//! Federations - higher-order groupings of polities

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::error::{DemesneError, Result};
use crate::core::types::{FederationId, PolityId};

/// Outcome of removing a member polity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederationChange {
    Removed,
    /// The last member left. The caller decides whether to dissolve.
    Emptied,
}

/// A federation of polities with a designated capital and ally relations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Federation {
    pub id: FederationId,
    pub name: String,
    capital: PolityId,
    members: Vec<PolityId>,
    allies: HashSet<FederationId>,
}

impl Federation {
    /// Create a federation with its founding polity as capital
    pub fn new(id: FederationId, name: impl Into<String>, capital: PolityId) -> Self {
        Self {
            id,
            name: name.into(),
            capital,
            members: vec![capital],
            allies: HashSet::new(),
        }
    }

    pub fn capital(&self) -> PolityId {
        self.capital
    }

    pub fn is_capital(&self, polity: PolityId) -> bool {
        self.capital == polity
    }

    /// Promote a member to capital
    pub fn set_capital(&mut self, polity: PolityId) -> Result<()> {
        if !self.is_member(polity) {
            return Err(DemesneError::NotRegistered(format!(
                "polity is not a member of {}",
                self.name
            )));
        }
        self.capital = polity;
        Ok(())
    }

    pub fn is_member(&self, polity: PolityId) -> bool {
        self.members.contains(&polity)
    }

    pub fn members(&self) -> &[PolityId] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn add_member(&mut self, polity: PolityId) -> Result<()> {
        if self.is_member(polity) {
            return Err(DemesneError::AlreadyRegistered(format!(
                "already a member of {}",
                self.name
            )));
        }
        self.members.push(polity);
        Ok(())
    }

    /// Remove a member. The capital cannot leave while other members remain;
    /// a new capital must be designated first.
    pub(crate) fn remove_member(&mut self, polity: PolityId) -> Result<FederationChange> {
        if !self.is_member(polity) {
            return Err(DemesneError::NotRegistered(format!(
                "polity is not a member of {}",
                self.name
            )));
        }
        if self.capital == polity && self.members.len() > 1 {
            return Err(DemesneError::InvalidAction(format!(
                "designate a new capital for {} before removing the current one",
                self.name
            )));
        }

        self.members.retain(|&m| m != polity);
        if self.members.is_empty() {
            Ok(FederationChange::Emptied)
        } else {
            Ok(FederationChange::Removed)
        }
    }

    pub fn is_ally(&self, other: FederationId) -> bool {
        self.allies.contains(&other)
    }

    pub(crate) fn add_ally(&mut self, other: FederationId) {
        if other != self.id {
            self.allies.insert(other);
        }
    }

    pub(crate) fn remove_ally(&mut self, other: FederationId) -> bool {
        self.allies.remove(&other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_founder_is_capital_and_member() {
        let federation = Federation::new(FederationId(1), "Concord", PolityId(1));
        assert!(federation.is_capital(PolityId(1)));
        assert!(federation.is_member(PolityId(1)));
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let mut federation = Federation::new(FederationId(1), "Concord", PolityId(1));
        federation.add_member(PolityId(2)).unwrap();
        assert!(matches!(
            federation.add_member(PolityId(2)),
            Err(DemesneError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_capital_cannot_leave_with_members_remaining() {
        let mut federation = Federation::new(FederationId(1), "Concord", PolityId(1));
        federation.add_member(PolityId(2)).unwrap();

        assert!(matches!(
            federation.remove_member(PolityId(1)),
            Err(DemesneError::InvalidAction(_))
        ));

        federation.set_capital(PolityId(2)).unwrap();
        assert_eq!(federation.remove_member(PolityId(1)).unwrap(), FederationChange::Removed);
    }

    #[test]
    fn test_last_member_leaving_empties() {
        let mut federation = Federation::new(FederationId(1), "Concord", PolityId(1));
        assert_eq!(
            federation.remove_member(PolityId(1)).unwrap(),
            FederationChange::Emptied
        );
    }

    #[test]
    fn test_ally_set_ignores_self() {
        let mut federation = Federation::new(FederationId(1), "Concord", PolityId(1));
        federation.add_ally(FederationId(1));
        assert!(!federation.is_ally(FederationId(1)));

        federation.add_ally(FederationId(2));
        assert!(federation.is_ally(FederationId(2)));
        assert!(federation.remove_ally(FederationId(2)));
    }
}
