//! Siege sessions and their terminal outcomes

use serde::{Deserialize, Serialize};

use crate::core::error::{DemesneError, Result};
use crate::core::types::{FederationId, PolityId};

/// The state of a siege. `InProgress` is the only non-terminal state; every
/// transition out of it is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiegeStatus {
    InProgress,
    DefenderSurrender,
    AttackerWin,
    DefenderWin,
    Abandoned,
}

impl SiegeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SiegeStatus::InProgress)
    }
}

/// A conflict session over one besieged polity.
///
/// Holds the ordered list of active attacking federations and, once
/// terminal, the resolution outcome. At most one active session exists per
/// polity; the universe's siege registry enforces that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiegeSession {
    pub defender: PolityId,
    status: SiegeStatus,
    attackers: Vec<FederationId>,
    winner: Option<FederationId>,
}

impl SiegeSession {
    /// Open a session with its initial attackers
    pub fn open(defender: PolityId, attackers: Vec<FederationId>) -> Result<Self> {
        if attackers.is_empty() {
            return Err(DemesneError::InvalidAction(
                "a siege needs at least one attacker".into(),
            ));
        }
        Ok(Self {
            defender,
            status: SiegeStatus::InProgress,
            attackers,
            winner: None,
        })
    }

    pub fn status(&self) -> SiegeStatus {
        self.status
    }

    pub fn attackers(&self) -> &[FederationId] {
        &self.attackers
    }

    pub fn winner(&self) -> Option<FederationId> {
        self.winner
    }

    /// The single active attacker, required for an unambiguous surrender.
    /// Surrender with several simultaneous attackers has no defined winner
    /// and is rejected rather than tie-broken.
    pub fn sole_attacker(&self) -> Result<FederationId> {
        match self.attackers.as_slice() {
            [only] => Ok(*only),
            [] => Err(DemesneError::InvalidAction(
                "the siege has no active attackers".into(),
            )),
            _ => Err(DemesneError::AmbiguousOutcome(format!(
                "cannot surrender while {} attackers besiege the polity",
                self.attackers.len()
            ))),
        }
    }

    pub fn add_attacker(&mut self, federation: FederationId) -> Result<()> {
        self.ensure_in_progress()?;
        if self.attackers.contains(&federation) {
            return Err(DemesneError::AlreadyRegistered(
                "federation is already besieging this polity".into(),
            ));
        }
        self.attackers.push(federation);
        Ok(())
    }

    /// Withdraw an attacker. The last attacker leaving abandons the siege.
    pub fn remove_attacker(&mut self, federation: FederationId) -> Result<SiegeStatus> {
        self.ensure_in_progress()?;
        if !self.attackers.contains(&federation) {
            return Err(DemesneError::NotRegistered(
                "federation is not besieging this polity".into(),
            ));
        }
        self.attackers.retain(|&f| f != federation);
        if self.attackers.is_empty() {
            self.status = SiegeStatus::Abandoned;
        }
        Ok(self.status)
    }

    /// Move the session into a terminal state
    pub(crate) fn complete(
        &mut self,
        status: SiegeStatus,
        winner: Option<FederationId>,
    ) -> Result<()> {
        self.ensure_in_progress()?;
        if !status.is_terminal() {
            return Err(DemesneError::InvalidAction(
                "siege completion requires a terminal status".into(),
            ));
        }
        self.status = status;
        self.winner = winner;
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<()> {
        if self.status != SiegeStatus::InProgress {
            return Err(DemesneError::InvalidAction(
                "the siege is no longer in progress".into(),
            ));
        }
        Ok(())
    }
}
