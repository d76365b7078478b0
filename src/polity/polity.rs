//! Polity - the aggregate owning territory, members and policy

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::config::RealmConfig;
use crate::core::error::{DemesneError, Result};
use crate::core::types::{ActorId, ClaimGroupId, Coordinate, FederationId, Location, PolityId, WorldId};
use crate::permission::resolver::PolityPermissions;
use crate::territory::claim::{Claim, ClaimGroup, ClaimKind};

/// Outcome of removing a member from the roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    /// Member removed; carries the leader after any succession
    Removed { leader: Option<ActorId> },
    /// The last member left. The caller decides whether to dissolve.
    Emptied,
}

/// Effects of a successful home change that the caller must apply to
/// world-level structures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeChange {
    /// Set when the home moved to a different world: (old, new)
    pub world_changed: Option<(Option<WorldId>, WorldId)>,
    /// The stored spawn fell outside the new home and was cleared
    pub spawn_cleared: bool,
}

/// An aggregate of territory, members and policy.
///
/// All mutation goes through the owning `Universe`, which serializes access
/// per polity; the methods here enforce the aggregate's own invariants:
/// exactly one home while claims exist, leader always a member, spawn inside
/// the home claim, numeric parameters clamped on every set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polity {
    pub id: PolityId,
    pub name: String,
    world: Option<WorldId>,
    #[serde(skip)]
    claims: AHashMap<Coordinate, Claim>,
    home: Option<Coordinate>,
    spawn: Option<Location>,
    outpost_spawns: Vec<Location>,
    jail_spawns: Vec<Location>,
    members: Vec<ActorId>,
    leader: Option<ActorId>,
    federation: Option<FederationId>,
    groups: AHashMap<ClaimGroupId, ClaimGroup>,
    permissions: PolityPermissions,
    plot_price: f64,
    commercial_plot_price: f64,
    embassy_plot_price: f64,
    plot_tax: f64,
    commercial_plot_tax: f64,
    embassy_plot_tax: f64,
    tax: f64,
    tax_percentage: bool,
    bonus_claims: u32,
    purchased_claims: u32,
    conquered: bool,
}

impl Polity {
    /// Create a polity with its founder as sole member and leader
    pub fn new(id: PolityId, name: impl Into<String>, founder: ActorId) -> Self {
        Self {
            id,
            name: name.into(),
            world: None,
            claims: AHashMap::new(),
            home: None,
            spawn: None,
            outpost_spawns: Vec::new(),
            jail_spawns: Vec::new(),
            members: vec![founder],
            leader: Some(founder),
            federation: None,
            groups: AHashMap::new(),
            permissions: PolityPermissions::default(),
            plot_price: 0.0,
            commercial_plot_price: 0.0,
            embassy_plot_price: 0.0,
            plot_tax: 0.0,
            commercial_plot_tax: 0.0,
            embassy_plot_tax: 0.0,
            tax: 0.0,
            tax_percentage: false,
            bonus_claims: 0,
            purchased_claims: 0,
            conquered: false,
        }
    }

    // === Claims ===

    pub fn has_claim(&self, coord: &Coordinate) -> bool {
        self.claims.contains_key(coord)
    }

    pub fn claim(&self, coord: &Coordinate) -> Option<&Claim> {
        self.claims.get(coord)
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    pub fn claim_coords(&self) -> impl Iterator<Item = &Coordinate> {
        self.claims.keys()
    }

    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    /// Add a claim to the aggregate. Returns true when this claim became the
    /// home (first claim of a homeless polity).
    ///
    /// The universe has already won the territory-index insert; a duplicate
    /// here would mean the index and the aggregate diverged.
    pub(crate) fn add_claim(&mut self, claim: Claim) -> bool {
        debug_assert_eq!(claim.owner, self.id);
        let coord = claim.coord;
        self.claims.insert(coord, claim);
        if self.home.is_none() {
            self.home = Some(coord);
            self.world = Some(coord.world);
            return true;
        }
        false
    }

    /// Remove a claim, cleaning up everything it backed: outpost and jail
    /// spawns at its coordinate, and the home designation (with its spawn)
    /// when the home claim itself goes away.
    pub(crate) fn remove_claim(&mut self, coord: &Coordinate, cell_size: i32) -> Option<Claim> {
        let claim = self.claims.remove(coord)?;

        if claim.kind == ClaimKind::Outpost {
            self.remove_outpost_spawn(coord, cell_size);
        }
        if claim.kind == ClaimKind::Jail {
            self.remove_jail_spawn(coord, cell_size);
        }

        if self.home == Some(*coord) {
            self.home = None;
            self.spawn = None;
        }

        Some(claim)
    }

    /// Change the kind of an owned claim. A spawn backed by the old kind
    /// does not survive the change.
    pub(crate) fn set_claim_kind(
        &mut self,
        coord: &Coordinate,
        kind: ClaimKind,
        cell_size: i32,
    ) -> Option<Claim> {
        let claim = self.claims.get_mut(coord)?;
        let old_kind = claim.kind;
        claim.kind = kind;
        let updated = *claim;

        if old_kind == ClaimKind::Outpost && kind != ClaimKind::Outpost {
            self.remove_outpost_spawn(coord, cell_size);
        }
        if old_kind == ClaimKind::Jail && kind != ClaimKind::Jail {
            self.remove_jail_spawn(coord, cell_size);
        }
        Some(updated)
    }

    /// Strip the aggregate of every claim and claim group, clearing the
    /// home, spawns and world binding. Used when territory leaves wholesale
    /// (conquest, dissolution).
    pub(crate) fn take_all_claims(&mut self) -> (Vec<Claim>, Vec<ClaimGroup>) {
        let claims: Vec<Claim> = self.claims.drain().map(|(_, c)| c).collect();
        let groups: Vec<ClaimGroup> = self.groups.drain().map(|(_, g)| g).collect();
        self.home = None;
        self.spawn = None;
        self.outpost_spawns.clear();
        self.jail_spawns.clear();
        self.world = None;
        (claims, groups)
    }

    /// Absorb claims and groups stripped from another polity. Each claim is
    /// re-owned; the first one received by a homeless polity becomes home.
    pub(crate) fn receive_claims(&mut self, claims: Vec<Claim>, groups: Vec<ClaimGroup>) {
        for group in groups {
            self.groups.insert(group.id, group);
        }
        for claim in claims {
            self.add_claim(claim.reowned(self.id));
        }
    }

    // === Home and spawns ===

    pub fn home(&self) -> Option<Coordinate> {
        self.home
    }

    pub fn world(&self) -> Option<WorldId> {
        self.world
    }

    /// Designate an owned claim as the home.
    ///
    /// The stored spawn is re-validated against the new home and cleared
    /// silently when it no longer fits. A cross-world move is reported back
    /// so the caller can rebind the polity in the territory index and apply
    /// the federation proximity rule.
    pub fn set_home(&mut self, coord: Coordinate, cell_size: i32) -> Result<HomeChange> {
        if !self.has_claim(&coord) {
            return Err(DemesneError::NotOwned(coord));
        }

        self.home = Some(coord);

        let spawn_cleared = match self.spawn {
            Some(spawn) if spawn.coordinate(cell_size) != coord => {
                self.spawn = None;
                true
            }
            _ => false,
        };

        let world_changed = if self.world != Some(coord.world) {
            let old = self.world;
            self.world = Some(coord.world);
            Some((old, coord.world))
        } else {
            None
        };

        Ok(HomeChange {
            world_changed,
            spawn_cleared,
        })
    }

    /// The home spawn, valid only while a home claim exists
    pub fn spawn(&self) -> Option<Location> {
        self.home.and(self.spawn)
    }

    /// Set the home spawn. The location must fall inside the home claim's
    /// coordinate; on failure the stored spawn is left untouched.
    pub fn set_spawn(&mut self, location: Location, cell_size: i32) -> Result<()> {
        let home = self
            .home
            .ok_or_else(|| DemesneError::InvalidAction("no home claim set".into()))?;
        if location.coordinate(cell_size) != home {
            return Err(DemesneError::InvalidLocation(format!(
                "spawn at {:?} is outside the home claim {}",
                (location.x, location.z),
                home
            )));
        }
        self.spawn = Some(location);
        Ok(())
    }

    /// Add an outpost spawn backed by the given claim, replacing any
    /// existing spawn at the same coordinate
    pub fn add_outpost_spawn(
        &mut self,
        location: Location,
        backing: &Claim,
        cell_size: i32,
    ) -> Result<()> {
        if backing.owner != self.id {
            return Err(DemesneError::NotOwned(backing.coord));
        }
        if backing.kind != ClaimKind::Outpost {
            return Err(DemesneError::InvalidLocation(format!(
                "claim at {} is not an outpost",
                backing.coord
            )));
        }
        self.remove_outpost_spawn(&location.coordinate(cell_size), cell_size);
        self.outpost_spawns.push(location);
        Ok(())
    }

    pub fn remove_outpost_spawn(&mut self, coord: &Coordinate, cell_size: i32) {
        self.outpost_spawns
            .retain(|spawn| spawn.coordinate(cell_size) != *coord);
    }

    pub fn outpost_spawns(&self) -> &[Location] {
        &self.outpost_spawns
    }

    /// Add a jail spawn backed by the given claim, replacing any existing
    /// spawn at the same coordinate
    pub fn add_jail_spawn(
        &mut self,
        location: Location,
        backing: &Claim,
        cell_size: i32,
    ) -> Result<()> {
        if backing.owner != self.id {
            return Err(DemesneError::NotOwned(backing.coord));
        }
        if backing.kind != ClaimKind::Jail {
            return Err(DemesneError::InvalidLocation(format!(
                "claim at {} is not a jail",
                backing.coord
            )));
        }
        self.remove_jail_spawn(&location.coordinate(cell_size), cell_size);
        self.jail_spawns.push(location);
        Ok(())
    }

    pub fn remove_jail_spawn(&mut self, coord: &Coordinate, cell_size: i32) {
        self.jail_spawns
            .retain(|spawn| spawn.coordinate(cell_size) != *coord);
    }

    pub fn jail_spawns(&self) -> &[Location] {
        &self.jail_spawns
    }

    // === Roster ===

    pub fn is_member(&self, actor: ActorId) -> bool {
        self.members.contains(&actor)
    }

    pub fn members(&self) -> &[ActorId] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn leader(&self) -> Option<ActorId> {
        self.leader
    }

    pub fn is_leader(&self, actor: ActorId) -> bool {
        self.leader == Some(actor)
    }

    /// Append an actor to the roster
    pub(crate) fn add_to_roster(&mut self, actor: ActorId) -> Result<()> {
        if self.is_member(actor) {
            return Err(DemesneError::AlreadyRegistered(format!(
                "already a member of {}",
                self.name
            )));
        }
        self.members.push(actor);
        Ok(())
    }

    /// Remove an actor from the roster. Succession has already run if the
    /// actor was leader; a leader slot still pointing at the leaver is
    /// cleared here so it can never dangle.
    pub(crate) fn remove_from_roster(&mut self, actor: ActorId) -> Result<RosterChange> {
        let position = self
            .members
            .iter()
            .position(|&m| m == actor)
            .ok_or_else(|| DemesneError::NotRegistered(format!("not a member of {}", self.name)))?;

        self.members.remove(position);
        if self.leader == Some(actor) {
            self.leader = None;
        }

        if self.members.is_empty() {
            self.leader = None;
            Ok(RosterChange::Emptied)
        } else {
            Ok(RosterChange::Removed { leader: self.leader })
        }
    }

    /// Install a member as leader
    pub fn set_leader(&mut self, actor: ActorId) -> Result<()> {
        if !self.is_member(actor) {
            return Err(DemesneError::NotRegistered(format!(
                "leader must be a member of {}",
                self.name
            )));
        }
        self.leader = Some(actor);
        Ok(())
    }

    pub(crate) fn clear_leader(&mut self) {
        self.leader = None;
    }

    // === Federation link ===

    pub fn federation(&self) -> Option<FederationId> {
        self.federation
    }

    pub(crate) fn set_federation(&mut self, federation: Option<FederationId>) {
        self.federation = federation;
    }

    pub fn is_conquered(&self) -> bool {
        self.conquered
    }

    pub(crate) fn set_conquered(&mut self, conquered: bool) {
        self.conquered = conquered;
    }

    // === Permissions ===

    pub fn permissions(&self) -> &PolityPermissions {
        &self.permissions
    }

    pub(crate) fn set_permissions(&mut self, permissions: PolityPermissions) {
        self.permissions = permissions;
    }

    // === Claim groups ===

    pub fn add_group(&mut self, group: ClaimGroup) -> ClaimGroupId {
        let id = group.id;
        self.groups.insert(id, group);
        id
    }

    pub fn group(&self, id: ClaimGroupId) -> Option<&ClaimGroup> {
        self.groups.get(&id)
    }

    pub fn group_by_name(&self, name: &str) -> Option<&ClaimGroup> {
        self.groups.values().find(|g| g.name == name)
    }

    pub fn rename_group(&mut self, id: ClaimGroupId, name: impl Into<String>) -> Result<()> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or_else(|| DemesneError::NotRegistered("no such claim group".into()))?;
        group.name = name.into();
        Ok(())
    }

    /// Attach an owned claim to a group
    pub(crate) fn assign_claim_to_group(
        &mut self,
        coord: &Coordinate,
        group: ClaimGroupId,
    ) -> Result<Claim> {
        if !self.groups.contains_key(&group) {
            return Err(DemesneError::NotRegistered("no such claim group".into()));
        }
        let claim = self
            .claims
            .get_mut(coord)
            .ok_or(DemesneError::NotOwned(*coord))?;
        claim.group = Some(group);
        Ok(*claim)
    }

    /// Remove a group, detaching its claims. Returns the detached
    /// coordinates so the caller can update index copies.
    pub(crate) fn remove_group(&mut self, id: ClaimGroupId) -> Vec<Coordinate> {
        if self.groups.remove(&id).is_none() {
            return Vec::new();
        }
        let mut detached = Vec::new();
        for claim in self.claims.values_mut() {
            if claim.group == Some(id) {
                claim.group = None;
                detached.push(claim.coord);
            }
        }
        detached
    }

    pub fn claims_in_group(&self, id: ClaimGroupId) -> Vec<Coordinate> {
        self.claims
            .values()
            .filter(|c| c.group == Some(id))
            .map(|c| c.coord)
            .collect()
    }

    // === Claim economics ===

    /// Cost of claiming `n` additional coordinates: the sum of n successive
    /// geometric terms, each rounded before summation, starting one past the
    /// current claim count
    pub fn claim_cost(&self, n: i32, config: &RealmConfig) -> Result<f64> {
        if n < 0 {
            return Err(DemesneError::InvalidAction(
                "claim count must be non-negative".into(),
            ));
        }
        let current = self.claims.len() as i32;
        let mut cost = 0.0;
        for i in 1..=n {
            cost += (config.claim_base_price * config.claim_price_growth.powi(current + i)).round();
        }
        Ok(cost)
    }

    /// Cost of purchasing `n` additional bonus claims. Requests beyond the
    /// configured ceiling are costed as if only the remaining headroom were
    /// requested.
    pub fn bonus_claim_cost(&self, n: i32, config: &RealmConfig) -> Result<f64> {
        if n < 0 {
            return Err(DemesneError::InvalidAction(
                "claim count must be non-negative".into(),
            ));
        }
        let headroom = config.max_purchased_claims.saturating_sub(self.purchased_claims);
        let n = (n as u32).min(headroom) as i32;
        let current = self.purchased_claims as i32;
        let mut cost = 0.0;
        for i in 1..=n {
            cost += (config.bonus_base_price * config.bonus_price_growth.powi(current + i)).round();
        }
        Ok(cost)
    }

    pub fn bonus_claims(&self) -> u32 {
        self.bonus_claims
    }

    pub fn set_bonus_claims(&mut self, count: u32, config: &RealmConfig) {
        self.bonus_claims = count.min(config.max_bonus_claims);
    }

    pub fn add_bonus_claims(&mut self, count: u32, config: &RealmConfig) {
        self.set_bonus_claims(self.bonus_claims.saturating_add(count), config);
    }

    pub fn purchased_claims(&self) -> u32 {
        self.purchased_claims
    }

    pub fn set_purchased_claims(&mut self, count: u32, config: &RealmConfig) {
        self.purchased_claims = count.min(config.max_purchased_claims);
    }

    pub fn add_purchased_claims(&mut self, count: u32, config: &RealmConfig) {
        self.set_purchased_claims(self.purchased_claims.saturating_add(count), config);
    }

    // === Prices and taxes ===

    /// The asking price for a plot of the given kind; never negative
    pub fn plot_price(&self, kind: ClaimKind) -> f64 {
        let price = match kind {
            ClaimKind::Commercial => self.commercial_plot_price,
            ClaimKind::Embassy => self.embassy_plot_price,
            _ => self.plot_price,
        };
        price.max(0.0)
    }

    pub fn set_plot_price(&mut self, price: f64, config: &RealmConfig) {
        self.plot_price = price.min(config.max_plot_price);
    }

    pub fn set_commercial_plot_price(&mut self, price: f64, config: &RealmConfig) {
        self.commercial_plot_price = price.min(config.max_plot_price);
    }

    pub fn set_embassy_plot_price(&mut self, price: f64, config: &RealmConfig) {
        self.embassy_plot_price = price.min(config.max_plot_price);
    }

    pub fn plot_tax(&self, kind: ClaimKind) -> f64 {
        match kind {
            ClaimKind::Commercial => self.commercial_plot_tax,
            ClaimKind::Embassy => self.embassy_plot_tax,
            _ => self.plot_tax,
        }
    }

    pub fn set_plot_tax(&mut self, tax: f64, config: &RealmConfig) {
        self.plot_tax = tax.min(config.max_plot_tax);
    }

    pub fn set_commercial_plot_tax(&mut self, tax: f64, config: &RealmConfig) {
        self.commercial_plot_tax = tax.min(config.max_plot_tax);
    }

    pub fn set_embassy_plot_tax(&mut self, tax: f64, config: &RealmConfig) {
        self.embassy_plot_tax = tax.min(config.max_plot_tax);
    }

    pub fn tax(&self) -> f64 {
        self.tax
    }

    pub fn is_tax_percentage(&self) -> bool {
        self.tax_percentage
    }

    /// Set the polity tax, clamped to the ceiling for the current mode
    pub fn set_tax(&mut self, tax: f64, config: &RealmConfig) {
        self.tax = if self.tax_percentage {
            tax.min(config.max_tax_percent)
        } else {
            tax.min(config.max_tax_flat)
        };
    }

    /// Switch between percentage and flat taxation. A current value the new
    /// mode's ceiling cannot carry resets to zero instead of rejecting the
    /// switch.
    pub fn set_tax_percentage(&mut self, percentage: bool, config: &RealmConfig) {
        self.tax_percentage = percentage;
        let ceiling = if percentage {
            config.max_tax_percent
        } else {
            config.max_tax_flat
        };
        if self.tax > ceiling {
            self.tax = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::WorldId;

    fn coord(x: i32, z: i32) -> Coordinate {
        Coordinate::new(WorldId(0), x, z)
    }

    fn polity_with_claims(coords: &[Coordinate]) -> Polity {
        let mut polity = Polity::new(PolityId(1), "Freehold", ActorId::new());
        for &c in coords {
            polity.add_claim(Claim::new(c, PolityId(1), ClaimKind::Plain));
        }
        polity
    }

    #[test]
    fn test_first_claim_becomes_home() {
        let mut polity = Polity::new(PolityId(1), "Freehold", ActorId::new());
        assert!(polity.add_claim(Claim::new(coord(0, 0), PolityId(1), ClaimKind::Plain)));
        assert_eq!(polity.home(), Some(coord(0, 0)));
        assert_eq!(polity.world(), Some(WorldId(0)));

        // Later claims leave the home alone.
        assert!(!polity.add_claim(Claim::new(coord(0, 1), PolityId(1), ClaimKind::Plain)));
        assert_eq!(polity.home(), Some(coord(0, 0)));
    }

    #[test]
    fn test_removing_home_clears_home_and_spawn() {
        let mut polity = polity_with_claims(&[coord(0, 0), coord(0, 1)]);
        polity
            .set_spawn(Location::new(WorldId(0), 8.0, 64.0, 8.0), 16)
            .unwrap();

        polity.remove_claim(&coord(0, 0), 16);
        assert_eq!(polity.home(), None);
        assert_eq!(polity.spawn(), None);
        assert_eq!(polity.claim_count(), 1);
    }

    #[test]
    fn test_set_home_requires_ownership() {
        let mut polity = polity_with_claims(&[coord(0, 0)]);
        let err = polity.set_home(coord(9, 9), 16).unwrap_err();
        assert!(matches!(err, DemesneError::NotOwned(_)));
        assert_eq!(polity.home(), Some(coord(0, 0)));
    }

    #[test]
    fn test_set_home_clears_outlying_spawn_silently() {
        let mut polity = polity_with_claims(&[coord(0, 0), coord(5, 5)]);
        polity
            .set_spawn(Location::new(WorldId(0), 8.0, 64.0, 8.0), 16)
            .unwrap();

        let change = polity.set_home(coord(5, 5), 16).unwrap();
        assert!(change.spawn_cleared);
        assert_eq!(polity.spawn(), None);
    }

    #[test]
    fn test_set_home_reports_world_change() {
        let mut polity = polity_with_claims(&[coord(0, 0)]);
        polity.add_claim(Claim::new(
            Coordinate::new(WorldId(1), 4, 4),
            PolityId(1),
            ClaimKind::Plain,
        ));

        let change = polity.set_home(Coordinate::new(WorldId(1), 4, 4), 16).unwrap();
        assert_eq!(change.world_changed, Some((Some(WorldId(0)), WorldId(1))));
        assert_eq!(polity.world(), Some(WorldId(1)));
    }

    #[test]
    fn test_spawn_outside_home_rejected_without_mutation() {
        let mut polity = polity_with_claims(&[coord(0, 0)]);
        polity
            .set_spawn(Location::new(WorldId(0), 8.0, 64.0, 8.0), 16)
            .unwrap();
        let before = polity.spawn();

        let err = polity
            .set_spawn(Location::new(WorldId(0), 100.0, 64.0, 8.0), 16)
            .unwrap_err();
        assert!(matches!(err, DemesneError::InvalidLocation(_)));
        assert_eq!(polity.spawn(), before);
    }

    #[test]
    fn test_spawn_requires_home() {
        let mut polity = Polity::new(PolityId(1), "Freehold", ActorId::new());
        let err = polity
            .set_spawn(Location::new(WorldId(0), 0.0, 0.0, 0.0), 16)
            .unwrap_err();
        assert!(matches!(err, DemesneError::InvalidAction(_)));
    }

    #[test]
    fn test_outpost_spawn_validates_kind_and_owner() {
        let mut polity = polity_with_claims(&[coord(0, 0)]);
        let outpost = Claim::new(coord(10, 10), PolityId(1), ClaimKind::Outpost);
        polity.add_claim(outpost);

        let inside = Location::new(WorldId(0), 165.0, 70.0, 165.0);
        polity.add_outpost_spawn(inside, &outpost, 16).unwrap();
        assert_eq!(polity.outpost_spawns().len(), 1);

        // Wrong kind.
        let plain = Claim::new(coord(0, 0), PolityId(1), ClaimKind::Plain);
        assert!(matches!(
            polity.add_outpost_spawn(inside, &plain, 16),
            Err(DemesneError::InvalidLocation(_))
        ));

        // Wrong owner.
        let foreign = Claim::new(coord(10, 10), PolityId(2), ClaimKind::Outpost);
        assert!(matches!(
            polity.add_outpost_spawn(inside, &foreign, 16),
            Err(DemesneError::NotOwned(_))
        ));
    }

    #[test]
    fn test_outpost_spawn_replaces_same_coordinate() {
        let mut polity = polity_with_claims(&[coord(0, 0)]);
        let outpost = Claim::new(coord(10, 10), PolityId(1), ClaimKind::Outpost);
        polity.add_claim(outpost);

        let first = Location::new(WorldId(0), 161.0, 70.0, 161.0);
        let second = Location::new(WorldId(0), 170.0, 70.0, 170.0);
        polity.add_outpost_spawn(first, &outpost, 16).unwrap();
        polity.add_outpost_spawn(second, &outpost, 16).unwrap();
        assert_eq!(polity.outpost_spawns(), &[second]);
    }

    #[test]
    fn test_removing_outpost_claim_drops_its_spawn() {
        let mut polity = polity_with_claims(&[coord(0, 0)]);
        let outpost = Claim::new(coord(10, 10), PolityId(1), ClaimKind::Outpost);
        polity.add_claim(outpost);
        polity
            .add_outpost_spawn(Location::new(WorldId(0), 165.0, 70.0, 165.0), &outpost, 16)
            .unwrap();

        polity.remove_claim(&coord(10, 10), 16);
        assert!(polity.outpost_spawns().is_empty());
    }

    #[test]
    fn test_roster_rejects_duplicates() {
        let founder = ActorId::new();
        let mut polity = Polity::new(PolityId(1), "Freehold", founder);
        assert!(matches!(
            polity.add_to_roster(founder),
            Err(DemesneError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_remove_last_member_empties() {
        let founder = ActorId::new();
        let mut polity = Polity::new(PolityId(1), "Freehold", founder);
        let change = polity.remove_from_roster(founder).unwrap();
        assert_eq!(change, RosterChange::Emptied);
        assert_eq!(polity.leader(), None);
    }

    #[test]
    fn test_leader_must_be_member() {
        let mut polity = Polity::new(PolityId(1), "Freehold", ActorId::new());
        assert!(matches!(
            polity.set_leader(ActorId::new()),
            Err(DemesneError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_claim_cost_schedule() {
        let config = RealmConfig {
            claim_base_price: 100.0,
            claim_price_growth: 1.1,
            ..RealmConfig::default()
        };
        let polity = polity_with_claims(&[coord(0, 0), coord(0, 1)]);

        // Third claim overall: round(100 * 1.1^3) = 133.
        assert_eq!(polity.claim_cost(1, &config).unwrap(), 133.0);
        // n = 0 costs nothing; negative n is rejected.
        assert_eq!(polity.claim_cost(0, &config).unwrap(), 0.0);
        assert!(polity.claim_cost(-1, &config).is_err());
        // Two more claims: round(100*1.1^3) + round(100*1.1^4) = 133 + 146.
        assert_eq!(polity.claim_cost(2, &config).unwrap(), 279.0);
    }

    #[test]
    fn test_bonus_cost_respects_headroom() {
        let config = RealmConfig {
            bonus_base_price: 100.0,
            bonus_price_growth: 1.0,
            max_purchased_claims: 5,
            ..RealmConfig::default()
        };
        let mut polity = polity_with_claims(&[coord(0, 0)]);
        polity.set_purchased_claims(3, &config);

        // Only 2 slots of headroom remain, so a request for 10 costs 2 terms.
        assert_eq!(polity.bonus_claim_cost(10, &config).unwrap(), 200.0);
        assert!(polity.bonus_claim_cost(-2, &config).is_err());
    }

    #[test]
    fn test_counters_clamped_on_set() {
        let config = RealmConfig {
            max_bonus_claims: 10,
            max_purchased_claims: 7,
            ..RealmConfig::default()
        };
        let mut polity = polity_with_claims(&[coord(0, 0)]);

        polity.set_bonus_claims(50, &config);
        assert_eq!(polity.bonus_claims(), 10);
        polity.add_purchased_claims(100, &config);
        assert_eq!(polity.purchased_claims(), 7);
    }

    #[test]
    fn test_tax_clamps_by_mode() {
        let config = RealmConfig {
            max_tax_percent: 25.0,
            max_tax_flat: 1000.0,
            ..RealmConfig::default()
        };
        let mut polity = polity_with_claims(&[coord(0, 0)]);

        polity.set_tax(500.0, &config);
        assert_eq!(polity.tax(), 500.0);

        polity.set_tax_percentage(true, &config);
        // 500 cannot be carried as a percentage; reset instead of rejecting.
        assert_eq!(polity.tax(), 0.0);

        polity.set_tax(90.0, &config);
        assert_eq!(polity.tax(), 25.0);
    }

    #[test]
    fn test_plot_price_floors_negative() {
        let config = RealmConfig::default();
        let mut polity = polity_with_claims(&[coord(0, 0)]);
        polity.set_plot_price(-5.0, &config);
        assert_eq!(polity.plot_price(ClaimKind::Plain), 0.0);
    }

    #[test]
    fn test_group_lifecycle() {
        let mut polity = polity_with_claims(&[coord(0, 0), coord(0, 1)]);
        let group = polity.add_group(ClaimGroup::new("market row", 50.0));

        polity.assign_claim_to_group(&coord(0, 1), group).unwrap();
        assert_eq!(polity.claims_in_group(group), vec![coord(0, 1)]);

        polity.rename_group(group, "harbor row").unwrap();
        assert_eq!(polity.group(group).unwrap().name, "harbor row");

        let detached = polity.remove_group(group);
        assert_eq!(detached, vec![coord(0, 1)]);
        assert_eq!(polity.claim(&coord(0, 1)).unwrap().group, None);
    }
}
