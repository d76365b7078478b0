//! The universe: arena of actors, polities and federations, plus the
//! territory index and permission cache derived from them
//!
//! Aggregates reference each other by id only; every cross-aggregate
//! operation resolves ids through the arenas here. Mutation of one polity is
//! serialized by that polity's mutex while lookups stay lock-free across
//! polities.
//!
//! Lock discipline: a siege session lock may wrap polity work; a polity lock
//! may wrap short actor or federation locks; an actor lock must never be
//! held while acquiring a polity lock. The only place two polity locks
//! coexist is `transfer_claims`, which acquires them in ascending id order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};

use crate::core::config::RealmConfig;
use crate::core::error::{DemesneError, Result};
use crate::core::types::{
    ActionKind, ActorId, ClaimGroupId, Coordinate, FederationId, Location, PolityId, ResourceKind,
};
use crate::permission::cache::{CacheKey, PermissionCache};
use crate::permission::resolver::{self, Decision, PolityPermissions};
use crate::polity::actor::Actor;
use crate::polity::federation::{Federation, FederationChange};
use crate::polity::polity::{Polity, RosterChange};
use crate::polity::succession;
use crate::services::{EconomyLedger, LedgerAccount, Notifier, Persistence};
use crate::siege::session::SiegeSession;
use crate::territory::claim::{Claim, ClaimGroup, ClaimKind};
use crate::territory::index::TerritoryIndex;

pub struct Universe {
    config: RealmConfig,
    actors: RwLock<AHashMap<ActorId, Arc<Mutex<Actor>>>>,
    polities: RwLock<AHashMap<PolityId, Arc<Mutex<Polity>>>>,
    federations: RwLock<AHashMap<FederationId, Arc<Mutex<Federation>>>>,
    sieges: RwLock<AHashMap<PolityId, Arc<Mutex<SiegeSession>>>>,
    territory: TerritoryIndex,
    cache: PermissionCache,
    persistence: Arc<dyn Persistence>,
    ledger: Arc<dyn EconomyLedger>,
    notifier: Arc<dyn Notifier>,
    next_polity_id: AtomicU32,
    next_federation_id: AtomicU32,
}

impl Universe {
    pub fn new(
        config: RealmConfig,
        persistence: Arc<dyn Persistence>,
        ledger: Arc<dyn EconomyLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate().map_err(DemesneError::InvalidAction)?;
        Ok(Self {
            territory: TerritoryIndex::new(config.index_shards),
            cache: PermissionCache::new(config.cache_shards),
            config,
            actors: RwLock::new(AHashMap::new()),
            polities: RwLock::new(AHashMap::new()),
            federations: RwLock::new(AHashMap::new()),
            sieges: RwLock::new(AHashMap::new()),
            persistence,
            ledger,
            notifier,
            next_polity_id: AtomicU32::new(1),
            next_federation_id: AtomicU32::new(1),
        })
    }

    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    pub fn territory(&self) -> &TerritoryIndex {
        &self.territory
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    pub(crate) fn persistence(&self) -> &dyn Persistence {
        &*self.persistence
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        &*self.notifier
    }

    // === Arena access ===

    pub fn actor(&self, id: ActorId) -> Option<Arc<Mutex<Actor>>> {
        self.actors.read().get(&id).cloned()
    }

    pub fn polity(&self, id: PolityId) -> Option<Arc<Mutex<Polity>>> {
        self.polities.read().get(&id).cloned()
    }

    pub fn federation(&self, id: FederationId) -> Option<Arc<Mutex<Federation>>> {
        self.federations.read().get(&id).cloned()
    }

    pub fn siege(&self, defender: PolityId) -> Option<Arc<Mutex<SiegeSession>>> {
        self.sieges.read().get(&defender).cloned()
    }

    pub(crate) fn actor_ref(&self, id: ActorId) -> Result<Arc<Mutex<Actor>>> {
        self.actor(id)
            .ok_or_else(|| DemesneError::NotRegistered("unknown actor".into()))
    }

    pub(crate) fn polity_ref(&self, id: PolityId) -> Result<Arc<Mutex<Polity>>> {
        self.polity(id)
            .ok_or_else(|| DemesneError::NotRegistered("unknown polity".into()))
    }

    pub(crate) fn federation_ref(&self, id: FederationId) -> Result<Arc<Mutex<Federation>>> {
        self.federation(id)
            .ok_or_else(|| DemesneError::NotRegistered("unknown federation".into()))
    }

    pub(crate) fn register_siege(
        &self,
        defender: PolityId,
        session: SiegeSession,
    ) -> Result<Arc<Mutex<SiegeSession>>> {
        let mut sieges = self.sieges.write();
        if sieges.contains_key(&defender) {
            return Err(DemesneError::AlreadyRegistered(
                "a siege is already in progress against this polity".into(),
            ));
        }
        let session = Arc::new(Mutex::new(session));
        sieges.insert(defender, Arc::clone(&session));
        Ok(session)
    }

    pub(crate) fn retire_siege(&self, defender: PolityId) {
        self.sieges.write().remove(&defender);
    }

    // === Actors ===

    pub fn register_actor(&self, name: impl Into<String>) -> ActorId {
        let actor = Actor::new(name);
        let id = actor.id;
        self.actors.write().insert(id, Arc::new(Mutex::new(actor)));
        id
    }

    /// Grant a polity rank. Ranks feed succession order and may feed future
    /// permission decisions, so the actor's cached decisions are dropped.
    pub fn grant_rank(&self, actor: ActorId, rank: impl Into<String>) -> Result<()> {
        self.actor_ref(actor)?.lock().add_rank(rank);
        self.cache.invalidate_actor(&actor);
        Ok(())
    }

    pub fn revoke_rank(&self, actor: ActorId, rank: &str) -> Result<()> {
        self.actor_ref(actor)?.lock().remove_rank(rank);
        self.cache.invalidate_actor(&actor);
        Ok(())
    }

    pub fn grant_node(&self, actor: ActorId, node: impl Into<String>) -> Result<()> {
        self.actor_ref(actor)?.lock().grant_node(node);
        Ok(())
    }

    pub(crate) fn actor_has_rank(&self, actor: ActorId, rank: &str) -> bool {
        self.actor(actor).is_some_and(|a| a.lock().has_rank(rank))
    }

    // === Polity lifecycle and roster ===

    /// Found a polity with `founder` as sole member and leader
    pub fn create_polity(&self, name: impl Into<String>, founder: ActorId) -> Result<PolityId> {
        let actor_arc = self.actor_ref(founder)?;
        let id = PolityId(self.next_polity_id.fetch_add(1, Ordering::Relaxed));
        let polity = Polity::new(id, name, founder);

        {
            let mut actor = actor_arc.lock();
            if actor.polity().is_some() {
                return Err(DemesneError::AlreadyRegistered(
                    "actor already belongs to a polity".into(),
                ));
            }
            actor.set_polity(Some(id));
        }

        self.persist_polity(&polity);
        self.polities.write().insert(id, Arc::new(Mutex::new(polity)));
        self.cache.invalidate_actor(&founder);
        tracing::info!(polity = id.0, "polity founded");
        Ok(id)
    }

    /// Add an actor to a polity's roster. Fails if the actor belongs to this
    /// or any other polity.
    pub fn add_member(&self, polity_id: PolityId, actor_id: ActorId) -> Result<()> {
        let polity_arc = self.polity_ref(polity_id)?;
        let actor_arc = self.actor_ref(actor_id)?;

        let mut polity = polity_arc.lock();
        let mut actor = actor_arc.lock();
        if actor.polity().is_some() {
            return Err(DemesneError::AlreadyRegistered(
                "actor already belongs to a polity".into(),
            ));
        }
        polity.add_to_roster(actor_id)?;
        actor.set_polity(Some(polity_id));
        drop(actor);

        self.cache.invalidate_actor(&actor_id);
        self.persist_polity(&polity);
        Ok(())
    }

    /// Remove an actor from a polity. A departing leader triggers
    /// succession before the removal is finalized; emptying the roster is
    /// reported for the caller to act on, not handled here.
    pub fn remove_member(&self, polity_id: PolityId, actor_id: ActorId) -> Result<RosterChange> {
        let polity_arc = self.polity_ref(polity_id)?;

        let change = {
            let mut polity = polity_arc.lock();
            if !polity.is_member(actor_id) {
                return Err(DemesneError::NotRegistered(format!(
                    "not a member of {}",
                    polity.name
                )));
            }

            if polity.is_leader(actor_id) {
                let ranks = self.config.succession_ranks.clone();
                let successor =
                    succession::resolve(&mut polity, &ranks, |a, r| self.actor_has_rank(a, r));
                match successor {
                    Some(leader) => {
                        tracing::info!(polity = polity_id.0, "leadership succeeded to {:?}", leader)
                    }
                    None => tracing::warn!(polity = polity_id.0, "polity left leaderless"),
                }
            }

            let change = polity.remove_from_roster(actor_id)?;
            self.persist_polity(&polity);
            change
        };

        if let Some(actor_arc) = self.actor(actor_id) {
            actor_arc.lock().set_polity(None);
        }
        self.cache.invalidate_actor(&actor_id);
        Ok(change)
    }

    /// Dissolve a polity: destroy its claims, free its members, leave its
    /// federation and abandon any siege against it
    pub fn dissolve_polity(&self, polity_id: PolityId) -> Result<()> {
        let polity_arc = self.polity_ref(polity_id)?;

        let (name, members, coords, federation, world) = {
            let mut polity = polity_arc.lock();
            let world = polity.world();
            let (claims, _groups) = polity.take_all_claims();
            let coords: Vec<Coordinate> = claims.iter().map(|c| c.coord).collect();
            let members: Vec<ActorId> = polity.members().to_vec();
            (
                polity.name.clone(),
                members,
                coords,
                polity.federation(),
                world,
            )
        };

        for coord in &coords {
            self.territory.remove(coord);
            self.cache.invalidate_coordinate(coord);
        }
        if let Some(world) = world {
            self.territory.unbind_world(polity_id, world);
        }

        for member in members {
            if let Some(actor_arc) = self.actor(member) {
                actor_arc.lock().set_polity(None);
            }
            self.cache.invalidate_actor(&member);
        }

        if let Some(federation) = federation {
            self.expel_from_federation(polity_id, federation)?;
        }

        self.retire_siege(polity_id);
        self.cache.invalidate_polity(polity_id);
        self.polities.write().remove(&polity_id);
        tracing::info!(polity = polity_id.0, "polity {} dissolved", name);
        Ok(())
    }

    // === Territory ===

    /// Claim an unowned coordinate for a polity. The polity's first claim
    /// becomes its home and binds it to the coordinate's world.
    pub fn claim(&self, polity_id: PolityId, coord: Coordinate, kind: ClaimKind) -> Result<Claim> {
        let polity_arc = self.polity_ref(polity_id)?;
        let mut polity = polity_arc.lock();

        let claim = Claim::new(coord, polity_id, kind);
        self.territory.insert(claim)?;

        let old_world = polity.world();
        let became_home = polity.add_claim(claim);
        if became_home {
            self.territory.rebind_world(polity_id, old_world, coord.world);
        }

        self.cache.invalidate_coordinate(&coord);
        self.persist_claim(&claim);
        self.persist_polity(&polity);
        Ok(claim)
    }

    /// Release the claim at a coordinate. A no-op when the coordinate is
    /// unclaimed. Removing a home, outpost or jail claim also removes the
    /// spawn entries it backed.
    pub fn unclaim(&self, coord: Coordinate) -> Result<Option<Claim>> {
        // The owner can change between the lookup and taking its lock
        // (conquest reassigns in place), so re-verify after locking.
        loop {
            let claim = match self.territory.lookup(&coord) {
                Some(claim) => claim,
                None => return Ok(None),
            };
            let polity_arc = match self.polity(claim.owner) {
                Some(arc) => arc,
                None => {
                    // Orphaned index entry; drop it rather than leave the
                    // index diverged from the claim sets.
                    tracing::warn!("claim at {} had no owning polity", coord);
                    self.territory.remove(&coord);
                    self.cache.invalidate_coordinate(&coord);
                    return Ok(Some(claim));
                }
            };

            let mut polity = polity_arc.lock();
            match self.territory.lookup(&coord) {
                Some(current) if current.owner == polity.id => {
                    self.territory.remove(&coord);
                    let removed = polity.remove_claim(&coord, self.config.cell_size);
                    self.cache.invalidate_coordinate(&coord);
                    self.persist_polity(&polity);
                    return Ok(removed.or(Some(current)));
                }
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    /// Change the kind of an existing claim, on both the index and the
    /// owning polity's copy
    pub fn set_claim_kind(&self, coord: Coordinate, kind: ClaimKind) -> Result<Claim> {
        let claim = self
            .territory
            .lookup(&coord)
            .ok_or(DemesneError::NotOwned(coord))?;
        let polity_arc = self.polity_ref(claim.owner)?;
        let mut polity = polity_arc.lock();

        let updated = self
            .territory
            .update(&coord, |c| c.kind = kind)
            .ok_or(DemesneError::NotOwned(coord))?;
        polity.set_claim_kind(&coord, kind, self.config.cell_size);

        self.cache.invalidate_coordinate(&coord);
        self.persist_claim(&updated);
        Ok(updated)
    }

    /// Move a polity's home to another owned claim.
    ///
    /// Clears a spawn that no longer fits, rebinds the polity's world when
    /// the home crossed worlds, and applies the federation proximity rule:
    /// a member whose new home is too far from (or in a different world
    /// than) its federation's capital is expelled.
    pub fn set_home(&self, polity_id: PolityId, coord: Coordinate) -> Result<()> {
        let polity_arc = self.polity_ref(polity_id)?;

        let federation = {
            let mut polity = polity_arc.lock();
            let change = polity.set_home(coord, self.config.cell_size)?;
            if let Some((old, new)) = change.world_changed {
                self.territory.rebind_world(polity_id, old, new);
            }
            self.persist_polity(&polity);
            polity.federation()
        };

        if let Some(federation_id) = federation {
            if self.config.federation_proximity > 0.0 {
                self.enforce_capital_proximity(polity_id, federation_id, coord)?;
            }
        }
        Ok(())
    }

    /// Expel a federation member whose home strayed beyond the configured
    /// capital distance. Intentional coupling between territory and
    /// federation membership.
    fn enforce_capital_proximity(
        &self,
        polity_id: PolityId,
        federation_id: FederationId,
        home: Coordinate,
    ) -> Result<()> {
        let federation_arc = self.federation_ref(federation_id)?;
        let (capital, federation_name) = {
            let federation = federation_arc.lock();
            (federation.capital(), federation.name.clone())
        };
        if capital == polity_id {
            return Ok(());
        }

        let capital_home = match self.polity(capital).and_then(|arc| arc.lock().home()) {
            Some(home) => home,
            None => return Ok(()),
        };

        let too_far = capital_home.world != home.world
            || capital_home.distance(&home) > self.config.federation_proximity;
        if !too_far {
            return Ok(());
        }

        let polity_name = { self.polity_ref(polity_id)?.lock().name.clone() };
        tracing::info!(
            polity = polity_id.0,
            federation = federation_id.0,
            "home moved out of capital range; expelling from federation"
        );
        self.expel_from_federation(polity_id, federation_id)?;
        self.notifier.notify_federation(
            federation_id,
            &format!(
                "{} moved its home too far from the capital and has left {}",
                polity_name, federation_name
            ),
        );
        Ok(())
    }

    /// Set the home spawn, which must lie inside the home claim
    pub fn set_spawn(&self, polity_id: PolityId, location: Location) -> Result<()> {
        let polity_arc = self.polity_ref(polity_id)?;
        let mut polity = polity_arc.lock();
        polity.set_spawn(location, self.config.cell_size)?;
        self.persist_polity(&polity);
        Ok(())
    }

    /// Add an outpost spawn; the location must resolve to an outpost claim
    /// owned by the polity
    pub fn add_outpost_spawn(&self, polity_id: PolityId, location: Location) -> Result<()> {
        let coord = location.coordinate(self.config.cell_size);
        let backing = self
            .territory
            .lookup(&coord)
            .ok_or_else(|| DemesneError::InvalidLocation("location is not within a claim".into()))?;

        let polity_arc = self.polity_ref(polity_id)?;
        let mut polity = polity_arc.lock();
        polity.add_outpost_spawn(location, &backing, self.config.cell_size)?;
        self.persist_polity(&polity);
        Ok(())
    }

    /// Add a jail spawn; the location must resolve to a jail claim owned by
    /// the polity
    pub fn add_jail_spawn(&self, polity_id: PolityId, location: Location) -> Result<()> {
        let coord = location.coordinate(self.config.cell_size);
        let backing = self
            .territory
            .lookup(&coord)
            .ok_or_else(|| DemesneError::InvalidLocation("location is not within a claim".into()))?;

        let polity_arc = self.polity_ref(polity_id)?;
        let mut polity = polity_arc.lock();
        polity.add_jail_spawn(location, &backing, self.config.cell_size)?;
        self.persist_polity(&polity);
        Ok(())
    }

    // === Claim groups ===

    pub fn create_group(
        &self,
        polity_id: PolityId,
        name: impl Into<String>,
        price: f64,
    ) -> Result<ClaimGroupId> {
        let polity_arc = self.polity_ref(polity_id)?;
        let mut polity = polity_arc.lock();
        let id = polity.add_group(ClaimGroup::new(name, price));
        self.persist_polity(&polity);
        Ok(id)
    }

    pub fn assign_claim_to_group(
        &self,
        polity_id: PolityId,
        coord: Coordinate,
        group: ClaimGroupId,
    ) -> Result<()> {
        let polity_arc = self.polity_ref(polity_id)?;
        let mut polity = polity_arc.lock();
        let updated = polity.assign_claim_to_group(&coord, group)?;
        self.territory.update(&coord, |c| c.group = Some(group));
        self.persist_claim(&updated);
        Ok(())
    }

    pub fn remove_group(&self, polity_id: PolityId, group: ClaimGroupId) -> Result<()> {
        let polity_arc = self.polity_ref(polity_id)?;
        let mut polity = polity_arc.lock();
        for coord in polity.remove_group(group) {
            self.territory.update(&coord, |c| c.group = None);
        }
        self.persist_polity(&polity);
        Ok(())
    }

    // === Permissions ===

    /// Replace a polity's permission rules and drop every cached decision
    /// they produced
    pub fn set_permissions(&self, polity_id: PolityId, permissions: PolityPermissions) -> Result<()> {
        let polity_arc = self.polity_ref(polity_id)?;
        {
            let mut polity = polity_arc.lock();
            polity.set_permissions(permissions);
            self.persist_polity(&polity);
        }
        self.cache.invalidate_polity(polity_id);
        Ok(())
    }

    /// Resolve whether an actor may perform an action at a location.
    ///
    /// Decisions are served from the per-actor cache when present; misses
    /// compute from current ownership and rules and populate the cache.
    pub fn resolve_permission(
        &self,
        actor_id: ActorId,
        location: Location,
        resource: ResourceKind,
        action: ActionKind,
    ) -> Decision {
        let coord = location.coordinate(self.config.cell_size);
        let key = CacheKey {
            coord,
            resource,
            action,
        };

        if let Some(decision) = self.cache.get(&actor_id, &key) {
            return decision;
        }

        let claim = match self.territory.lookup(&coord) {
            Some(claim) => claim,
            None => {
                let decision = resolver::decide_wilderness(&self.config.wilderness, action);
                self.cache.put(actor_id, key, decision.clone(), None);
                return decision;
            }
        };

        // Snapshot the actor's membership before touching the polity; an
        // actor lock is never held across a polity lock.
        let membership = self
            .actor(actor_id)
            .and_then(|arc| arc.lock().polity());

        let standing = if membership == Some(claim.owner) {
            resolver::Standing::Member
        } else if self.are_allied(membership, claim.owner) {
            resolver::Standing::Ally
        } else {
            resolver::Standing::Outsider
        };

        let (owner_name, permissions) = match self.polity(claim.owner) {
            Some(arc) => {
                let polity = arc.lock();
                (polity.name.clone(), *polity.permissions())
            }
            None => {
                // Index still carries a claim for a vanished polity. Fail
                // open as wilderness but do not cache the divergence.
                tracing::warn!("claim at {} owned by unknown polity", coord);
                return resolver::decide_wilderness(&self.config.wilderness, action);
            }
        };

        let decision = resolver::decide_claimed(&claim, &owner_name, &permissions, standing, action);
        self.cache
            .put(actor_id, key, decision.clone(), Some(claim.owner));
        decision
    }

    /// Event-source entry point: resolve an intended action and, on denial,
    /// deliver the scoped reason to the actor. Returns whether the action
    /// may proceed; `false` asks the caller to reverse it.
    pub fn check_action(
        &self,
        actor: ActorId,
        location: Location,
        resource: ResourceKind,
        action: ActionKind,
    ) -> bool {
        match self.resolve_permission(actor, location, resource, action) {
            Decision::Allow => true,
            Decision::Deny { reason } => {
                self.notifier.message(actor, &reason);
                false
            }
        }
    }

    /// Whether the actor's polity and the owning polity are allied: the
    /// same federation, or federations that mutually list each other
    fn are_allied(&self, membership: Option<PolityId>, owner: PolityId) -> bool {
        let Some(member_polity) = membership else {
            return false;
        };
        let mine = self
            .polity(member_polity)
            .and_then(|arc| arc.lock().federation());
        let theirs = self.polity(owner).and_then(|arc| arc.lock().federation());
        match (mine, theirs) {
            (Some(a), Some(b)) if a == b => true,
            (Some(a), Some(b)) => {
                let forward = self
                    .federation(a)
                    .is_some_and(|arc| arc.lock().is_ally(b));
                let backward = self
                    .federation(b)
                    .is_some_and(|arc| arc.lock().is_ally(a));
                forward && backward
            }
            _ => false,
        }
    }

    // === Federations ===

    pub fn create_federation(
        &self,
        name: impl Into<String>,
        capital: PolityId,
    ) -> Result<FederationId> {
        let polity_arc = self.polity_ref(capital)?;
        let id = FederationId(self.next_federation_id.fetch_add(1, Ordering::Relaxed));

        {
            let mut polity = polity_arc.lock();
            if polity.federation().is_some() {
                return Err(DemesneError::AlreadyRegistered(
                    "polity already belongs to a federation".into(),
                ));
            }
            polity.set_federation(Some(id));
            self.persist_polity(&polity);
        }

        let federation = Federation::new(id, name, capital);
        self.federations
            .write()
            .insert(id, Arc::new(Mutex::new(federation)));
        tracing::info!(federation = id.0, "federation founded");
        Ok(id)
    }

    /// Join a federation. A polity already in one is rejected.
    pub fn join_federation(&self, polity_id: PolityId, federation_id: FederationId) -> Result<()> {
        let polity_arc = self.polity_ref(polity_id)?;
        let federation_arc = self.federation_ref(federation_id)?;

        let mut polity = polity_arc.lock();
        if polity.federation().is_some() {
            return Err(DemesneError::AlreadyRegistered(
                "polity already belongs to a federation".into(),
            ));
        }
        federation_arc.lock().add_member(polity_id)?;
        polity.set_federation(Some(federation_id));
        self.persist_polity(&polity);
        drop(polity);

        // Ally standing can change on every polity's territory, not just
        // this one's, so the whole cache goes.
        self.cache.clear();
        Ok(())
    }

    /// Leave the current federation
    pub fn leave_federation(&self, polity_id: PolityId) -> Result<FederationChange> {
        let federation_id = {
            let polity_arc = self.polity_ref(polity_id)?;
            let polity = polity_arc.lock();
            polity.federation().ok_or_else(|| {
                DemesneError::NotRegistered("polity does not belong to a federation".into())
            })?
        };

        let change = {
            let federation_arc = self.federation_ref(federation_id)?;
            let mut federation = federation_arc.lock();
            federation.remove_member(polity_id)?
        };

        {
            let polity_arc = self.polity_ref(polity_id)?;
            let mut polity = polity_arc.lock();
            polity.set_federation(None);
            self.persist_polity(&polity);
        }
        self.cache.clear();

        if change == FederationChange::Emptied {
            self.federations.write().remove(&federation_id);
            tracing::info!(federation = federation_id.0, "federation dissolved");
        }
        Ok(change)
    }

    /// Remove a polity from a federation regardless of the capital rule,
    /// promoting the first remaining member to capital when needed. Used by
    /// conquest and dissolution, where refusal is not an option.
    pub(crate) fn expel_from_federation(
        &self,
        polity_id: PolityId,
        federation_id: FederationId,
    ) -> Result<()> {
        let emptied = {
            let federation_arc = self.federation_ref(federation_id)?;
            let mut federation = federation_arc.lock();
            if federation.is_capital(polity_id) && federation.member_count() > 1 {
                let successor = federation
                    .members()
                    .iter()
                    .copied()
                    .find(|&m| m != polity_id);
                if let Some(successor) = successor {
                    federation.set_capital(successor)?;
                }
            }
            federation.remove_member(polity_id)? == FederationChange::Emptied
        };

        if let Some(polity_arc) = self.polity(polity_id) {
            let mut polity = polity_arc.lock();
            polity.set_federation(None);
            self.persist_polity(&polity);
        }
        self.cache.clear();

        if emptied {
            self.federations.write().remove(&federation_id);
            tracing::info!(federation = federation_id.0, "federation dissolved");
        }
        Ok(())
    }

    /// Record a mutual alliance between two federations
    pub fn add_alliance(&self, a: FederationId, b: FederationId) -> Result<()> {
        if a == b {
            return Err(DemesneError::InvalidAction(
                "a federation cannot ally itself".into(),
            ));
        }
        self.federation_ref(a)?.lock().add_ally(b);
        self.federation_ref(b)?.lock().add_ally(a);
        self.cache.clear();
        Ok(())
    }

    pub fn remove_alliance(&self, a: FederationId, b: FederationId) -> Result<()> {
        self.federation_ref(a)?.lock().remove_ally(b);
        self.federation_ref(b)?.lock().remove_ally(a);
        self.cache.clear();
        Ok(())
    }

    // === Economy ===

    /// Deposit into the polity bank. A deposit that would push the balance
    /// past the configured cap is skipped entirely and the members are
    /// notified; nothing is partially applied.
    pub fn collect(&self, polity_id: PolityId, amount: f64, memo: &str) -> Result<bool> {
        let account = LedgerAccount::Polity(polity_id);
        if self.config.bank_cap > 0.0 {
            let balance = self.ledger.balance(account);
            if balance + amount > self.config.bank_cap {
                self.notifier.notify_polity(
                    polity_id,
                    &format!(
                        "A deposit of {} was skipped: the bank is capped at {}",
                        amount, self.config.bank_cap
                    ),
                );
                return Ok(false);
            }
        }
        self.ledger.deposit(account, amount, memo)
    }

    // === Conquest ===

    /// Transfer every claim of one polity to another, preserving claim kind
    /// and group membership. The index is re-pointed per coordinate, so a
    /// concurrent lookup sees the old owner or the new one, never a gap.
    pub fn transfer_claims(&self, from_id: PolityId, to_id: PolityId) -> Result<usize> {
        if from_id == to_id {
            return Err(DemesneError::InvalidAction(
                "cannot transfer claims to the same polity".into(),
            ));
        }
        let from_arc = self.polity_ref(from_id)?;
        let to_arc = self.polity_ref(to_id)?;

        // Ascending id order is the crate-wide rule for holding two polity
        // locks at once.
        let (mut from, mut to);
        if from_id.0 < to_id.0 {
            from = from_arc.lock();
            to = to_arc.lock();
        } else {
            to = to_arc.lock();
            from = from_arc.lock();
        }

        let from_world = from.world();
        let to_world_before = to.world();
        let (claims, groups) = from.take_all_claims();
        let coords: Vec<Coordinate> = claims.iter().map(|c| c.coord).collect();
        to.receive_claims(claims, groups);

        for coord in &coords {
            self.territory.reassign(coord, to_id);
        }

        if let Some(world) = from_world {
            self.territory.unbind_world(from_id, world);
        }
        if to.world() != to_world_before {
            if let Some(new_world) = to.world() {
                self.territory.rebind_world(to_id, to_world_before, new_world);
            }
        }

        for coord in &coords {
            self.cache.invalidate_coordinate(coord);
            if let Some(claim) = to.claim(coord) {
                self.persist_claim(claim);
            }
        }
        self.cache.invalidate_polity(from_id);
        self.persist_polity(&from);
        self.persist_polity(&to);

        tracing::info!(
            from = from_id.0,
            to = to_id.0,
            claims = coords.len(),
            "territory transferred"
        );
        Ok(coords.len())
    }

    /// Apply the territorial consequences of a lost siege: the defender's
    /// claims pass to the winning federation's capital, the defender is
    /// expelled from its own federation and marked conquered.
    pub(crate) fn apply_conquest(
        &self,
        defender: PolityId,
        winner: FederationId,
    ) -> Result<()> {
        let capital = self.federation_ref(winner)?.lock().capital();

        let old_federation = { self.polity_ref(defender)?.lock().federation() };
        if let Some(old) = old_federation {
            self.expel_from_federation(defender, old)?;
        }

        if capital != defender {
            self.transfer_claims(defender, capital)?;
        }

        {
            let polity_arc = self.polity_ref(defender)?;
            let mut polity = polity_arc.lock();
            polity.set_conquered(true);
            self.persist_polity(&polity);
        }
        Ok(())
    }

    // === Persistence helpers ===

    /// Routine saves are fire-and-forget: the core reports a failure and
    /// moves on. Only the siege terminal save escalates (see the siege
    /// module).
    pub(crate) fn persist_polity(&self, polity: &Polity) {
        if let Err(e) = self.persistence.save_polity(polity) {
            tracing::warn!(polity = polity.id.0, "failed to save polity: {}", e);
        }
    }

    pub(crate) fn persist_claim(&self, claim: &Claim) {
        if let Err(e) = self.persistence.save_claim(claim) {
            tracing::warn!("failed to save claim at {}: {}", claim.coord, e);
        }
    }
}
