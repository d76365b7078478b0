//! Sharded concurrent index from coordinates to claims
//!
//! Lookups dominate mutations by orders of magnitude (every world interaction
//! resolves a coordinate), so the map is split into independently locked
//! shards: a lookup takes a read lock on exactly one shard and never blocks
//! lookups on other shards or on the same shard.

use std::collections::HashSet;
use std::hash::{BuildHasher, Hash, Hasher};

use ahash::{AHashMap, RandomState};
use parking_lot::RwLock;

use crate::core::error::{DemesneError, Result};
use crate::core::types::{Coordinate, PolityId, WorldId};
use crate::territory::claim::Claim;

/// Process-wide lookup from coordinate to claim, plus the registry binding
/// each polity to the world its home claim lives in.
pub struct TerritoryIndex {
    shards: Vec<RwLock<AHashMap<Coordinate, Claim>>>,
    hasher: RandomState,
    /// World -> polities bound to it. A polity is bound to exactly the world
    /// of its home claim; rebinding swaps both sides under one lock.
    bindings: RwLock<AHashMap<WorldId, HashSet<PolityId>>>,
}

impl TerritoryIndex {
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count > 0, "territory index needs at least one shard");
        Self {
            shards: (0..shard_count).map(|_| RwLock::new(AHashMap::new())).collect(),
            hasher: RandomState::new(),
            bindings: RwLock::new(AHashMap::new()),
        }
    }

    #[inline]
    fn shard_for(&self, coord: &Coordinate) -> &RwLock<AHashMap<Coordinate, Claim>> {
        let mut hasher = self.hasher.build_hasher();
        coord.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// The single source of truth for "who owns this point"
    pub fn lookup(&self, coord: &Coordinate) -> Option<Claim> {
        self.shard_for(coord).read().get(coord).copied()
    }

    pub fn is_claimed(&self, coord: &Coordinate) -> bool {
        self.shard_for(coord).read().contains_key(coord)
    }

    /// Insert a claim, failing if the coordinate is already taken.
    ///
    /// The occupancy check and the insert happen under one shard write lock,
    /// so two racing inserts for the same coordinate cannot both succeed.
    pub fn insert(&self, claim: Claim) -> Result<()> {
        let mut shard = self.shard_for(&claim.coord).write();
        if shard.contains_key(&claim.coord) {
            return Err(DemesneError::AlreadyClaimed(claim.coord));
        }
        shard.insert(claim.coord, claim);
        Ok(())
    }

    /// Remove and return the claim at a coordinate; `None` if absent.
    ///
    /// Once this returns, no lookup can observe the removed entry.
    pub fn remove(&self, coord: &Coordinate) -> Option<Claim> {
        self.shard_for(coord).write().remove(coord)
    }

    /// Re-point the claim at a coordinate to a new owner, keeping kind and
    /// group. Atomic per key: a concurrent lookup sees either the old or the
    /// new owner, never an empty slot.
    pub fn reassign(&self, coord: &Coordinate, new_owner: PolityId) -> Option<Claim> {
        let mut shard = self.shard_for(coord).write();
        let claim = shard.get_mut(coord)?;
        *claim = claim.reowned(new_owner);
        Some(*claim)
    }

    /// Apply an in-place edit (kind or group change) to the claim at a
    /// coordinate. Returns the updated claim, or `None` if absent.
    pub fn update<F: FnOnce(&mut Claim)>(&self, coord: &Coordinate, edit: F) -> Option<Claim> {
        let mut shard = self.shard_for(coord).write();
        let claim = shard.get_mut(coord)?;
        edit(claim);
        Some(*claim)
    }

    /// Total number of claims across all shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    // === World bindings ===

    /// Bind a polity to a world
    pub fn bind_world(&self, polity: PolityId, world: WorldId) {
        self.bindings.write().entry(world).or_default().insert(polity);
    }

    /// Remove a polity's binding to a world
    pub fn unbind_world(&self, polity: PolityId, world: WorldId) {
        let mut bindings = self.bindings.write();
        if let Some(set) = bindings.get_mut(&world) {
            set.remove(&polity);
        }
    }

    /// Move a polity's binding from one world to another under a single
    /// lock, so no reader ever sees it bound to both worlds or to none.
    pub fn rebind_world(&self, polity: PolityId, old: Option<WorldId>, new: WorldId) {
        let mut bindings = self.bindings.write();
        if let Some(old) = old {
            if let Some(set) = bindings.get_mut(&old) {
                set.remove(&polity);
            }
        }
        bindings.entry(new).or_default().insert(polity);
    }

    pub fn is_bound(&self, polity: PolityId, world: WorldId) -> bool {
        self.bindings
            .read()
            .get(&world)
            .is_some_and(|set| set.contains(&polity))
    }

    /// Polities whose home world is the given world
    pub fn polities_in(&self, world: WorldId) -> Vec<PolityId> {
        self.bindings
            .read()
            .get(&world)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}
