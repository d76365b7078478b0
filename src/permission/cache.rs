//! Per-actor memoization of permission decisions
//!
//! Permission checks fire on every world interaction, far too often to walk
//! the ownership graph each time. Decisions are cached per actor and keyed by
//! (coordinate, resource, action). Correctness depends on proactive
//! invalidation, not expiry: ownership changes, rule changes and roster
//! changes each purge exactly the entries they can affect.

use std::hash::{BuildHasher, Hash, Hasher};

use ahash::{AHashMap, RandomState};
use parking_lot::RwLock;

use crate::core::types::{ActionKind, ActorId, Coordinate, PolityId, ResourceKind};
use crate::permission::resolver::Decision;

/// Cache key inside one actor's entry set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub coord: Coordinate,
    pub resource: ResourceKind,
    pub action: ActionKind,
}

/// A cached decision, tagged with the polity whose rules produced it so
/// rule changes can purge it without recomputing ownership
#[derive(Debug, Clone)]
struct CachedDecision {
    decision: Decision,
    owner: Option<PolityId>,
}

type ActorEntries = AHashMap<CacheKey, CachedDecision>;

/// Sharded decision cache; reads and writes touch one shard only
pub struct PermissionCache {
    shards: Vec<RwLock<AHashMap<ActorId, ActorEntries>>>,
    hasher: RandomState,
}

impl PermissionCache {
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count > 0, "permission cache needs at least one shard");
        Self {
            shards: (0..shard_count).map(|_| RwLock::new(AHashMap::new())).collect(),
            hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard_for(&self, actor: &ActorId) -> &RwLock<AHashMap<ActorId, ActorEntries>> {
        let mut hasher = self.hasher.build_hasher();
        actor.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    pub fn get(&self, actor: &ActorId, key: &CacheKey) -> Option<Decision> {
        self.shard_for(actor)
            .read()
            .get(actor)
            .and_then(|entries| entries.get(key))
            .map(|cached| cached.decision.clone())
    }

    pub fn put(&self, actor: ActorId, key: CacheKey, decision: Decision, owner: Option<PolityId>) {
        self.shard_for(&actor)
            .write()
            .entry(actor)
            .or_default()
            .insert(key, CachedDecision { decision, owner });
    }

    /// Drop every entry for one actor. Called when the actor's membership or
    /// ranks change.
    pub fn invalidate_actor(&self, actor: &ActorId) {
        self.shard_for(actor).write().remove(actor);
    }

    /// Drop every actor's entries at one coordinate. Called when the claim
    /// there changes owner, kind or existence.
    pub fn invalidate_coordinate(&self, coord: &Coordinate) {
        for shard in &self.shards {
            let mut shard = shard.write();
            for entries in shard.values_mut() {
                entries.retain(|key, _| key.coord != *coord);
            }
        }
    }

    /// Drop every entry decided under one polity's rules. Called when the
    /// polity's permission matrix changes.
    pub fn invalidate_polity(&self, polity: PolityId) {
        for shard in &self.shards {
            let mut shard = shard.write();
            for entries in shard.values_mut() {
                entries.retain(|_, cached| cached.owner != Some(polity));
            }
        }
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
    }

    /// Total cached decisions, across all actors
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().values().map(|e| e.len()).sum::<usize>())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
