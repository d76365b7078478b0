//! Leadership succession
//!
//! When a leader leaves, a replacement is chosen deterministically: members
//! holding a configured succession rank come first (ranks in configured
//! priority order, roster order within a rank), members holding none come
//! after, and the outgoing leader is never a candidate for their own
//! succession.

use std::collections::HashSet;

use crate::core::types::ActorId;
use crate::polity::polity::Polity;

/// The duplicate-free succession order for a polity.
///
/// `has_rank` answers whether an actor currently holds a rank; rank state
/// lives on the actor, not the polity, so the caller supplies the lookup.
pub fn succession_order<F>(polity: &Polity, configured_ranks: &[String], has_rank: F) -> Vec<ActorId>
where
    F: Fn(ActorId, &str) -> bool,
{
    let mut order = Vec::with_capacity(polity.member_count());
    let mut seen: HashSet<ActorId> = HashSet::with_capacity(polity.member_count());

    for rank in configured_ranks {
        for &member in polity.members() {
            if has_rank(member, rank) && seen.insert(member) {
                order.push(member);
            }
        }
    }

    // Everyone else, in roster order.
    for &member in polity.members() {
        if seen.insert(member) {
            order.push(member);
        }
    }

    if let Some(leader) = polity.leader() {
        order.retain(|&candidate| candidate != leader);
    }

    order
}

/// Install the first viable successor as leader.
///
/// Walks the succession order, attempting each candidate until one installs
/// and is confirmed distinct from the outgoing leader. An exhausted order
/// leaves leadership unset; the polity then exists leaderless until an
/// explicit assignment or dissolution.
pub fn resolve<F>(polity: &mut Polity, configured_ranks: &[String], has_rank: F) -> Option<ActorId>
where
    F: Fn(ActorId, &str) -> bool,
{
    let outgoing = polity.leader();

    for candidate in succession_order(polity, configured_ranks, &has_rank) {
        if polity.set_leader(candidate).is_ok() && polity.leader() != outgoing {
            return polity.leader();
        }
    }

    polity.clear_leader();
    None
}
