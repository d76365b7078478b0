//! Actors: players and other agents that join polities

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::types::{ActorId, PolityId};

/// An acting player. Ranks drive succession priority inside a polity;
/// permission nodes gate protected operations such as siege surrender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    polity: Option<PolityId>,
    ranks: HashSet<String>,
    nodes: HashSet<String>,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(),
            name: name.into(),
            polity: None,
            ranks: HashSet::new(),
            nodes: HashSet::new(),
        }
    }

    pub fn polity(&self) -> Option<PolityId> {
        self.polity
    }

    pub(crate) fn set_polity(&mut self, polity: Option<PolityId>) {
        self.polity = polity;
        if polity.is_none() {
            // Ranks are meaningless outside a polity.
            self.ranks.clear();
        }
    }

    pub fn has_rank(&self, rank: &str) -> bool {
        self.ranks.contains(rank)
    }

    pub fn add_rank(&mut self, rank: impl Into<String>) {
        self.ranks.insert(rank.into());
    }

    pub fn remove_rank(&mut self, rank: &str) -> bool {
        self.ranks.remove(rank)
    }

    pub fn ranks(&self) -> impl Iterator<Item = &str> {
        self.ranks.iter().map(String::as_str)
    }

    pub fn has_node(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    pub fn grant_node(&mut self, node: impl Into<String>) {
        self.nodes.insert(node.into());
    }

    pub fn revoke_node(&mut self, node: &str) -> bool {
        self.nodes.remove(node)
    }
}
