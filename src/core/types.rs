//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for actors (players and other agents acting in the world)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for polities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolityId(pub u32);

/// Unique identifier for federations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FederationId(pub u32);

/// Unique identifier for worlds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(pub u32);

/// Unique identifier for claim groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimGroupId(pub Uuid);

impl ClaimGroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClaimGroupId {
    fn default() -> Self {
        Self::new()
    }
}

/// A grid coordinate: the exclusive key into the territory index.
///
/// One coordinate covers a square cell of `cell_size` world units
/// (see `RealmConfig::cell_size`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
}

impl Coordinate {
    pub fn new(world: WorldId, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }

    /// Planar distance to another coordinate, in grid cells.
    ///
    /// The world component is ignored; callers comparing across worlds must
    /// check it themselves.
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dz * dz).sqrt()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.world.0, self.x, self.z)
    }
}

/// A continuous position inside a world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// The grid coordinate containing this location
    pub fn coordinate(&self, cell_size: i32) -> Coordinate {
        Coordinate {
            world: self.world,
            x: (self.x / cell_size as f64).floor() as i32,
            z: (self.z / cell_size as f64).floor() as i32,
        }
    }
}

/// The kind of action an actor attempts at a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Build,
    Destroy,
    Switch,
    ItemUse,
}

impl ActionKind {
    /// Verb label for user-facing denial messages
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Build => "build",
            ActionKind::Destroy => "destroy",
            ActionKind::Switch => "switch",
            ActionKind::ItemUse => "use items",
        }
    }
}

/// Opaque resource discriminator supplied by the event source (block kind,
/// item kind). The core never interprets it beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKind(pub u32);
