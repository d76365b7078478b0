//! Territory: claims, claim groups and the concurrent coordinate index

pub mod claim;
pub mod index;

pub use claim::{Claim, ClaimGroup, ClaimKind};
pub use index::TerritoryIndex;
