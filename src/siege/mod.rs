//! Siege sessions and the conquest protocol

pub mod resolution;
pub mod session;

pub use resolution::{
    attacker_victory, defender_victory, handle_surrender_marker, join_siege, open_siege,
    process_surrender_request, withdraw_from_siege, SURRENDER_NODE,
};
pub use session::{SiegeSession, SiegeStatus};
