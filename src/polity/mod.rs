//! Polities, their members, federations and leadership succession

pub mod actor;
pub mod federation;
pub mod polity;
pub mod succession;

pub use actor::Actor;
pub use federation::{Federation, FederationChange};
pub use polity::{HomeChange, Polity, RosterChange};
