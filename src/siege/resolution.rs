//! Siege initiation, attacker churn and resolution
//!
//! The surrender path is the only transition triggered by an in-world
//! action (a defender placing the surrender marker). Every validation
//! failure returns before any state changes, and the caller uses the error
//! to reverse the triggering action; success is all-or-nothing through to
//! the durable outcome record.

use crate::core::error::{DemesneError, Result};
use crate::core::types::{ActorId, FederationId, Location, PolityId};
use crate::siege::session::{SiegeSession, SiegeStatus};
use crate::universe::Universe;

/// Permission node required to surrender a besieged polity
pub const SURRENDER_NODE: &str = "demesne.siege.surrender";

/// Open a siege against a polity. At most one session may be active per
/// polity at a time.
pub fn open_siege(
    universe: &Universe,
    defender: PolityId,
    attackers: Vec<FederationId>,
) -> Result<()> {
    universe.polity_ref(defender)?;
    let session = SiegeSession::open(defender, attackers)?;
    universe.register_siege(defender, session)?;

    let name = polity_name(universe, defender);
    universe
        .notifier()
        .broadcast(&format!("{} is under siege", name));
    tracing::info!(polity = defender.0, "siege opened");
    Ok(())
}

/// Add an attacking federation to an in-progress siege
pub fn join_siege(
    universe: &Universe,
    defender: PolityId,
    federation: FederationId,
) -> Result<()> {
    let session_arc = active_session(universe, defender)?;
    session_arc.lock().add_attacker(federation)?;
    tracing::info!(
        polity = defender.0,
        federation = federation.0,
        "attacker joined siege"
    );
    Ok(())
}

/// Withdraw an attacker. The last attacker leaving abandons the siege,
/// which is recorded durably and announced.
pub fn withdraw_from_siege(
    universe: &Universe,
    defender: PolityId,
    federation: FederationId,
) -> Result<()> {
    let session_arc = active_session(universe, defender)?;

    let status = {
        let mut session = session_arc.lock();
        let status = session.remove_attacker(federation)?;
        if status == SiegeStatus::Abandoned {
            record_terminal(universe, &session)?;
        }
        status
    };

    if status == SiegeStatus::Abandoned {
        universe.retire_siege(defender);
        let name = polity_name(universe, defender);
        universe
            .notifier()
            .broadcast(&format!("The siege of {} has been abandoned", name));
        tracing::info!(polity = defender.0, "siege abandoned");
    }
    Ok(())
}

/// Handle a defender placing the surrender marker.
///
/// Valid only when the requester is a member of the besieged polity, holds
/// the surrender permission, the session is in progress, and exactly one
/// federation is attacking; several simultaneous attackers leave no
/// unambiguous winner and the request is rejected. On success the sole
/// attacker is recorded as winner, the outcome is stored durably, conquest
/// is applied and the result announced globally.
pub fn process_surrender_request(
    universe: &Universe,
    actor_id: ActorId,
    marker: Location,
) -> Result<()> {
    let coord = marker.coordinate(universe.config().cell_size);
    let claim = universe.territory().lookup(&coord).ok_or_else(|| {
        DemesneError::InvalidLocation("the surrender marker is not within a polity".into())
    })?;
    let defender = claim.owner;

    {
        let actor_arc = universe.actor_ref(actor_id)?;
        let actor = actor_arc.lock();
        match actor.polity() {
            Some(polity) if polity == defender => {}
            Some(_) => {
                return Err(DemesneError::NotRegistered(
                    "you can only surrender your own polity".into(),
                ))
            }
            None => {
                return Err(DemesneError::NotRegistered(
                    "you are not a member of any polity".into(),
                ))
            }
        }
        if !actor.has_node(SURRENDER_NODE) {
            return Err(DemesneError::PermissionDenied(
                "you are not permitted to surrender this polity".into(),
            ));
        }
    }

    let session_arc = active_session(universe, defender)?;
    let winner = {
        let mut session = session_arc.lock();
        let winner = session.sole_attacker()?;
        session.complete(SiegeStatus::DefenderSurrender, Some(winner))?;
        record_terminal(universe, &session)?;
        winner
    };

    universe.retire_siege(defender);
    universe.apply_conquest(defender, winner)?;

    let defender_name = polity_name(universe, defender);
    let winner_name = federation_name(universe, winner);
    universe
        .notifier()
        .broadcast(&format!("{} has surrendered to {}", defender_name, winner_name));
    tracing::info!(
        polity = defender.0,
        federation = winner.0,
        "siege ended in surrender"
    );
    Ok(())
}

/// Event-source entry point for surrender marker placement: validates the
/// request, messaging the actor and asking for the world action to be
/// reversed when it fails. Returns whether the placement may stand.
pub fn handle_surrender_marker(universe: &Universe, actor: ActorId, marker: Location) -> bool {
    match process_surrender_request(universe, actor, marker) {
        Ok(()) => true,
        Err(e) => {
            universe.notifier().message(actor, &e.to_string());
            false
        }
    }
}

/// Resolve a siege in the attackers' favor. `winner` must be one of the
/// active attacking federations.
pub fn attacker_victory(
    universe: &Universe,
    defender: PolityId,
    winner: FederationId,
) -> Result<()> {
    let session_arc = active_session(universe, defender)?;

    {
        let mut session = session_arc.lock();
        if !session.attackers().contains(&winner) {
            return Err(DemesneError::NotRegistered(
                "the winning federation is not besieging this polity".into(),
            ));
        }
        session.complete(SiegeStatus::AttackerWin, Some(winner))?;
        record_terminal(universe, &session)?;
    }

    universe.retire_siege(defender);
    universe.apply_conquest(defender, winner)?;

    let defender_name = polity_name(universe, defender);
    let winner_name = federation_name(universe, winner);
    universe
        .notifier()
        .broadcast(&format!("{} has fallen to {}", defender_name, winner_name));
    tracing::info!(polity = defender.0, federation = winner.0, "siege won by attacker");
    Ok(())
}

/// Resolve a siege in the defender's favor
pub fn defender_victory(universe: &Universe, defender: PolityId) -> Result<()> {
    let session_arc = active_session(universe, defender)?;

    {
        let mut session = session_arc.lock();
        session.complete(SiegeStatus::DefenderWin, None)?;
        record_terminal(universe, &session)?;
    }

    universe.retire_siege(defender);
    let name = polity_name(universe, defender);
    universe
        .notifier()
        .broadcast(&format!("{} has repelled its besiegers", name));
    tracing::info!(polity = defender.0, "siege won by defender");
    Ok(())
}

fn active_session(
    universe: &Universe,
    defender: PolityId,
) -> Result<std::sync::Arc<parking_lot::Mutex<SiegeSession>>> {
    universe
        .siege(defender)
        .ok_or_else(|| DemesneError::InvalidAction("this polity is not under siege".into()))
}

/// Store a terminal outcome, escalating on failure. An unstored terminal
/// state leaves the durable record behind the in-memory one, so this is
/// logged as critical and surfaced instead of swallowed.
fn record_terminal(universe: &Universe, session: &SiegeSession) -> Result<()> {
    if let Err(e) = universe.persistence().save_siege_outcome(session) {
        tracing::error!(
            polity = session.defender.0,
            "CRITICAL: siege outcome could not be recorded durably: {}",
            e
        );
        return Err(DemesneError::PersistenceFailed(format!(
            "siege outcome for polity {} not recorded: {}",
            session.defender.0, e
        )));
    }
    Ok(())
}

fn polity_name(universe: &Universe, polity: PolityId) -> String {
    universe
        .polity(polity)
        .map(|arc| arc.lock().name.clone())
        .unwrap_or_else(|| format!("polity {}", polity.0))
}

fn federation_name(universe: &Universe, federation: FederationId) -> String {
    universe
        .federation(federation)
        .map(|arc| arc.lock().name.clone())
        .unwrap_or_else(|| format!("federation {}", federation.0))
}
