//! Integration tests for the siege state machine and conquest protocol

use std::sync::Arc;

use demesne::core::types::{ActorId, Coordinate, FederationId, Location, PolityId, WorldId};
use demesne::services::{MemoryLedger, MemoryPersistence, Notice, RecordingNotifier};
use demesne::siege::{self, SiegeStatus, SURRENDER_NODE};
use demesne::territory::ClaimKind;
use demesne::{DemesneError, RealmConfig, Universe};

struct Realm {
    universe: Universe,
    persistence: Arc<MemoryPersistence>,
    notifier: Arc<RecordingNotifier>,
    defender: PolityId,
    defender_actor: ActorId,
    invaders: FederationId,
    invader_capital: PolityId,
}

fn coord(x: i32, z: i32) -> Coordinate {
    Coordinate::new(WorldId(0), x, z)
}

fn inside(coord: Coordinate) -> Location {
    Location::new(
        coord.world,
        (coord.x * 16 + 8) as f64,
        64.0,
        (coord.z * 16 + 8) as f64,
    )
}

/// A defended polity with three claims, one member holding the surrender
/// node, and a rival federation besieging it
fn besieged_realm() -> Realm {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let persistence = Arc::new(MemoryPersistence::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let universe = Universe::new(
        RealmConfig::default(),
        Arc::clone(&persistence) as Arc<dyn demesne::services::Persistence>,
        Arc::new(MemoryLedger::new()),
        Arc::clone(&notifier) as Arc<dyn demesne::services::Notifier>,
    )
    .unwrap();

    let defender_actor = universe.register_actor("stalwart");
    let defender = universe.create_polity("Riverhold", defender_actor).unwrap();
    universe.grant_node(defender_actor, SURRENDER_NODE).unwrap();
    universe.claim(defender, coord(0, 0), ClaimKind::Plain).unwrap();
    universe.claim(defender, coord(0, 1), ClaimKind::Commercial).unwrap();
    universe.claim(defender, coord(1, 0), ClaimKind::Plain).unwrap();

    let invader_founder = universe.register_actor("warlord");
    let invader_capital = universe.create_polity("Ironmarch", invader_founder).unwrap();
    universe
        .claim(invader_capital, coord(40, 40), ClaimKind::Plain)
        .unwrap();
    let invaders = universe.create_federation("Iron Pact", invader_capital).unwrap();

    siege::open_siege(&universe, defender, vec![invaders]).unwrap();

    Realm {
        universe,
        persistence,
        notifier,
        defender,
        defender_actor,
        invaders,
        invader_capital,
    }
}

#[test]
fn test_surrender_transfers_territory_and_announces() {
    let realm = besieged_realm();
    let marker = inside(coord(0, 0));

    let stood = siege::handle_surrender_marker(&realm.universe, realm.defender_actor, marker);
    assert!(stood);

    // Claims pass wholesale to the winning federation's capital, kinds intact.
    let transferred = realm.universe.territory().lookup(&coord(0, 1)).unwrap();
    assert_eq!(transferred.owner, realm.invader_capital);
    assert_eq!(transferred.kind, ClaimKind::Commercial);

    let defender_arc = realm.universe.polity(realm.defender).unwrap();
    assert_eq!(defender_arc.lock().claim_count(), 0);
    assert!(defender_arc.lock().is_conquered());

    let capital_arc = realm.universe.polity(realm.invader_capital).unwrap();
    assert_eq!(capital_arc.lock().claim_count(), 4);

    // The terminal outcome was stored and the session retired.
    assert_eq!(realm.persistence.counts().siege_outcomes, 1);
    assert!(realm.universe.siege(realm.defender).is_none());

    // The announcement names the defender and the winning federation.
    let broadcasts = realm.notifier.broadcasts();
    assert!(broadcasts
        .iter()
        .any(|b| b.contains("Riverhold") && b.contains("Iron Pact")));
}

#[test]
fn test_surrender_with_multiple_attackers_is_rejected() {
    let realm = besieged_realm();

    let second_founder = realm.universe.register_actor("opportunist");
    let second_capital = realm
        .universe
        .create_polity("Greyspire", second_founder)
        .unwrap();
    let second_fed = realm
        .universe
        .create_federation("Grey Compact", second_capital)
        .unwrap();
    siege::join_siege(&realm.universe, realm.defender, second_fed).unwrap();

    let err = siege::process_surrender_request(
        &realm.universe,
        realm.defender_actor,
        inside(coord(0, 0)),
    )
    .unwrap_err();
    assert!(matches!(err, DemesneError::AmbiguousOutcome(_)));

    // No state change: the session stays in progress, territory stays put.
    let session = realm.universe.siege(realm.defender).unwrap();
    assert_eq!(session.lock().status(), SiegeStatus::InProgress);
    assert_eq!(
        realm.universe.territory().lookup(&coord(0, 0)).unwrap().owner,
        realm.defender
    );
    assert_eq!(realm.persistence.counts().siege_outcomes, 0);
}

#[test]
fn test_surrender_requires_membership_and_node() {
    let realm = besieged_realm();
    let marker = inside(coord(0, 0));

    // An outsider cannot surrender someone else's polity.
    let outsider = realm.universe.register_actor("meddler");
    realm.universe.grant_node(outsider, SURRENDER_NODE).unwrap();
    let err =
        siege::process_surrender_request(&realm.universe, outsider, marker).unwrap_err();
    assert!(matches!(err, DemesneError::NotRegistered(_)));

    // A member without the node is denied.
    let unprivileged = realm.universe.register_actor("peasant");
    realm.universe.add_member(realm.defender, unprivileged).unwrap();
    let err =
        siege::process_surrender_request(&realm.universe, unprivileged, marker).unwrap_err();
    assert!(matches!(err, DemesneError::PermissionDenied(_)));

    // The rejected marker placement asks to be reversed and the actor is
    // told why.
    let stood = siege::handle_surrender_marker(&realm.universe, unprivileged, marker);
    assert!(!stood);
    assert!(realm
        .notifier
        .notices()
        .iter()
        .any(|n| matches!(n, Notice::Actor(id, _) if *id == unprivileged)));

    assert_eq!(
        realm.universe.siege(realm.defender).unwrap().lock().status(),
        SiegeStatus::InProgress
    );
}

#[test]
fn test_surrender_without_active_siege_is_rejected() {
    let realm = besieged_realm();
    siege::defender_victory(&realm.universe, realm.defender).unwrap();

    let err = siege::process_surrender_request(
        &realm.universe,
        realm.defender_actor,
        inside(coord(0, 0)),
    )
    .unwrap_err();
    assert!(matches!(err, DemesneError::InvalidAction(_)));
}

#[test]
fn test_terminal_save_failure_escalates() {
    let realm = besieged_realm();
    realm.persistence.fail_siege_saves(true);

    let err = siege::process_surrender_request(
        &realm.universe,
        realm.defender_actor,
        inside(coord(0, 0)),
    )
    .unwrap_err();
    assert!(matches!(err, DemesneError::PersistenceFailed(_)));

    // Conquest must not have been applied on top of a divergent record.
    assert_eq!(
        realm.universe.territory().lookup(&coord(0, 0)).unwrap().owner,
        realm.defender
    );
}

#[test]
fn test_last_attacker_withdrawal_abandons_siege() {
    let realm = besieged_realm();

    siege::withdraw_from_siege(&realm.universe, realm.defender, realm.invaders).unwrap();

    assert!(realm.universe.siege(realm.defender).is_none());
    assert_eq!(realm.persistence.counts().siege_outcomes, 1);
    assert!(realm
        .notifier
        .broadcasts()
        .iter()
        .any(|b| b.contains("abandoned")));

    // The defender keeps everything.
    let defender_arc = realm.universe.polity(realm.defender).unwrap();
    assert_eq!(defender_arc.lock().claim_count(), 3);
    assert!(!defender_arc.lock().is_conquered());
}

#[test]
fn test_attacker_victory_applies_conquest() {
    let realm = besieged_realm();

    siege::attacker_victory(&realm.universe, realm.defender, realm.invaders).unwrap();

    let defender_arc = realm.universe.polity(realm.defender).unwrap();
    assert!(defender_arc.lock().is_conquered());
    assert_eq!(defender_arc.lock().claim_count(), 0);
    assert_eq!(realm.persistence.counts().siege_outcomes, 1);
    assert!(realm.universe.siege(realm.defender).is_none());
}

#[test]
fn test_attacker_victory_requires_active_attacker() {
    let realm = besieged_realm();

    let bystander_founder = realm.universe.register_actor("bystander");
    let bystander_capital = realm
        .universe
        .create_polity("Farwatch", bystander_founder)
        .unwrap();
    let bystander_fed = realm
        .universe
        .create_federation("Far League", bystander_capital)
        .unwrap();

    let err = siege::attacker_victory(&realm.universe, realm.defender, bystander_fed).unwrap_err();
    assert!(matches!(err, DemesneError::NotRegistered(_)));
    assert_eq!(
        realm.universe.siege(realm.defender).unwrap().lock().status(),
        SiegeStatus::InProgress
    );
}

#[test]
fn test_second_siege_on_same_polity_rejected() {
    let realm = besieged_realm();

    let err = siege::open_siege(&realm.universe, realm.defender, vec![realm.invaders]).unwrap_err();
    assert!(matches!(err, DemesneError::AlreadyRegistered(_)));
}

#[test]
fn test_conquest_drops_stale_permission_decisions() {
    let realm = besieged_realm();
    use demesne::core::types::{ActionKind, ResourceKind};

    // The defender's member builds freely at home before the fall.
    let allowed = realm.universe.check_action(
        realm.defender_actor,
        inside(coord(0, 0)),
        ResourceKind(1),
        ActionKind::Build,
    );
    assert!(allowed);

    siege::attacker_victory(&realm.universe, realm.defender, realm.invaders).unwrap();

    // Ownership changed hands, so the cached allow must not survive.
    let allowed = realm.universe.check_action(
        realm.defender_actor,
        inside(coord(0, 0)),
        ResourceKind(1),
        ActionKind::Build,
    );
    assert!(!allowed);
}
