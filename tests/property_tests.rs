//! Property tests for the claim cost schedule and the territory index

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use demesne::core::types::{Coordinate, PolityId, WorldId};
use demesne::services::{MemoryLedger, MemoryPersistence, RecordingNotifier};
use demesne::territory::{Claim, ClaimKind, TerritoryIndex};
use demesne::{RealmConfig, Universe};

fn universe_with_pricing(base: f64, growth: f64) -> Universe {
    let config = RealmConfig {
        claim_base_price: base,
        claim_price_growth: growth,
        ..RealmConfig::default()
    };
    Universe::new(
        config,
        Arc::new(MemoryPersistence::new()),
        Arc::new(MemoryLedger::new()),
        Arc::new(RecordingNotifier::new()),
    )
    .unwrap()
}

fn coord(x: i32, z: i32) -> Coordinate {
    Coordinate::new(WorldId(0), x, z)
}

proptest! {
    /// Claiming n1+n2 cells costs the same whether quoted at once or in two
    /// consecutive quotes. Terms are integer-valued after rounding, so the
    /// sums are exact.
    #[test]
    fn prop_claim_cost_is_additive(
        count in 0i32..15,
        n1 in 0i32..8,
        n2 in 0i32..8,
        base in 1u32..500,
        growth in 1.0f64..1.3,
    ) {
        let universe = universe_with_pricing(base as f64, growth);
        let founder = universe.register_actor("founder");
        let polity = universe.create_polity("Freehold", founder).unwrap();
        for i in 0..count {
            universe.claim(polity, coord(i, 0), ClaimKind::Plain).unwrap();
        }

        let polity_arc = universe.polity(polity).unwrap();
        let (whole, first) = {
            let p = polity_arc.lock();
            (p.claim_cost(n1 + n2, universe.config()).unwrap(),
             p.claim_cost(n1, universe.config()).unwrap())
        };

        for i in 0..n1 {
            universe.claim(polity, coord(i, 1), ClaimKind::Plain).unwrap();
        }
        let rest = polity_arc.lock().claim_cost(n2, universe.config()).unwrap();

        prop_assert_eq!(whole, first + rest);
    }

    /// The schedule is monotone: quoting one more claim never costs less.
    #[test]
    fn prop_claim_cost_is_monotone(
        count in 0i32..15,
        n in 0i32..12,
        base in 1u32..500,
        growth in 1.0f64..1.3,
    ) {
        let universe = universe_with_pricing(base as f64, growth);
        let founder = universe.register_actor("founder");
        let polity = universe.create_polity("Freehold", founder).unwrap();
        for i in 0..count {
            universe.claim(polity, coord(i, 0), ClaimKind::Plain).unwrap();
        }

        let polity_arc = universe.polity(polity).unwrap();
        let p = polity_arc.lock();
        let shorter = p.claim_cost(n, universe.config()).unwrap();
        let longer = p.claim_cost(n + 1, universe.config()).unwrap();
        prop_assert!(longer >= shorter);
    }

    /// The index agrees with a sequential map model under arbitrary
    /// interleavings of insert and remove.
    #[test]
    fn prop_index_matches_sequential_model(
        ops in prop::collection::vec((0u8..2, -6i32..6, -6i32..6), 0..80),
    ) {
        let index = TerritoryIndex::new(4);
        let mut model: HashMap<Coordinate, PolityId> = HashMap::new();

        for (op, x, z) in ops {
            let at = coord(x, z);
            match op {
                0 => {
                    let inserted = index.insert(Claim::new(at, PolityId(1), ClaimKind::Plain));
                    prop_assert_eq!(inserted.is_ok(), !model.contains_key(&at));
                    model.entry(at).or_insert(PolityId(1));
                }
                _ => {
                    let removed = index.remove(&at);
                    prop_assert_eq!(removed.is_some(), model.remove(&at).is_some());
                }
            }
        }

        for x in -6i32..6 {
            for z in -6i32..6 {
                let at = coord(x, z);
                prop_assert_eq!(
                    index.lookup(&at).map(|c| c.owner),
                    model.get(&at).copied()
                );
            }
        }
        prop_assert_eq!(index.len(), model.len());
    }
}
