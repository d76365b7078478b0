//! Realm configuration with documented constants
//!
//! All tunable numbers are collected here with explanations of their purpose
//! and how they interact with each other.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a realm (one `Universe` instance)
///
/// These values have been tuned for a mid-sized shared world. Changing them
/// affects claim economics and conflict pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    // === SPATIAL SYSTEM ===
    /// Side length of one claimable grid cell, in world units
    ///
    /// Every continuous `Location` is floored onto the grid by this value.
    /// All claims, spawns and permission checks resolve through the
    /// resulting `Coordinate`.
    pub cell_size: i32,

    /// Number of lock shards in the territory index
    ///
    /// Lookups take a read lock on a single shard, so more shards means less
    /// contention between concurrent mutations. Must be non-zero; powers of
    /// two waste no distribution.
    pub index_shards: usize,

    /// Number of lock shards in the permission cache
    pub cache_shards: usize,

    // === CLAIM ECONOMICS ===
    /// Price of a polity's first claim
    ///
    /// The Nth additional claim costs round(base * growth^(count + N)),
    /// each term rounded before summation.
    pub claim_base_price: f64,

    /// Geometric growth factor applied per already-held claim
    ///
    /// 1.0 keeps every claim at the base price. Values above 1.0 make
    /// sprawling polities progressively more expensive.
    pub claim_price_growth: f64,

    /// Price of the first purchased bonus claim
    pub bonus_base_price: f64,

    /// Geometric growth factor for purchased bonus claims
    pub bonus_price_growth: f64,

    /// Hard ceiling on purchased bonus claims per polity
    ///
    /// Purchase requests beyond the ceiling are costed as if only the
    /// remaining headroom were requested.
    pub max_purchased_claims: u32,

    /// Hard ceiling on granted (non-purchased) bonus claims per polity
    pub max_bonus_claims: u32,

    /// Ceiling for every per-plot price a polity may set
    pub max_plot_price: f64,

    /// Ceiling for every per-plot tax a polity may set
    pub max_plot_tax: f64,

    // === POLITY TAXATION ===
    /// Ceiling for the polity tax when it is a percentage
    pub max_tax_percent: f64,

    /// Ceiling for the polity tax when it is a flat amount
    pub max_tax_flat: f64,

    /// Bank balance cap per polity; 0 disables the cap
    ///
    /// Deposits that would push the balance past the cap are skipped
    /// entirely and the polity's members are notified.
    pub bank_cap: f64,

    // === FEDERATION ===
    /// Maximum distance, in grid cells, between a member polity's home and
    /// its federation's capital home; 0 disables the check
    ///
    /// A polity that moves its home beyond this limit (or to another world)
    /// is expelled from its federation as a side effect of the move.
    pub federation_proximity: f64,

    // === SUCCESSION ===
    /// Rank names that define succession priority, highest first
    ///
    /// Members holding none of these ranks come after all ranked members,
    /// in roster order.
    pub succession_ranks: Vec<String>,

    // === WILDERNESS ===
    /// Whether each action kind is allowed on unclaimed coordinates
    pub wilderness: WildernessAccess,
}

/// Per-action access flags for unclaimed territory
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WildernessAccess {
    pub build: bool,
    pub destroy: bool,
    pub switch: bool,
    pub item_use: bool,
}

impl Default for WildernessAccess {
    fn default() -> Self {
        Self {
            build: true,
            destroy: true,
            switch: true,
            item_use: true,
        }
    }
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            // Spatial
            cell_size: 16,
            index_shards: 16,
            cache_shards: 16,

            // Claim economics (flat pricing by default)
            claim_base_price: 100.0,
            claim_price_growth: 1.0,
            bonus_base_price: 25.0,
            bonus_price_growth: 1.2,
            max_purchased_claims: 1000,
            max_bonus_claims: 1000,
            max_plot_price: 1000.0,
            max_plot_tax: 1000.0,

            // Taxation
            max_tax_percent: 25.0,
            max_tax_flat: 1000.0,
            bank_cap: 0.0,

            // Federation
            federation_proximity: 0.0,

            // Succession
            succession_ranks: vec!["assistant".to_string()],

            // Wilderness
            wilderness: WildernessAccess::default(),
        }
    }
}

impl RealmConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let config: RealmConfig =
            toml::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.cell_size <= 0 {
            return Err(format!("cell_size ({}) must be positive", self.cell_size));
        }

        if self.index_shards == 0 || self.cache_shards == 0 {
            return Err("shard counts must be non-zero".into());
        }

        if self.claim_price_growth < 1.0 || self.bonus_price_growth < 1.0 {
            return Err(format!(
                "price growth factors ({}, {}) must be >= 1.0",
                self.claim_price_growth, self.bonus_price_growth
            ));
        }

        if self.claim_base_price < 0.0 || self.bonus_base_price < 0.0 {
            return Err("base prices must be non-negative".into());
        }

        if self.max_tax_percent > 100.0 {
            return Err(format!(
                "max_tax_percent ({}) cannot exceed 100",
                self.max_tax_percent
            ));
        }

        Ok(())
    }
}
