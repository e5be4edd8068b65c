use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Free-tier query types bypass the multiplier chain entirely and return
/// `0` tagged `free_tier`.
pub const FREE_TIER_QUERY_TYPES: &[&str] = &["nav", "garden_basic", "summon"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingModifiers {
    pub new_player_threshold: Decimal,
    pub new_player_discount: Decimal,
    pub whale_threshold: Decimal,
    pub whale_priority_multiplier: Decimal,
    /// UTC hours (0..24) considered peak.
    pub peak_hours: Vec<u8>,
    pub peak_multiplier: Decimal,
}

impl Default for PricingModifiers {
    fn default() -> Self {
        PricingModifiers {
            new_player_threshold: Decimal::from(100),
            new_player_discount: Decimal::new(25, 2), // 0.25
            whale_threshold: Decimal::from(10_000),
            whale_priority_multiplier: Decimal::new(150, 2), // 1.5
            peak_hours: vec![18, 19, 20, 21, 22],
            peak_multiplier: Decimal::new(120, 2), // 1.2
        }
    }
}

/// A versioned key/value record. Cached in memory with a 60-second TTL per
/// the "hot-reload" design note: modeled as an atomic pointer to an
/// immutable value, republished by the reloader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub version: u32,
    pub base_rates: HashMap<String, Decimal>,
    pub modifiers: PricingModifiers,
}

impl PricingConfig {
    pub fn is_free_tier(query_type: &str) -> bool {
        FREE_TIER_QUERY_TYPES.contains(&query_type)
    }

    pub fn base_rate(&self, query_type: &str) -> Option<Decimal> {
        self.base_rates.get(query_type).copied()
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        let mut base_rates = HashMap::new();
        base_rates.insert("optimization".to_string(), Decimal::from(25));
        base_rates.insert("deep_analysis".to_string(), Decimal::from(50));
        base_rates.insert("nav".to_string(), Decimal::ZERO);
        base_rates.insert("garden_basic".to_string(), Decimal::ZERO);
        base_rates.insert("summon".to_string(), Decimal::ZERO);
        PricingConfig {
            version: 1,
            base_rates,
            modifiers: PricingModifiers::default(),
        }
    }
}
