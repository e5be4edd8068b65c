use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Bronze,
    Silver,
    Gold,
    Whale,
}

impl Tier {
    /// Derives the tier from lifetime deposits. `<100 = free`,
    /// `<500 = bronze`, `<2000 = silver`, `<10000 = gold`, `>=10000 = whale`.
    pub fn from_lifetime_deposits(lifetime: Decimal) -> Self {
        let d = |n: i64| Decimal::from(n);
        if lifetime >= d(10_000) {
            Tier::Whale
        } else if lifetime >= d(2_000) {
            Tier::Gold
        } else if lifetime >= d(500) {
            Tier::Silver
        } else if lifetime >= d(100) {
            Tier::Bronze
        } else {
            Tier::Free
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Tier::Free => 0,
            Tier::Bronze => 1,
            Tier::Silver => 2,
            Tier::Gold => 3,
            Tier::Whale => 4,
        }
    }
}

/// One row per player. Both balances are arbitrary-precision decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JewelBalance {
    pub player_id: String,
    pub balance: Decimal,
    pub lifetime_deposits: Decimal,
    pub tier: Tier,
    pub last_deposit_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JewelBalance {
    pub fn new(player_id: String, now: DateTime<Utc>) -> Self {
        JewelBalance {
            player_id,
            balance: Decimal::ZERO,
            lifetime_deposits: Decimal::ZERO,
            tier: Tier::Free,
            last_deposit_at: None,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn tier_thresholds_match_spec_boundaries() {
        assert_eq!(Tier::from_lifetime_deposits(Decimal::from_str("99.99").unwrap()), Tier::Free);
        assert_eq!(Tier::from_lifetime_deposits(Decimal::from(100)), Tier::Bronze);
        assert_eq!(Tier::from_lifetime_deposits(Decimal::from(499)), Tier::Bronze);
        assert_eq!(Tier::from_lifetime_deposits(Decimal::from(500)), Tier::Silver);
        assert_eq!(Tier::from_lifetime_deposits(Decimal::from(1999)), Tier::Silver);
        assert_eq!(Tier::from_lifetime_deposits(Decimal::from(2000)), Tier::Gold);
        assert_eq!(Tier::from_lifetime_deposits(Decimal::from(9999)), Tier::Gold);
        assert_eq!(Tier::from_lifetime_deposits(Decimal::from(10_000)), Tier::Whale);
    }
}
