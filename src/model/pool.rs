use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A pool's APR is either a real number, an explicit `0%` (zero TVL), or
/// `N/A` (unreachable in the price graph). Keeping this distinction in the
/// type prevents `N/A` and `0%` from ever being conflated downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum AprValue {
    Percent(f64),
    NotApplicable,
}

impl AprValue {
    pub fn zero() -> Self {
        AprValue::Percent(0.0)
    }

    pub fn as_percent(&self) -> Option<f64> {
        match self {
            AprValue::Percent(v) => Some(*v),
            AprValue::NotApplicable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestAprRange {
    pub worst: f64,
    pub best: f64,
}

/// Cache entry for a single pool. Purely derived by the pool analytics
/// builder and the price graph; never partially updated in place (the
/// cache swaps the whole map atomically).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GardenPool {
    pub pid: u32,
    pub pair_name: String,
    pub lp_token_address: String,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub reserve0: Decimal,
    pub reserve1: Decimal,
    pub total_staked_lp: Decimal,
    pub alloc_share: f64,
    pub fee_apr: AprValue,
    pub emission_apr: AprValue,
    pub quest_apr: QuestAprRange,
    pub tvl: Decimal,
    pub v2_tvl: Decimal,
    pub volume_24h: Decimal,
    pub fees_24h: Decimal,
    pub last_refreshed_at: DateTime<Utc>,
    pub reachable_in_price_graph: bool,
    pub archived: bool,
}

impl GardenPool {
    /// The normalized key used for fuzzy pair-name search: lowercased with
    /// `-` and whitespace stripped.
    pub fn search_key(&self) -> String {
        normalize_search_key(&self.pair_name)
    }
}

pub fn normalize_search_key(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_key_strips_separators_and_case() {
        assert_eq!(normalize_search_key("JEWEL - USDC"), "jewelusdc");
        assert_eq!(normalize_search_key("crystal-avax"), "crystalavax");
    }

    #[test]
    fn zero_tvl_apr_is_distinct_from_unreachable() {
        let zero = AprValue::zero();
        let na = AprValue::NotApplicable;
        assert_eq!(zero.as_percent(), Some(0.0));
        assert_eq!(na.as_percent(), None);
    }
}
