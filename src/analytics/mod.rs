//! L4 — for each pool discovered from the staking registry: load LP pair
//! metadata + registry data, price it via L1, and derive TVL/APRs. Runs
//! only inside the pool cache refresh loop (L5); never called from a user
//! request path directly.

pub mod apr;

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::chain::{Chain, ChainClient};
use crate::model::decimal::to_f64_lossy;
use crate::model::pool::{AprValue, GardenPool};
use crate::pricegraph::{PriceGraph, PricedPool};

use self::apr::{fee_apr, emission_apr, pair_tvl, quest_apr_range, staked_tvl, QuestAprStrategy};

/// Window a 24h-style log scan walks back from the current block tip,
/// assuming this chain's ~2s block time.
pub const BLOCKS_PER_DAY: u64 = 43_200;

/// Pools whose pair name matches a configured allowlist are treated as
/// deprecated and skipped, same as `archived`. The canonical source of
/// "deprecated" pools is not defined upstream, so this is data, not code.
#[derive(Debug, Clone, Default)]
pub struct DeprecatedPoolAllowlist(pub Vec<String>);

impl DeprecatedPoolAllowlist {
    pub fn is_deprecated(&self, pair_name: &str) -> bool {
        let normalized = crate::model::pool::normalize_search_key(pair_name);
        self.0.iter().any(|d| normalized.contains(&crate::model::pool::normalize_search_key(d)))
    }
}

pub struct PoolAnalyticsBuilder {
    pub chain_client: Arc<ChainClient>,
    pub price_graph: Arc<PriceGraph>,
    pub quest_strategy: Box<dyn QuestAprStrategy>,
    pub deprecated: DeprecatedPoolAllowlist,
}

/// Raw per-pool facts gathered before pricing, the unit the builder pages
/// through the staking registry with.
#[derive(Debug, Clone)]
pub struct PoolFacts {
    pub pid: u32,
    pub chain: Chain,
    pub pair_name: String,
    pub lp_token_address: String,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub token0_address: String,
    pub token1_address: String,
    pub decimals0: u8,
    pub decimals1: u8,
    pub reserve0: Decimal,
    pub reserve1: Decimal,
    pub total_supply: Decimal,
    pub total_staked: Decimal,
    pub alloc_point: u64,
    pub total_alloc_point: u64,
    /// Raw per-token `Swap` volume over the last `BLOCKS_PER_DAY` blocks,
    /// priced through the graph at build time (the graph itself is built
    /// from these same facts' reserves, so USD conversion can't happen
    /// any earlier than `build_one`).
    pub volume0_24h: Decimal,
    pub volume1_24h: Decimal,
    /// Reward token distributed via `RewardCollected` over the same
    /// window, plus the token address it's priced through.
    pub reward_token_address: String,
    pub reward_24h: Decimal,
    pub archived: bool,
}

impl PoolAnalyticsBuilder {
    /// Builds one `GardenPool` cache entry per pool fact, pricing each
    /// through the shared price graph. Pools unreachable in the graph are
    /// flagged `N/A`, not silently zeroed.
    pub fn build(&self, facts: &[PoolFacts], price_graph: &crate::pricegraph::PriceGraphSnapshot) -> Vec<GardenPool> {
        let now = Utc::now();
        facts
            .iter()
            .filter(|f| !f.archived && !self.deprecated.is_deprecated(&f.pair_name))
            .map(|f| self.build_one(f, price_graph, now))
            .collect()
    }

    fn build_one(&self, f: &PoolFacts, prices: &crate::pricegraph::PriceGraphSnapshot, now: chrono::DateTime<Utc>) -> GardenPool {
        let price0 = prices.price_of(&f.token0_address).and_then(price_to_decimal);
        let price1 = prices.price_of(&f.token1_address).and_then(price_to_decimal);
        let reward_price = prices.price_of(&f.reward_token_address).and_then(price_to_decimal);
        let reachable = price0.is_some() && price1.is_some();

        let (tvl, v2_tvl, volume_24h_usd, fee, emission, quest) = match (price0, price1) {
            (Some(p0), Some(p1)) => {
                let tvl = staked_tvl(f.reserve0, p0, f.reserve1, p1, f.total_staked, f.total_supply);
                let v2_tvl = pair_tvl(f.reserve0, p0, f.reserve1, p1);
                let volume_24h_usd = f.volume0_24h * p0 + f.volume1_24h * p1;
                let reward_usd_24h = reward_price.map(|rp| f.reward_24h * rp).unwrap_or(Decimal::ZERO);
                let fee = fee_apr(volume_24h_usd, tvl);
                let emission = emission_apr(reward_usd_24h, tvl);
                let tvl_f64 = to_f64_lossy(tvl);
                let tvl_per_hero = if tvl_f64 > 0.0 { tvl_f64 / 10.0 } else { 0.0 };
                let quest = quest_apr_range(self.quest_strategy.as_ref(), to_f64_lossy(reward_usd_24h) / 365.0, tvl_per_hero);
                (tvl, v2_tvl, volume_24h_usd, fee, emission, quest)
            }
            _ => (
                Decimal::ZERO,
                Decimal::ZERO,
                Decimal::ZERO,
                AprValue::NotApplicable,
                AprValue::NotApplicable,
                crate::model::pool::QuestAprRange { worst: 0.0, best: 0.0 },
            ),
        };

        GardenPool {
            pid: f.pid,
            pair_name: f.pair_name.clone(),
            lp_token_address: f.lp_token_address.clone(),
            token0_symbol: f.token0_symbol.clone(),
            token1_symbol: f.token1_symbol.clone(),
            reserve0: f.reserve0,
            reserve1: f.reserve1,
            total_staked_lp: f.total_staked,
            alloc_share: if f.total_alloc_point > 0 {
                f.alloc_point as f64 / f.total_alloc_point as f64
            } else {
                0.0
            },
            fee_apr: fee,
            emission_apr: emission,
            quest_apr: quest,
            tvl,
            v2_tvl,
            volume_24h: volume_24h_usd,
            fees_24h: volume_24h_usd * Decimal::new(25, 4),
            last_refreshed_at: now,
            reachable_in_price_graph: reachable,
            archived: f.archived,
        }
    }

    /// Turns raw pool facts into the price graph's generic pool input.
    /// The graph itself still walks reserve ratios in `f64` (unaffected by
    /// how precisely a single pool's TVL is computed); this is the one
    /// place a `Decimal` reserve is converted for that purpose.
    pub fn to_priced_pools(facts: &[PoolFacts]) -> Vec<PricedPool> {
        facts
            .iter()
            .map(|f| PricedPool {
                token0: f.token0_address.clone(),
                token1: f.token1_address.clone(),
                reserve0: to_f64_lossy(f.reserve0),
                reserve1: to_f64_lossy(f.reserve1),
                decimals0: f.decimals0,
                decimals1: f.decimals1,
            })
            .collect()
    }
}

/// The price graph hands back `f64` (it's a ratio-propagating BFS, not a
/// ledger value); converting it to `Decimal` right before it touches
/// reserves keeps the TVL/APR arithmetic itself entirely `Decimal`.
fn price_to_decimal(price: f64) -> Option<Decimal> {
    Decimal::try_from(price).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::apr::DefaultQuestAprStrategy;
    use crate::pricegraph::PriceGraphSnapshot;
    use std::collections::HashMap as Map;

    fn strategy() -> Box<dyn QuestAprStrategy> {
        Box::new(DefaultQuestAprStrategy::default())
    }

    fn fact() -> PoolFacts {
        PoolFacts {
            pid: 1,
            chain: Chain::Serendale,
            pair_name: "JEWEL-USDC".into(),
            lp_token_address: "0xlp".into(),
            token0_symbol: "JEWEL".into(),
            token1_symbol: "USDC".into(),
            token0_address: "jewel".into(),
            token1_address: "usdc".into(),
            decimals0: 18,
            decimals1: 6,
            reserve0: Decimal::from(1000),
            reserve1: Decimal::from(1000),
            total_supply: Decimal::from(1000),
            total_staked: Decimal::from(500),
            alloc_point: 10,
            total_alloc_point: 100,
            volume0_24h: Decimal::from(500),
            volume1_24h: Decimal::from(500),
            reward_token_address: "crystal".into(),
            reward_24h: Decimal::from(50),
            archived: false,
        }
    }

    #[test]
    fn unreachable_pool_is_flagged_not_zeroed() {
        let mut prices = Map::new();
        prices.insert("usdc".to_string(), 1.0);
        let snap = PriceGraphSnapshot { prices, built_at: Utc::now() };
        let builder = PoolAnalyticsBuilder {
            chain_client: Arc::new(ChainClient::new(Map::new(), "0x0000000000000000000000000000000000000001").unwrap()),
            price_graph: Arc::new(PriceGraph::new("usdc".into(), vec![])),
            quest_strategy: strategy(),
            deprecated: DeprecatedPoolAllowlist::default(),
        };
        let pools = builder.build(&[fact()], &snap);
        assert_eq!(pools.len(), 1);
        assert!(!pools[0].reachable_in_price_graph);
        assert_eq!(pools[0].fee_apr.as_percent(), None);
    }

    #[test]
    fn archived_pools_are_skipped() {
        let mut prices = Map::new();
        prices.insert("usdc".to_string(), 1.0);
        prices.insert("jewel".to_string(), 1.0);
        let snap = PriceGraphSnapshot { prices, built_at: Utc::now() };
        let mut f = fact();
        f.archived = true;
        let builder = PoolAnalyticsBuilder {
            chain_client: Arc::new(ChainClient::new(Map::new(), "0x0000000000000000000000000000000000000001").unwrap()),
            price_graph: Arc::new(PriceGraph::new("usdc".into(), vec![])),
            quest_strategy: strategy(),
            deprecated: DeprecatedPoolAllowlist::default(),
        };
        let pools = builder.build(&[f], &snap);
        assert!(pools.is_empty());
    }

    #[test]
    fn swap_and_reward_activity_produce_nonzero_apr() {
        let mut prices = Map::new();
        prices.insert("usdc".to_string(), 1.0);
        prices.insert("jewel".to_string(), 1.0);
        prices.insert("crystal".to_string(), 2.0);
        let snap = PriceGraphSnapshot { prices, built_at: Utc::now() };
        let builder = PoolAnalyticsBuilder {
            chain_client: Arc::new(ChainClient::new(Map::new(), "0x0000000000000000000000000000000000000001").unwrap()),
            price_graph: Arc::new(PriceGraph::new("usdc".into(), vec![])),
            quest_strategy: strategy(),
            deprecated: DeprecatedPoolAllowlist::default(),
        };
        let pools = builder.build(&[fact()], &snap);
        assert_eq!(pools.len(), 1);
        assert!(pools[0].fee_apr.as_percent().unwrap() > 0.0);
        assert!(pools[0].emission_apr.as_percent().unwrap() > 0.0);
        assert!(pools[0].volume_24h > Decimal::ZERO);
    }
}
