//! Step 4 of the L9 pipeline: given a player's heroes and the priced pool
//! set, assign up to `N` heroes to pools to maximize expected APR.
//!
//! The exact gardening-factor/stamina/pet-bonus weighting is not pinned
//! upstream (same ambiguity as the pool-level quest-APR range), so the
//! scoring formula is an injected strategy rather than baked-in math —
//! the canonical version can be dropped in later without touching the
//! assignment loop.

use crate::genes::{has_profession_gene, HeroGenes, ProfessionTrait, StatBoostTrait};
use crate::model::pool::GardenPool;

pub const DEFAULT_MAX_ASSIGNMENTS: usize = 10;

/// One hero under consideration: its decoded genetics and the pool it is
/// currently staked in, if any.
#[derive(Debug, Clone)]
pub struct HeroCandidate {
    pub hero_id: u64,
    pub genes: HeroGenes,
    pub current_pid: Option<u32>,
}

pub trait HeroAssignmentStrategy: Send + Sync {
    /// A hero's expected annualized percent return if staked on `pool`,
    /// blending the pool's fee/emission APR with its quest-APR range
    /// weighted by how well this hero's genetics suit gardening.
    fn expected_apr(&self, genes: &HeroGenes, pool: &GardenPool) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct DefaultHeroAssignmentStrategy;

impl DefaultHeroAssignmentStrategy {
    /// 0.0 (bare hero) .. 1.0 (perfect gardener): base rate for any hero,
    /// a large bump for the gardening profession gene, small bumps for
    /// stat-boost traits that favor questing (Vitality, Wisdom).
    fn gardening_factor(&self, genes: &HeroGenes) -> f64 {
        let mut factor: f64 = 0.3;
        if has_profession_gene(&genes.stats, ProfessionTrait::Gardening) {
            factor += 0.5;
        }
        let favors_questing = |t: StatBoostTrait| matches!(t, StatBoostTrait::Vitality | StatBoostTrait::Wisdom);
        if genes.stats.stat_boost1.contains(favors_questing) {
            factor += 0.1;
        }
        if genes.stats.stat_boost2.contains(favors_questing) {
            factor += 0.1;
        }
        factor.min(1.0)
    }
}

impl HeroAssignmentStrategy for DefaultHeroAssignmentStrategy {
    fn expected_apr(&self, genes: &HeroGenes, pool: &GardenPool) -> f64 {
        if !pool.reachable_in_price_graph {
            return 0.0;
        }
        let base = pool.fee_apr.as_percent().unwrap_or(0.0) + pool.emission_apr.as_percent().unwrap_or(0.0);
        let g = self.gardening_factor(genes);
        let quest = pool.quest_apr.worst + (pool.quest_apr.best - pool.quest_apr.worst) * g;
        base + quest
    }
}

#[derive(Debug, Clone)]
pub struct HeroAssignment {
    pub hero_id: u64,
    pub pool_pid: u32,
    pub current_apr: f64,
    pub expected_apr: f64,
    pub delta_apr: f64,
}

/// Assigns each hero its single best pool, ranks heroes by the APR
/// improvement that reassignment would deliver, and keeps the top `max`.
/// Deterministic: equal deltas are broken by ascending hero ID.
pub fn optimize(heroes: &[HeroCandidate], pools: &[GardenPool], max: usize, strategy: &dyn HeroAssignmentStrategy) -> Vec<HeroAssignment> {
    let mut candidates: Vec<HeroAssignment> = heroes
        .iter()
        .filter_map(|hero| {
            let best = pools
                .iter()
                .map(|p| (p, strategy.expected_apr(&hero.genes, p)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

            let current_apr = hero
                .current_pid
                .and_then(|pid| pools.iter().find(|p| p.pid == pid))
                .map(|p| strategy.expected_apr(&hero.genes, p))
                .unwrap_or(0.0);

            Some(HeroAssignment {
                hero_id: hero.hero_id,
                pool_pid: best.0.pid,
                current_apr,
                expected_apr: best.1,
                delta_apr: best.1 - current_apr,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.delta_apr
            .partial_cmp(&a.delta_apr)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.hero_id.cmp(&b.hero_id))
    });
    candidates.truncate(max);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genes::decode_stat_genes;
    use rust_decimal::Decimal;

    const BARE_HERO: &str = "0";
    const GARDENER_HERO: &str =
        "443792905345577883435573444901078008651685812390002810708884933276869006";

    fn pool(pid: u32, fee: f64, emission: f64, quest_worst: f64, quest_best: f64, reachable: bool) -> GardenPool {
        GardenPool {
            pid,
            pair_name: format!("POOL-{pid}"),
            lp_token_address: "0xlp".into(),
            token0_symbol: "A".into(),
            token1_symbol: "B".into(),
            reserve0: Decimal::ZERO,
            reserve1: Decimal::ZERO,
            total_staked_lp: Decimal::ZERO,
            alloc_share: 0.0,
            fee_apr: crate::model::pool::AprValue::Percent(fee),
            emission_apr: crate::model::pool::AprValue::Percent(emission),
            quest_apr: crate::model::pool::QuestAprRange { worst: quest_worst, best: quest_best },
            tvl: Decimal::ZERO,
            v2_tvl: Decimal::ZERO,
            volume_24h: Decimal::ZERO,
            fees_24h: Decimal::ZERO,
            last_refreshed_at: chrono::Utc::now(),
            reachable_in_price_graph: reachable,
            archived: false,
        }
    }

    fn genes(stat: &str) -> HeroGenes {
        crate::genes::decode(stat, "0").unwrap()
    }

    #[test]
    fn unreachable_pools_never_win_the_assignment() {
        let heroes = vec![
            HeroCandidate { hero_id: 1, genes: genes(BARE_HERO), current_pid: None },
        ];
        let pools = vec![pool(1, 50.0, 50.0, 0.0, 0.0, false), pool(2, 5.0, 5.0, 0.0, 0.0, true)];
        let result = optimize(&heroes, &pools, 10, &DefaultHeroAssignmentStrategy);
        assert_eq!(result[0].pool_pid, 2);
    }

    #[test]
    fn gardener_hero_benefits_more_from_quest_apr_range() {
        let bare = HeroCandidate { hero_id: 1, genes: genes(BARE_HERO), current_pid: None };
        let gardener = HeroCandidate { hero_id: 2, genes: genes(GARDENER_HERO), current_pid: None };
        let pools = vec![pool(1, 0.0, 0.0, 10.0, 40.0, true)];
        let result = optimize(&[bare, gardener], &pools, 10, &DefaultHeroAssignmentStrategy);
        let bare_apr = result.iter().find(|a| a.hero_id == 1).unwrap().expected_apr;
        let gardener_apr = result.iter().find(|a| a.hero_id == 2).unwrap().expected_apr;
        assert!(gardener_apr > bare_apr);
    }

    #[test]
    fn ties_break_by_ascending_hero_id() {
        let heroes = vec![
            HeroCandidate { hero_id: 5, genes: genes(BARE_HERO), current_pid: None },
            HeroCandidate { hero_id: 2, genes: genes(BARE_HERO), current_pid: None },
        ];
        let pools = vec![pool(1, 10.0, 0.0, 0.0, 0.0, true)];
        let result = optimize(&heroes, &pools, 10, &DefaultHeroAssignmentStrategy);
        assert_eq!(result[0].hero_id, 2);
        assert_eq!(result[1].hero_id, 5);
    }

    #[test]
    fn truncates_to_max_assignments() {
        let heroes: Vec<HeroCandidate> = (0..15)
            .map(|i| HeroCandidate { hero_id: i, genes: genes(BARE_HERO), current_pid: None })
            .collect();
        let pools = vec![pool(1, 10.0, 0.0, 0.0, 0.0, true)];
        let result = optimize(&heroes, &pools, DEFAULT_MAX_ASSIGNMENTS, &DefaultHeroAssignmentStrategy);
        assert_eq!(result.len(), DEFAULT_MAX_ASSIGNMENTS);
    }
}
