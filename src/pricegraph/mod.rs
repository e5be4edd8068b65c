//! L1 — BFS propagation of token -> USD prices from a stablecoin anchor
//! over LP-pair reserves. One graph per process, 5-minute TTL; concurrent
//! callers during rebuild share one in-flight build. On failure the
//! previous graph is kept.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use petgraph::graph::{NodeIndex, UnGraph};
use tokio::sync::{Mutex, RwLock};

use crate::error::EngineError;

pub const TTL: Duration = Duration::from_secs(5 * 60);
const DUST_FLOOR: f64 = 1e-6;
const ANCHOR_TOLERANCE: f64 = 0.10;

/// One pool's reserve data as the graph's raw input. Not the full
/// `GardenPool` cache entry -- just what price propagation needs.
#[derive(Debug, Clone)]
pub struct PricedPool {
    pub token0: String,
    pub token1: String,
    pub reserve0: f64,
    pub reserve1: f64,
    pub decimals0: u8,
    pub decimals1: u8,
}

#[derive(Debug, Clone)]
pub struct PriceGraphSnapshot {
    pub prices: HashMap<String, f64>,
    pub built_at: DateTime<Utc>,
}

impl PriceGraphSnapshot {
    pub fn price_of(&self, token: &str) -> Option<f64> {
        self.prices.get(&token.to_lowercase()).copied()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (now - self.built_at).to_std().map(|d| d < TTL).unwrap_or(false)
    }
}

pub struct PriceGraph {
    anchor: String,
    anchor_price: f64,
    must_be_priced: Vec<String>,
    current: RwLock<Option<Arc<PriceGraphSnapshot>>>,
    build_lock: Mutex<()>,
}

impl PriceGraph {
    pub fn new(anchor: String, must_be_priced: Vec<String>) -> Self {
        PriceGraph {
            anchor: anchor.to_lowercase(),
            anchor_price: 1.0,
            must_be_priced: must_be_priced.into_iter().map(|s| s.to_lowercase()).collect(),
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub async fn current(&self) -> Option<Arc<PriceGraphSnapshot>> {
        self.current.read().await.clone()
    }

    /// Returns a fresh-enough snapshot, rebuilding if necessary. Concurrent
    /// callers serialize on `build_lock`; whichever caller arrives second
    /// observes the first caller's fresh result and skips rebuilding.
    pub async fn get_or_build(&self, pools: &[PricedPool], now: DateTime<Utc>) -> Result<Arc<PriceGraphSnapshot>, EngineError> {
        if let Some(snap) = self.current().await {
            if snap.is_fresh(now) {
                return Ok(snap);
            }
        }

        let _guard = self.build_lock.lock().await;
        if let Some(snap) = self.current().await {
            if snap.is_fresh(now) {
                return Ok(snap);
            }
        }

        match self.build(pools, now) {
            Ok(fresh) => {
                let fresh = Arc::new(fresh);
                *self.current.write().await = Some(fresh.clone());
                Ok(fresh)
            }
            Err(e) => {
                tracing::warn!(error = %e, "price graph rebuild failed, keeping previous graph");
                self.current().await.ok_or(e)
            }
        }
    }

    fn build(&self, pools: &[PricedPool], now: DateTime<Utc>) -> Result<PriceGraphSnapshot, EngineError> {
        let mut graph = UnGraph::<String, ()>::new_undirected();
        let mut node_of: HashMap<String, NodeIndex> = HashMap::new();
        let mut adjacency: HashMap<NodeIndex, Vec<&PricedPool>> = HashMap::new();

        let mut node_for = |token: &str, graph: &mut UnGraph<String, ()>, node_of: &mut HashMap<String, NodeIndex>| -> NodeIndex {
            let key = token.to_lowercase();
            *node_of.entry(key.clone()).or_insert_with(|| graph.add_node(key))
        };

        for pool in pools {
            if pool.reserve0 < DUST_FLOOR || pool.reserve1 < DUST_FLOOR {
                continue;
            }
            let a = node_for(&pool.token0, &mut graph, &mut node_of);
            let b = node_for(&pool.token1, &mut graph, &mut node_of);
            graph.add_edge(a, b, ());
            adjacency.entry(a).or_default().push(pool);
            adjacency.entry(b).or_default().push(pool);
        }

        let Some(&anchor_idx) = node_of.get(&self.anchor) else {
            return Err(EngineError::PermanentUpstream(format!(
                "anchor token {} not present in any pool",
                self.anchor
            )));
        };

        let mut prices: HashMap<String, f64> = HashMap::new();
        prices.insert(self.anchor.clone(), self.anchor_price);

        let mut queue = VecDeque::new();
        queue.push_back(anchor_idx);
        let mut visited = vec![false; graph.node_count()];
        visited[anchor_idx.index()] = true;

        while let Some(current) = queue.pop_front() {
            let current_token = graph[current].clone();
            let Some(current_price) = prices.get(&current_token).copied() else { continue };
            let Some(edges) = adjacency.get(&current) else { continue };

            for pool in edges {
                let (self_is_0, other_token, self_reserve, other_reserve, self_decimals, other_decimals) =
                    if pool.token0.to_lowercase() == current_token {
                        (true, pool.token1.to_lowercase(), pool.reserve0, pool.reserve1, pool.decimals0, pool.decimals1)
                    } else {
                        (false, pool.token0.to_lowercase(), pool.reserve1, pool.reserve0, pool.decimals1, pool.decimals0)
                    };
                let _ = self_is_0;
                if prices.contains_key(&other_token) {
                    continue;
                }
                if self_reserve < DUST_FLOOR || other_reserve < DUST_FLOOR {
                    continue;
                }
                let decimal_scale = 10f64.powi(other_decimals as i32 - self_decimals as i32);
                let implied = self_reserve * current_price / other_reserve * decimal_scale;
                if implied.is_finite() && implied > 0.0 {
                    prices.insert(other_token.clone(), implied);
                    if let Some(&idx) = node_of.get(&other_token) {
                        if !visited[idx.index()] {
                            visited[idx.index()] = true;
                            queue.push_back(idx);
                        }
                    }
                }
            }
        }

        self.validate(&prices)?;
        Ok(PriceGraphSnapshot { prices, built_at: now })
    }

    fn validate(&self, prices: &HashMap<String, f64>) -> Result<(), EngineError> {
        let anchor_price = prices.get(&self.anchor).copied().unwrap_or(0.0);
        if (anchor_price - 1.0).abs() > ANCHOR_TOLERANCE {
            return Err(EngineError::PermanentUpstream(format!(
                "anchor price {anchor_price} outside +-10% of $1.00"
            )));
        }
        for required in &self.must_be_priced {
            match prices.get(required) {
                Some(p) if p.is_finite() && *p > 0.0 => {}
                _ => {
                    return Err(EngineError::PermanentUpstream(format!(
                        "required token {required} has no positive finite price in the graph"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(t0: &str, t1: &str, r0: f64, r1: f64) -> PricedPool {
        PricedPool {
            token0: t0.into(),
            token1: t1.into(),
            reserve0: r0,
            reserve1: r1,
            decimals0: 18,
            decimals1: 18,
        }
    }

    #[tokio::test]
    async fn propagates_price_across_two_hops() {
        let graph = PriceGraph::new("usdc".into(), vec!["jewel".into()]);
        let pools = vec![pool("usdc", "one", 1000.0, 2000.0), pool("one", "jewel", 1000.0, 500.0)];
        let now = Utc::now();
        let snap = graph.get_or_build(&pools, now).await.unwrap();
        assert!((snap.price_of("usdc").unwrap() - 1.0).abs() < 1e-9);
        // one = usdc_reserve * 1.0 / one_reserve = 1000/2000 = 0.5
        assert!((snap.price_of("one").unwrap() - 0.5).abs() < 1e-9);
        // jewel = one_reserve * 0.5 / jewel_reserve = 1000*0.5/500 = 1.0
        assert!((snap.price_of("jewel").unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rejects_graph_when_required_token_unreachable() {
        let graph = PriceGraph::new("usdc".into(), vec!["jewel".into()]);
        let pools = vec![pool("usdc", "one", 1000.0, 2000.0)];
        let now = Utc::now();
        let result = graph.get_or_build(&pools, now).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn keeps_previous_graph_on_rebuild_failure() {
        let graph = PriceGraph::new("usdc".into(), vec!["jewel".into()]);
        let good_pools = vec![pool("usdc", "one", 1000.0, 2000.0), pool("one", "jewel", 1000.0, 500.0)];
        let now = Utc::now();
        let first = graph.get_or_build(&good_pools, now).await.unwrap();

        let broken_pools = vec![pool("usdc", "one", 1000.0, 2000.0)];
        let later = now + chrono::Duration::seconds(TTL.as_secs() as i64 + 1);
        let second = graph.get_or_build(&broken_pools, later).await.unwrap();
        assert_eq!(second.prices, first.prices);
    }
}
