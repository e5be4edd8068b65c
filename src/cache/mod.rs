//! L5 — in-memory pool snapshot with atomic swap, on-disk persistence,
//! staleness guard, and a background refresh scheduler.

pub mod persist;

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::model::pool::GardenPool;

const TIMING_HISTORY_CAP: usize = 10;
const REFRESH_WARN_FACTOR: f64 = 1.5;
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(20 * 60);
const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const WAIT_SAFETY_CEILING: Duration = Duration::from_secs(120);

#[derive(Clone)]
struct CacheData {
    pools: Arc<HashMap<u32, GardenPool>>,
    last_updated: Option<DateTime<Utc>>,
}

impl Default for CacheData {
    fn default() -> Self {
        CacheData { pools: Arc::new(HashMap::new()), last_updated: None }
    }
}

pub struct PoolCache {
    data: RwLock<CacheData>,
    refresh_guard: Mutex<()>,
    timing_history: Mutex<VecDeque<Duration>>,
    disk_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    AlreadyRefreshing,
}

impl PoolCache {
    pub fn new(disk_path: Option<PathBuf>) -> Self {
        PoolCache {
            data: RwLock::new(CacheData::default()),
            refresh_guard: Mutex::new(()),
            timing_history: Mutex::new(VecDeque::with_capacity(TIMING_HISTORY_CAP)),
            disk_path,
        }
    }

    /// Attempts to load a persisted cache from disk at startup. Returns
    /// `true` if a fresh-enough copy was installed.
    pub fn load_from_disk(&self, now: DateTime<Utc>) -> bool {
        let Some(path) = &self.disk_path else { return false };
        match persist::load(path, now) {
            Ok(persisted) => {
                let pools = persisted.data.into_iter().map(|p| (p.pid, p)).collect();
                if let Ok(mut data) = self.data.try_write() {
                    data.pools = Arc::new(pools);
                    data.last_updated = Some(persisted.last_updated);
                }
                true
            }
            Err(e) => {
                tracing::info!(error = %e, "no usable persisted pool cache, will perform synchronous refresh");
                false
            }
        }
    }

    fn persist_to_disk(&self, data: &CacheData, timing: &VecDeque<Duration>) {
        let Some(path) = &self.disk_path else { return };
        let Some(last_updated) = data.last_updated else { return };
        let persisted = persist::PersistedCache {
            version: persist::SCHEMA_VERSION,
            last_updated,
            data: data.pools.values().cloned().collect(),
            timing_history_ms: timing.iter().map(|d| d.as_millis() as u64).collect(),
        };
        if let Err(e) = persist::save(path, &persisted) {
            tracing::warn!(error = %e, "failed to persist pool cache to disk");
        }
    }

    /// Guarded by a try-acquire mutex: if a refresh is already in flight,
    /// returns immediately rather than blocking or running a second
    /// concurrent build.
    pub async fn refresh<F, Fut>(&self, build: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Vec<GardenPool>>>,
    {
        let Ok(_guard) = self.refresh_guard.try_lock() else {
            return RefreshOutcome::AlreadyRefreshing;
        };

        let started = Instant::now();
        match build().await {
            Ok(pools) => {
                let elapsed = started.elapsed();
                let mut timing = self.timing_history.lock().await;
                let rolling_avg = if timing.is_empty() {
                    elapsed
                } else {
                    timing.iter().sum::<Duration>() / timing.len() as u32
                };
                if elapsed.as_secs_f64() > rolling_avg.as_secs_f64() * REFRESH_WARN_FACTOR {
                    tracing::warn!(?elapsed, ?rolling_avg, "pool cache refresh took longer than 1.5x rolling average");
                }
                timing.push_back(elapsed);
                if timing.len() > TIMING_HISTORY_CAP {
                    timing.pop_front();
                }

                let map: HashMap<u32, GardenPool> = pools.into_iter().map(|p| (p.pid, p)).collect();
                let mut data = self.data.write().await;
                data.pools = Arc::new(map);
                data.last_updated = Some(Utc::now());
                self.persist_to_disk(&data, &timing);
            }
            Err(e) => {
                tracing::error!(error = %e, "pool cache refresh failed, keeping previous data");
            }
        }
        RefreshOutcome::Refreshed
    }

    pub async fn get_all(&self) -> Arc<HashMap<u32, GardenPool>> {
        self.data.read().await.pools.clone()
    }

    pub async fn get(&self, pid: u32) -> Option<GardenPool> {
        self.data.read().await.pools.get(&pid).cloned()
    }

    /// Normalizes query and pair name by lowercasing and stripping `[-\s]`.
    pub async fn search(&self, query: &str) -> Vec<GardenPool> {
        let key = crate::model::pool::normalize_search_key(query);
        let pools = self.get_all().await;
        pools.values().filter(|p| p.search_key().contains(&key)).cloned().collect()
    }

    pub async fn is_ready(&self) -> bool {
        !self.data.read().await.pools.is_empty()
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.data.read().await.last_updated
    }

    /// Single-threaded cooperative wait: yields every ~1s and calls `on_wait`
    /// with elapsed seconds, bounded by a safety ceiling.
    pub async fn wait_for_ready<F: Fn(u64)>(&self, on_wait: F) -> bool {
        let start = Instant::now();
        loop {
            if self.is_ready().await {
                return true;
            }
            if start.elapsed() > WAIT_SAFETY_CEILING {
                return false;
            }
            on_wait(start.elapsed().as_secs());
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pool::{AprValue, QuestAprRange};

    fn pool(pid: u32) -> GardenPool {
        GardenPool {
            pid,
            pair_name: format!("POOL-{pid}"),
            lp_token_address: "0xlp".into(),
            token0_symbol: "A".into(),
            token1_symbol: "B".into(),
            reserve0: rust_decimal::Decimal::ONE,
            reserve1: rust_decimal::Decimal::ONE,
            total_staked_lp: rust_decimal::Decimal::ONE,
            alloc_share: 0.1,
            fee_apr: AprValue::zero(),
            emission_apr: AprValue::zero(),
            quest_apr: QuestAprRange { worst: 0.0, best: 0.0 },
            tvl: rust_decimal::Decimal::ONE,
            v2_tvl: rust_decimal::Decimal::ONE,
            volume_24h: rust_decimal::Decimal::ZERO,
            fees_24h: rust_decimal::Decimal::ZERO,
            last_refreshed_at: Utc::now(),
            reachable_in_price_graph: true,
            archived: false,
        }
    }

    #[tokio::test]
    async fn is_ready_false_until_first_refresh() {
        let cache = PoolCache::new(None);
        assert!(!cache.is_ready().await);
        cache.refresh(|| async { Ok(vec![pool(1)]) }).await;
        assert!(cache.is_ready().await);
    }

    #[tokio::test]
    async fn concurrent_refresh_is_a_no_op_when_already_running() {
        let cache = Arc::new(PoolCache::new(None));
        let _guard = cache.refresh_guard.try_lock().unwrap();
        let outcome = cache.refresh(|| async { Ok(vec![pool(1)]) }).await;
        assert_eq!(outcome, RefreshOutcome::AlreadyRefreshing);
    }

    #[tokio::test]
    async fn search_is_case_and_separator_insensitive() {
        let cache = PoolCache::new(None);
        cache.refresh(|| async { Ok(vec![pool(1)]) }).await;
        let found = cache.search("pool 1").await;
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let cache = PoolCache::new(None);
        cache.refresh(|| async { Ok(vec![pool(1)]) }).await;
        cache.refresh(|| async { Err(anyhow::anyhow!("rpc down")) }).await;
        let all = cache.get_all().await;
        assert_eq!(all.len(), 1);
    }
}
