//! The top-level application struct: every long-lived service as an
//! explicit field, built once by [`Application::bootstrap`] and shared
//! behind `Arc` with the background tasks and the tool-call HTTP surface.
//! Nothing here reaches for global/static state; a test that needs one
//! service constructs that service directly instead of booting all of it.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::analytics::apr::DefaultQuestAprStrategy;
use crate::analytics::{DeprecatedPoolAllowlist, PoolAnalyticsBuilder, PoolFacts};
use crate::cache::PoolCache;
use crate::chain::graphql::HeroGraphQlClient;
use crate::chain::{Chain, ChainClient};
use crate::chat::OutboundChat;
use crate::config::AppConfig;
use crate::error::EngineError;
use crate::ledger::{BalanceLedger, LedgerStore};
use crate::model::hero::HeroInfo;
use crate::optimizer::{HeroSource, OptimizationProcessor};
use crate::payments::explorer::ExplorerClient;
use crate::payments::registry::PaymentJobRegistry;
use crate::payments::scanner::PaymentScanner;
use crate::pricegraph::PriceGraph;
use crate::pricing::PricingEngine;
use crate::queue::{CacheReadyQueue, QueueDrainHandler, WaitingUser};
use crate::scheduler::Scheduler;
use crate::snapshot::{LpPosition, SnapshotBuilder, WalletFactsSource};
use crate::store::jobs::JobStore;
use crate::store::ledger::SqliteLedgerStore;
use crate::store::players::PlayerStore;
use crate::store::pricing::SqlitePricingConfigStore;
use crate::store::snapshots::SnapshotStore;
use crate::store::{self, Db};

/// Pools and wallet facts are gathered against one chain per deployment --
/// `GardenPool` carries no chain tag of its own, so caching both chains'
/// registries into the same pid-keyed map would risk pid collisions. The
/// scanner still watches both chains (a job's wallet may pay from either),
/// but pool pricing, hero ownership and wallet snapshots all read from
/// this chain.
const PRIMARY_CHAIN: Chain = Chain::Crystalvale;

/// A chat transport that only logs. Used when `Application` is booted
/// without a real bot-framework connection wired in -- the `snapshot` and
/// `classify` CLI subcommands, or a test harness.
pub struct LoggingChat;

#[async_trait]
impl OutboundChat for LoggingChat {
    async fn send_direct(&self, chat_user_id: &str, message: &str) -> Result<(), EngineError> {
        tracing::info!(chat_user_id, message, "outbound chat (no transport wired, logged only)");
        Ok(())
    }
}

/// Adapts the hero GraphQL client to the optimizer's narrower `HeroSource`
/// seam, so `OptimizationProcessor` never depends on the GraphQL client
/// directly.
pub struct GraphQlHeroSource(pub Arc<HeroGraphQlClient>);

#[async_trait]
impl HeroSource for GraphQlHeroSource {
    async fn get_heroes_by_owner(&self, wallet: &str) -> Result<Vec<HeroInfo>, EngineError> {
        self.0.get_all_heroes_by_owner(wallet).await
    }
}

/// Combines the chain client, hero GraphQL client, explorer fallback and
/// pool cache into the one `WalletFactsSource` the snapshot builder (L10)
/// needs. LP positions are found by checking every cached pool's
/// `userInfo` entry for the wallet rather than an indexer, since the
/// staking registry has no "positions by owner" view.
pub struct LiveWalletFacts {
    pub chain: Chain,
    pub chain_client: Arc<ChainClient>,
    pub hero_client: Arc<HeroGraphQlClient>,
    pub explorer: Option<Arc<ExplorerClient>>,
    pub pool_cache: Arc<PoolCache>,
    pub staking_registry: Address,
    pub native_token: Option<Address>,
    pub emission_token: Address,
    pub governance_token: Address,
    pub influence_oracle: Option<Address>,
    pub governance_lock: Option<Address>,
}

#[async_trait]
impl WalletFactsSource for LiveWalletFacts {
    async fn hero_count(&self, wallet: &str) -> Result<(u32, u32), EngineError> {
        let heroes = self.hero_client.get_all_heroes_by_owner(wallet).await?;
        let gen0 = heroes.iter().filter(|h| h.is_gen0()).count() as u32;
        Ok((heroes.len() as u32, gen0))
    }

    async fn influence(&self, wallet: &str) -> Result<Decimal, EngineError> {
        let Some(oracle) = self.influence_oracle else {
            return Ok(Decimal::ZERO);
        };
        let addr = parse_address(wallet)?;
        self.chain_client.get_influence(self.chain, oracle, addr).await
    }

    async fn lp_positions(&self, wallet: &str) -> Result<Vec<LpPosition>, EngineError> {
        let addr = parse_address(wallet)?;
        let pools = self.pool_cache.get_all().await;
        let mut out = Vec::new();
        for pool in pools.values() {
            let staked = self
                .chain_client
                .get_user_staked(self.chain, self.staking_registry, pool.pid, addr)
                .await?;
            if staked.is_zero() {
                continue;
            }
            let usd_value = if pool.total_staked_lp.is_zero() {
                0.0
            } else {
                let share = staked / pool.total_staked_lp;
                let tvl: f64 = pool.tvl.try_into().unwrap_or(0.0);
                let share: f64 = share.try_into().unwrap_or(0.0);
                tvl * share
            };
            out.push(LpPosition {
                pair_name: pool.pair_name.clone(),
                lp_token_address: pool.lp_token_address.clone(),
                staked_lp: staked,
                usd_value,
            });
        }
        Ok(out)
    }

    async fn token_balances(&self, wallet: &str) -> Result<(Decimal, Decimal, Decimal), EngineError> {
        let addr = parse_address(wallet)?;
        let native = match self.native_token {
            Some(token) => self.chain_client.get_erc20_balance(self.chain, token, addr).await?,
            None => self.chain_client.get_balance(self.chain, wallet).await?,
        };
        let emission = self.chain_client.get_erc20_balance(self.chain, self.emission_token, addr).await?;
        let governance = self.chain_client.get_erc20_balance(self.chain, self.governance_token, addr).await?;
        Ok((native, emission, governance))
    }

    async fn governance_lock_days_remaining(&self, wallet: &str) -> Result<u32, EngineError> {
        let Some(lock) = self.governance_lock else {
            return Ok(0);
        };
        let addr = parse_address(wallet)?;
        self.chain_client.get_governance_lock_days_remaining(self.chain, lock, addr, Utc::now()).await
    }

    async fn first_tx_timestamp(&self, wallet: &str) -> Result<DateTime<Utc>, EngineError> {
        match &self.explorer {
            Some(explorer) => Ok(explorer.earliest_tx_timestamp(wallet).await?.unwrap_or_else(Utc::now)),
            None => Ok(Utc::now()),
        }
    }
}

fn parse_address(wallet: &str) -> Result<Address, EngineError> {
    wallet.parse().map_err(|e| EngineError::Validation(format!("invalid wallet address '{wallet}': {e}")))
}

/// Drains the cache-ready queue (L8) by pricing and creating a payment job
/// for each waiting user, then sending them the invoice instructions.
pub struct PaymentRequestHandler {
    pub job_store: Arc<JobStore>,
    pub registry: Arc<PaymentJobRegistry>,
    pub pricing: Arc<PricingEngine<SqlitePricingConfigStore>>,
    pub ledger_store: Arc<SqliteLedgerStore>,
    pub players: Arc<PlayerStore>,
    pub chat: Arc<dyn OutboundChat>,
    pub house_wallet: String,
    pub job_ttl: std::time::Duration,
}

#[async_trait]
impl PaymentRequestHandler {
    /// Prices and opens a payment job for `user`, inserting it into both
    /// the durable store and the in-memory registry. Shared by the
    /// queue-drain path (which also sends chat instructions) and the
    /// `create_payment_job` tool (which hands the job straight back to
    /// its caller instead).
    pub async fn create_job(&self, user: &WaitingUser, now: chrono::DateTime<Utc>) -> Result<crate::model::payment_job::PaymentJob, EngineError> {
        let player = self.players.get_or_create(&user.chat_user_id, &user.display_name, now).await?;
        let balance = self.ledger_store.get_or_create(&player.id, now).await?;
        let quote = self.pricing.quote("optimization", balance.lifetime_deposits, false, now).await?;

        let job_id = uuid::Uuid::new_v4().to_string();
        let job = crate::model::payment_job::PaymentJob::new(job_id, player.id.clone(), user.wallet.clone(), quote.amount, 0, now);
        self.job_store.insert(&job).await?;
        self.registry.insert(job.clone()).await;
        Ok(job)
    }
}

#[async_trait]
impl QueueDrainHandler for PaymentRequestHandler {
    async fn handle_ready_user(&self, user: &WaitingUser) -> Result<(), EngineError> {
        let now = Utc::now();
        let job = self.create_job(user, now).await?;

        let message = format!(
            "Garden cache is ready. Send {} to {} within {} hours to start your optimization (job {}).",
            job.expected_amount,
            self.house_wallet,
            self.job_ttl.as_secs() / 3600,
            job.id
        );
        crate::chat::send_chunked(self.chat.as_ref(), &user.chat_user_id, &message, crate::chat::MESSAGE_CHAR_LIMIT).await
    }
}

/// Every long-lived service the engine needs, wired together once at
/// startup. Background loops are started separately by
/// `run_background_tasks` so tests and one-shot CLI subcommands can build
/// an `Application` without spawning anything.
pub struct Application {
    pub config: AppConfig,
    pub db: Db,
    pub chain_client: Arc<ChainClient>,
    pub hero_client: Arc<HeroGraphQlClient>,
    pub explorer: Option<Arc<ExplorerClient>>,
    pub price_graph: Arc<PriceGraph>,
    pub pool_cache: Arc<PoolCache>,
    pub pool_analytics: Arc<PoolAnalyticsBuilder>,
    pub job_registry: Arc<PaymentJobRegistry>,
    pub job_store: Arc<JobStore>,
    pub player_store: Arc<PlayerStore>,
    pub snapshot_store: Arc<SnapshotStore>,
    pub ledger_store: Arc<SqliteLedgerStore>,
    pub ledger: Arc<BalanceLedger<SqliteLedgerStore>>,
    pub pricing: Arc<PricingEngine<SqlitePricingConfigStore>>,
    pub scanner: Arc<PaymentScanner<JobStore>>,
    pub queue: Arc<CacheReadyQueue>,
    pub optimizer: Arc<OptimizationProcessor>,
    pub snapshot_builder: Arc<SnapshotBuilder<LiveWalletFacts>>,
    pub chat: Arc<dyn OutboundChat>,
}

impl Application {
    /// Opens the store, constructs every service, and warms the pool
    /// cache from disk if a fresh-enough copy exists. Does not start any
    /// background task.
    pub async fn bootstrap(config: AppConfig, chat: Arc<dyn OutboundChat>) -> anyhow::Result<Self> {
        let db = store::open(&config.database_path)?;

        let chain_client = Arc::new(ChainClient::new(config.rpc_urls.clone(), &config.house_wallet)?);
        let http = reqwest::Client::new();
        let hero_client = Arc::new(HeroGraphQlClient::new(http.clone(), config.hero_graphql_endpoint.clone()));
        let explorer = config
            .explorer_base_url
            .clone()
            .map(|base| Arc::new(ExplorerClient::new(http.clone(), base, config.explorer_api_key.clone())));

        let price_graph = Arc::new(PriceGraph::new(config.stable_anchor_token.clone(), vec![config.emission_token_symbol.clone()]));

        let pool_cache = Arc::new(PoolCache::new(config.pool_cache_path.clone()));
        pool_cache.load_from_disk(Utc::now());

        let pool_analytics = Arc::new(PoolAnalyticsBuilder {
            chain_client: chain_client.clone(),
            price_graph: price_graph.clone(),
            quest_strategy: Box::new(DefaultQuestAprStrategy::default()),
            deprecated: DeprecatedPoolAllowlist::default(),
        });

        let job_store = Arc::new(JobStore::new(db.clone()));
        let player_store = Arc::new(PlayerStore::new(db.clone()));
        let snapshot_store = Arc::new(SnapshotStore::new(db.clone()));
        let ledger_store = Arc::new(SqliteLedgerStore::new(db.clone()));
        let pricing_config_store = SqlitePricingConfigStore::new(db.clone());

        let initial_pricing_config = {
            use crate::pricing::PricingConfigStore;
            pricing_config_store.load().await.unwrap_or_default()
        };
        let pricing = Arc::new(PricingEngine::new(pricing_config_store, initial_pricing_config));

        let ledger = Arc::new(BalanceLedger::new(SqliteLedgerStore::new(db.clone())));

        let job_registry = Arc::new(PaymentJobRegistry::new());
        job_registry.load(job_store.list_pending().await?).await;

        let mut token_address = HashMap::new();
        for (&chain, &token) in &config.emission_token {
            token_address.insert(chain, token);
        }
        let scanner = Arc::new(PaymentScanner::new(
            chain_client.clone(),
            job_registry.clone(),
            job_store.clone(),
            explorer.clone(),
            config.house_wallet.clone(),
            config.payment_match_epsilon,
            token_address,
        ));

        let queue = Arc::new(CacheReadyQueue::new());

        let optimizer = Arc::new(OptimizationProcessor::new(
            job_store.clone(),
            Arc::new(GraphQlHeroSource(hero_client.clone())),
            player_store.clone(),
            ledger.clone(),
            pool_cache.clone(),
            chat.clone(),
        ));

        let staking_registry = *config.staking_registry.get(&PRIMARY_CHAIN).ok_or_else(|| {
            anyhow::anyhow!("no staking registry configured for primary chain {:?}", PRIMARY_CHAIN)
        })?;
        let emission_token = *config.emission_token.get(&PRIMARY_CHAIN).ok_or_else(|| {
            anyhow::anyhow!("no emission token configured for primary chain {:?}", PRIMARY_CHAIN)
        })?;
        let governance_token = config
            .governance_lock_contract
            .as_ref()
            .and_then(|m| m.get(&PRIMARY_CHAIN))
            .copied()
            .unwrap_or(emission_token);
        let wallet_facts = LiveWalletFacts {
            chain: PRIMARY_CHAIN,
            chain_client: chain_client.clone(),
            hero_client: hero_client.clone(),
            explorer: explorer.clone(),
            pool_cache: pool_cache.clone(),
            staking_registry,
            native_token: None,
            emission_token,
            governance_token,
            influence_oracle: config.influence_oracle.as_ref().and_then(|m| m.get(&PRIMARY_CHAIN)).copied(),
            governance_lock: config.governance_lock_contract.as_ref().and_then(|m| m.get(&PRIMARY_CHAIN)).copied(),
        };
        let snapshot_builder = Arc::new(SnapshotBuilder::new(wallet_facts));

        Ok(Application {
            config,
            db,
            chain_client,
            hero_client,
            explorer,
            price_graph,
            pool_cache,
            pool_analytics,
            job_registry,
            job_store,
            player_store,
            snapshot_store,
            ledger_store,
            ledger,
            pricing,
            scanner,
            queue,
            optimizer,
            snapshot_builder,
            chat,
        })
    }

    /// Walks the primary chain's staking registry end to end, pricing and
    /// decimals reads run concurrently per pool via the chain client's own
    /// retry/timeout wrapper. The registry's own LP balance stands in for
    /// "total staked" (MasterChef-style contracts never expose that as a
    /// separate view).
    async fn gather_pool_facts(&self) -> anyhow::Result<Vec<PoolFacts>> {
        let registry = *self
            .config
            .staking_registry
            .get(&PRIMARY_CHAIN)
            .ok_or_else(|| anyhow::anyhow!("no staking registry configured for primary chain"))?;
        let reward_token = *self
            .config
            .emission_token
            .get(&PRIMARY_CHAIN)
            .ok_or_else(|| anyhow::anyhow!("no emission token configured for primary chain"))?;
        let reward_decimals = self.chain_client.get_erc20_decimals(PRIMARY_CHAIN, reward_token).await?;

        let tip = self.chain_client.get_block_number(PRIMARY_CHAIN).await?;
        let window_start = tip.saturating_sub(crate::analytics::BLOCKS_PER_DAY);

        let length = self.chain_client.get_pool_length(PRIMARY_CHAIN, registry).await?;
        let mut facts = Vec::with_capacity(length as usize);
        for pid in 0..length {
            let info = self.chain_client.get_pool_info(PRIMARY_CHAIN, registry, pid).await?;
            let lp_token: Address = info.lp_token.parse()?;
            let reserves = self.chain_client.get_lp_reserves(PRIMARY_CHAIN, lp_token).await?;
            let (token0, token1) = self.chain_client.get_lp_tokens(PRIMARY_CHAIN, lp_token).await?;
            let (symbol0, symbol1) = tokio::try_join!(
                self.chain_client.get_erc20_symbol(PRIMARY_CHAIN, token0),
                self.chain_client.get_erc20_symbol(PRIMARY_CHAIN, token1),
            )?;
            let (decimals0, decimals1) = tokio::try_join!(
                self.chain_client.get_erc20_decimals(PRIMARY_CHAIN, token0),
                self.chain_client.get_erc20_decimals(PRIMARY_CHAIN, token1),
            )?;
            let total_staked = self.chain_client.get_erc20_balance(PRIMARY_CHAIN, lp_token, registry).await?;
            let (volume0_24h, volume1_24h) = self
                .chain_client
                .query_swap_volume(PRIMARY_CHAIN, lp_token, decimals0 as u32, decimals1 as u32, window_start, tip)
                .await?;
            let reward_24h = self
                .chain_client
                .query_reward_distributed(PRIMARY_CHAIN, registry, pid, reward_decimals as u32, window_start, tip)
                .await?;

            facts.push(PoolFacts {
                pid,
                chain: PRIMARY_CHAIN,
                pair_name: format!("{symbol0}-{symbol1}"),
                lp_token_address: format!("{lp_token:#x}"),
                token0_symbol: symbol0,
                token1_symbol: symbol1,
                token0_address: format!("{token0:#x}"),
                token1_address: format!("{token1:#x}"),
                decimals0,
                decimals1,
                reserve0: reserves.reserve0,
                reserve1: reserves.reserve1,
                total_supply: reserves.total_supply,
                total_staked,
                alloc_point: info.alloc_point,
                total_alloc_point: info.total_alloc_point,
                volume0_24h,
                volume1_24h,
                reward_token_address: format!("{reward_token:#x}"),
                reward_24h,
                archived: info.archived,
            });
        }
        Ok(facts)
    }

    /// One full pool cache refresh: fetch facts from chain, rebuild the
    /// price graph from the same facts, then price every pool through it.
    /// Wrapped by `PoolCache::refresh`'s re-entrancy guard, so overlapping
    /// calls are a no-op rather than a double fetch.
    async fn refresh_pools(&self) -> anyhow::Result<Vec<crate::model::pool::GardenPool>> {
        let facts = self.gather_pool_facts().await?;
        let priced_pools = PoolAnalyticsBuilder::to_priced_pools(&facts);
        let snapshot = self.price_graph.get_or_build(&priced_pools, Utc::now()).await?;
        Ok(self.pool_analytics.build(&facts, &snapshot))
    }

    /// Builds a `PaymentRequestHandler` bound to this application's
    /// services. Cheap (clones a handful of `Arc`s); used both by the
    /// queue-drain background loop and the `create_payment_job` tool.
    pub fn payment_request_handler(self: &Arc<Self>) -> PaymentRequestHandler {
        PaymentRequestHandler {
            job_store: self.job_store.clone(),
            registry: self.job_registry.clone(),
            pricing: self.pricing.clone(),
            ledger_store: self.ledger_store.clone(),
            players: self.player_store.clone(),
            chat: self.chat.clone(),
            house_wallet: self.config.house_wallet.clone(),
            job_ttl: self.config.payment_job_ttl,
        }
    }

    /// Spawns the five cooperative background loops: pool cache refresh,
    /// per-chain payment scanning, cache-ready queue draining,
    /// optimization job draining, and the cron/interval-driven snapshot
    /// and ETL scheduler. Each loop logs and continues past a single
    /// iteration's failure rather than aborting the process.
    pub fn run_background_tasks(self: &Arc<Self>) {
        self.spawn_pool_refresh_loop();
        self.spawn_scanner_loops();
        self.spawn_queue_drain_loop();
        self.spawn_optimizer_drain_loop();
        self.spawn_scheduler_loop();
    }

    fn spawn_pool_refresh_loop(self: &Arc<Self>) {
        let app = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(app.config.pool_refresh_interval);
            loop {
                interval.tick().await;
                let app = app.clone();
                app.pool_cache.refresh(|| async move { app.refresh_pools().await }).await;
                app.queue.drain_if_ready(app.pool_cache.is_ready().await, &app.payment_request_handler()).await;
            }
        });
    }

    fn spawn_scanner_loops(self: &Arc<Self>) {
        for chain in Chain::all() {
            let app = self.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(app.config.scanner_poll_interval);
                loop {
                    interval.tick().await;
                    if let Err(e) = app.scanner.poll_once(chain, Utc::now()).await {
                        tracing::warn!(chain = chain.label(), error = %e, "payment scanner poll failed, will retry next cycle");
                    }
                }
            });
        }
    }

    fn spawn_queue_drain_loop(self: &Arc<Self>) {
        let app = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
            loop {
                interval.tick().await;
                if app.queue.len().await == 0 {
                    continue;
                }
                let ready = app.pool_cache.is_ready().await;
                app.queue.drain_if_ready(ready, &app.payment_request_handler()).await;
            }
        });
    }

    fn spawn_optimizer_drain_loop(self: &Arc<Self>) {
        let app = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(app.config.scanner_poll_interval);
            loop {
                interval.tick().await;
                let jobs = match app.job_store.list_payment_verified().await {
                    Ok(jobs) => jobs,
                    Err(e) => {
                        tracing::warn!(error = %e, "listing payment-verified jobs failed, will retry next cycle");
                        continue;
                    }
                };
                for job in jobs {
                    if let Err(e) = app.optimizer.process_one(&job.id).await {
                        tracing::warn!(job_id = %job.id, error = %e, "optimization drain failed for job");
                    }
                }
            }
        });
    }

    fn spawn_scheduler_loop(self: &Arc<Self>) {
        let app = self.clone();
        tokio::spawn(async move {
            let mut scheduler = match Scheduler::new().with_cron_job("daily_snapshot", &app.config.snapshot_cron) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "invalid snapshot cron expression, scheduler will not run");
                    return;
                }
            }
            .with_interval_job("incremental_etl", crate::scheduler::INCREMENTAL_ETL_INTERVAL);

            loop {
                let fired = match scheduler.wait_for_next().await {
                    Ok(fired) => fired,
                    Err(e) => {
                        tracing::error!(error = %e, "scheduler failed to compute next fire time");
                        continue;
                    }
                };
                for job in fired {
                    match job.as_str() {
                        "daily_snapshot" => app.run_daily_snapshots().await,
                        "incremental_etl" => tracing::info!("incremental ETL watermark sweep tick (no-op: no separate ETL source wired)"),
                        other => tracing::warn!(job = other, "unknown scheduled job fired"),
                    }
                }
            }
        });
    }

    /// Builds a fresh snapshot for every linked wallet and merges it into
    /// that player's profile, one wallet at a time so a single wallet's
    /// chain failure never blocks the rest of the run.
    async fn run_daily_snapshots(&self) {
        let conn = self.db.lock().await;
        let wallets: Vec<(String, String)> = {
            let mut stmt = match conn.prepare("SELECT id, wallets_json FROM players WHERE status = 'active'") {
                Ok(stmt) => stmt,
                Err(e) => {
                    tracing::error!(error = %e, "failed to prepare daily snapshot player scan");
                    return;
                }
            };
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)));
            match rows {
                Ok(rows) => rows.filter_map(Result::ok).collect(),
                Err(e) => {
                    tracing::error!(error = %e, "failed to scan players for daily snapshot");
                    return;
                }
            }
        };
        drop(conn);

        let now = Utc::now();
        for (player_id, wallets_json) in wallets {
            let Ok(player_wallets) = serde_json::from_str::<Vec<String>>(&wallets_json) else { continue };
            for wallet in player_wallets {
                match self.snapshot_builder.build(&wallet, now).await {
                    Ok(snapshot) => {
                        let row = snapshot.to_wallet_snapshot_row(now.date_naive());
                        if let Err(e) = self.snapshot_store.upsert_wallet_snapshot(&row).await {
                            tracing::warn!(wallet, error = %e, "failed to persist daily wallet snapshot row");
                        }
                        let payload = match serde_json::to_value(&snapshot) {
                            Ok(payload) => payload,
                            Err(e) => {
                                tracing::warn!(wallet, error = %e, "failed to serialize snapshot for player profile merge");
                                continue;
                            }
                        };
                        if let Err(e) = self.snapshot_store.merge_into_player_profile(&player_id, &payload).await {
                            tracing::warn!(player_id, wallet, error = %e, "failed to merge snapshot into player profile");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(wallet, error = %e, "daily snapshot build failed for wallet, skipping");
                    }
                }
            }
        }
    }
}
