//! Typed runtime configuration, resolved from environment variables with
//! documented defaults. `from_env` is the CLI entry point's constructor;
//! `for_tests` builds the same struct directly for callers that already
//! have every piece in hand.

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::Address;
use rust_decimal::Decimal;

use crate::chain::Chain;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_duration_secs(key: &str, default_secs: u64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

fn env_address(key: &str, default: &str) -> anyhow::Result<Address> {
    let raw = env_or(key, default);
    raw.parse().map_err(|e| anyhow::anyhow!("invalid address in {key} ('{raw}'): {e}"))
}

/// Unset entirely (both chains' env vars absent) is a real state, distinct
/// from "defaulted to the zero address" -- `LiveWalletFacts` treats a
/// missing oracle/lock contract as "skip this fact" rather than reading
/// garbage from address zero.
fn env_address_opt(key: &str) -> anyhow::Result<Option<Address>> {
    match std::env::var(key) {
        Ok(raw) => Ok(Some(raw.parse().map_err(|e| anyhow::anyhow!("invalid address in {key} ('{raw}'): {e}"))?)),
        Err(_) => Ok(None),
    }
}

/// Everything a booted `Application` needs, gathered in one place so tests
/// can build a fixture config without touching the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: std::path::PathBuf,
    pub pool_cache_path: Option<std::path::PathBuf>,

    pub rpc_urls: HashMap<Chain, String>,
    pub house_wallet: String,
    pub staking_registry: HashMap<Chain, Address>,
    pub emission_token: HashMap<Chain, Address>,
    pub native_token_symbol: String,
    pub emission_token_symbol: String,
    pub stable_anchor_token: String,

    pub hero_graphql_endpoint: String,
    pub explorer_base_url: Option<String>,
    pub explorer_api_key: Option<String>,

    pub influence_oracle: Option<HashMap<Chain, Address>>,
    pub governance_lock_contract: Option<HashMap<Chain, Address>>,

    pub snapshot_cron: String,
    pub pool_refresh_interval: Duration,
    pub price_graph_ttl: Duration,
    pub scanner_poll_interval: Duration,
    pub payment_match_epsilon: Decimal,
    pub payment_job_ttl: Duration,

    pub http_host: String,
    pub http_port: u16,
}

impl AppConfig {
    /// Reads every field from the environment, falling back to the
    /// documented default for anything unset -- the entry point main()
    /// uses this directly.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut rpc_urls = HashMap::new();
        rpc_urls.insert(Chain::Serendale, env_or("GARDENKEEPER_SERENDALE_RPC_URL", "https://subnets.avax.network/defi-kingdoms/dfk-chain/rpc"));
        rpc_urls.insert(Chain::Crystalvale, env_or("GARDENKEEPER_CRYSTALVALE_RPC_URL", "https://subnets.avax.network/defi-kingdoms/dfkchain/rpc"));

        let mut staking_registry = HashMap::new();
        staking_registry.insert(Chain::Serendale, env_address("GARDENKEEPER_SERENDALE_STAKING_REGISTRY", "0x0000000000000000000000000000000000000000")?);
        staking_registry.insert(Chain::Crystalvale, env_address("GARDENKEEPER_CRYSTALVALE_STAKING_REGISTRY", "0x0000000000000000000000000000000000000000")?);

        let mut emission_token = HashMap::new();
        emission_token.insert(Chain::Serendale, env_address("GARDENKEEPER_SERENDALE_EMISSION_TOKEN", "0x0000000000000000000000000000000000000000")?);
        emission_token.insert(Chain::Crystalvale, env_address("GARDENKEEPER_CRYSTALVALE_EMISSION_TOKEN", "0x0000000000000000000000000000000000000000")?);

        let epsilon = env_or("GARDENKEEPER_PAYMENT_MATCH_EPSILON", "0.1")
            .parse::<Decimal>()
            .unwrap_or_else(|_| Decimal::new(1, 1));

        Ok(AppConfig {
            database_path: env_or("GARDENKEEPER_DATABASE_PATH", "gardenkeeper.db").into(),
            pool_cache_path: Some(env_or("GARDENKEEPER_POOL_CACHE_PATH", "pool_cache.json").into()),

            rpc_urls,
            house_wallet: env_or("GARDENKEEPER_HOUSE_WALLET", "0x0000000000000000000000000000000000000001"),
            staking_registry,
            emission_token,
            native_token_symbol: env_or("GARDENKEEPER_NATIVE_TOKEN_SYMBOL", "JEWEL"),
            emission_token_symbol: env_or("GARDENKEEPER_EMISSION_TOKEN_SYMBOL", "CRYSTAL"),
            stable_anchor_token: env_or("GARDENKEEPER_STABLE_ANCHOR_TOKEN", "usdc"),

            hero_graphql_endpoint: env_or("GARDENKEEPER_HERO_GRAPHQL_ENDPOINT", "https://api.defikingdoms.com/graphql"),
            explorer_base_url: std::env::var("GARDENKEEPER_EXPLORER_BASE_URL").ok(),
            explorer_api_key: std::env::var("GARDENKEEPER_EXPLORER_API_KEY").ok(),

            influence_oracle: {
                let serendale = env_address_opt("GARDENKEEPER_SERENDALE_INFLUENCE_ORACLE")?;
                let crystalvale = env_address_opt("GARDENKEEPER_CRYSTALVALE_INFLUENCE_ORACLE")?;
                let mut map = HashMap::new();
                if let Some(addr) = serendale {
                    map.insert(Chain::Serendale, addr);
                }
                if let Some(addr) = crystalvale {
                    map.insert(Chain::Crystalvale, addr);
                }
                if map.is_empty() { None } else { Some(map) }
            },
            governance_lock_contract: {
                let serendale = env_address_opt("GARDENKEEPER_SERENDALE_GOVERNANCE_LOCK")?;
                let crystalvale = env_address_opt("GARDENKEEPER_CRYSTALVALE_GOVERNANCE_LOCK")?;
                let mut map = HashMap::new();
                if let Some(addr) = serendale {
                    map.insert(Chain::Serendale, addr);
                }
                if let Some(addr) = crystalvale {
                    map.insert(Chain::Crystalvale, addr);
                }
                if map.is_empty() { None } else { Some(map) }
            },

            snapshot_cron: env_or("GARDENKEEPER_SNAPSHOT_CRON", crate::scheduler::DEFAULT_SNAPSHOT_CRON),
            pool_refresh_interval: env_duration_secs("GARDENKEEPER_POOL_REFRESH_INTERVAL_SECS", crate::cache::REFRESH_INTERVAL.as_secs()),
            price_graph_ttl: env_duration_secs("GARDENKEEPER_PRICE_GRAPH_TTL_SECS", 5 * 60),
            scanner_poll_interval: env_duration_secs("GARDENKEEPER_SCANNER_POLL_INTERVAL_SECS", crate::payments::scanner::POLL_INTERVAL.as_secs()),
            payment_match_epsilon: epsilon,
            payment_job_ttl: Duration::from_secs(crate::model::payment_job::DEFAULT_JOB_TTL_SECS as u64),

            http_host: env_or("GARDENKEEPER_HTTP_HOST", "127.0.0.1"),
            http_port: env_or("GARDENKEEPER_HTTP_PORT", "8787").parse().unwrap_or(8787),
        })
    }

    /// Builds a config with small, deterministic values for tests, never
    /// touching the environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let mut rpc_urls = HashMap::new();
        rpc_urls.insert(Chain::Serendale, "http://127.0.0.1:0".to_string());
        rpc_urls.insert(Chain::Crystalvale, "http://127.0.0.1:0".to_string());
        AppConfig {
            database_path: ":memory:".into(),
            pool_cache_path: None,
            rpc_urls,
            house_wallet: "0x0000000000000000000000000000000000000001".to_string(),
            staking_registry: HashMap::new(),
            emission_token: HashMap::new(),
            native_token_symbol: "JEWEL".to_string(),
            emission_token_symbol: "CRYSTAL".to_string(),
            stable_anchor_token: "usdc".to_string(),
            hero_graphql_endpoint: "http://127.0.0.1:0/graphql".to_string(),
            explorer_base_url: None,
            explorer_api_key: None,
            influence_oracle: None,
            governance_lock_contract: None,
            snapshot_cron: crate::scheduler::DEFAULT_SNAPSHOT_CRON.to_string(),
            pool_refresh_interval: Duration::from_secs(60),
            price_graph_ttl: Duration::from_secs(60),
            scanner_poll_interval: Duration::from_secs(1),
            payment_match_epsilon: Decimal::new(1, 1),
            payment_job_ttl: Duration::from_secs(3600),
            http_host: "127.0.0.1".to_string(),
            http_port: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_carries_both_chains() {
        let config = AppConfig::for_tests();
        assert!(config.rpc_urls.contains_key(&Chain::Serendale));
        assert!(config.rpc_urls.contains_key(&Chain::Crystalvale));
    }
}
