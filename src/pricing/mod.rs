//! L13 — the cost model: `final = base * (1 - newPlayerDiscount if new)
//! * (whalePriority if priority_and_whale) * (peakMultiplier if peak
//! hour)`, with free-tier query types bypassing the chain entirely.
//! Config is republished atomically every 60s (hot-reload), mirroring the
//! `Arc<RwLock<_>>` snapshot-swap shape used for the pool cache (L5) and
//! the price graph (L1).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};

use crate::error::EngineError;
use crate::model::pricing_config::PricingConfig;

pub const CONFIG_TTL: Duration = Duration::from_secs(60);

#[async_trait]
pub trait PricingConfigStore: Send + Sync {
    async fn load(&self) -> Result<PricingConfig, EngineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub amount: Decimal,
    pub modifier_tags: Vec<String>,
}

pub struct PricingEngine<S: PricingConfigStore> {
    store: S,
    config: RwLock<Arc<PricingConfig>>,
    last_loaded: Mutex<Instant>,
}

impl<S: PricingConfigStore> PricingEngine<S> {
    pub fn new(store: S, initial: PricingConfig) -> Self {
        PricingEngine {
            store,
            config: RwLock::new(Arc::new(initial)),
            last_loaded: Mutex::new(Instant::now() - CONFIG_TTL - Duration::from_secs(1)),
        }
    }

    /// Reloads the config if the TTL has elapsed. A failed reload keeps
    /// serving the previous config rather than failing the quote.
    async fn refreshed_config(&self) -> Arc<PricingConfig> {
        let mut last_loaded = self.last_loaded.lock().await;
        if last_loaded.elapsed() < CONFIG_TTL {
            return self.config.read().await.clone();
        }
        match self.store.load().await {
            Ok(fresh) => {
                *self.config.write().await = Arc::new(fresh);
                *last_loaded = Instant::now();
            }
            Err(e) => {
                tracing::warn!(error = %e, "pricing config reload failed, keeping previous config");
                *last_loaded = Instant::now();
            }
        }
        self.config.read().await.clone()
    }

    pub async fn quote(&self, query_type: &str, lifetime_deposits: Decimal, is_priority: bool, now: DateTime<Utc>) -> Result<PriceQuote, EngineError> {
        let config = self.refreshed_config().await;
        quote_with_config(&config, query_type, lifetime_deposits, is_priority, now)
    }
}

/// The pure half of the pricing computation, split out so it can be unit
/// tested without a config store.
pub fn quote_with_config(
    config: &PricingConfig,
    query_type: &str,
    lifetime_deposits: Decimal,
    is_priority: bool,
    now: DateTime<Utc>,
) -> Result<PriceQuote, EngineError> {
    if PricingConfig::is_free_tier(query_type) {
        return Ok(PriceQuote { amount: Decimal::ZERO, modifier_tags: vec!["free_tier".to_string()] });
    }

    let base = config
        .base_rate(query_type)
        .ok_or_else(|| EngineError::Validation(format!("unknown query type '{query_type}'")))?;

    let mut amount = base;
    let mut tags = Vec::new();

    if lifetime_deposits < config.modifiers.new_player_threshold {
        amount *= Decimal::ONE - config.modifiers.new_player_discount;
        tags.push("new_player_discount".to_string());
    }
    if is_priority && lifetime_deposits >= config.modifiers.whale_threshold {
        amount *= config.modifiers.whale_priority_multiplier;
        tags.push("whale_priority".to_string());
    }
    let hour = now.hour() as u8;
    if config.modifiers.peak_hours.contains(&hour) {
        amount *= config.modifiers.peak_multiplier;
        tags.push("peak_multiplier".to_string());
    }

    Ok(PriceQuote { amount, modifier_tags: tags })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn off_peak_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T03:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn free_tier_query_bypasses_all_modifiers() {
        let config = PricingConfig::default();
        let quote = quote_with_config(&config, "nav", Decimal::from(50_000), true, off_peak_now()).unwrap();
        assert_eq!(quote.amount, Decimal::ZERO);
        assert_eq!(quote.modifier_tags, vec!["free_tier".to_string()]);
    }

    #[test]
    fn new_player_gets_the_discount() {
        let config = PricingConfig::default();
        let quote = quote_with_config(&config, "optimization", Decimal::from(10), false, off_peak_now()).unwrap();
        assert_eq!(quote.amount, Decimal::from(25) * Decimal::new(75, 2));
        assert!(quote.modifier_tags.contains(&"new_player_discount".to_string()));
    }

    #[test]
    fn whale_priority_multiplier_only_applies_when_both_conditions_hold() {
        let config = PricingConfig::default();
        let not_priority = quote_with_config(&config, "optimization", Decimal::from(20_000), false, off_peak_now()).unwrap();
        assert!(!not_priority.modifier_tags.contains(&"whale_priority".to_string()));

        let priority_whale = quote_with_config(&config, "optimization", Decimal::from(20_000), true, off_peak_now()).unwrap();
        assert!(priority_whale.modifier_tags.contains(&"whale_priority".to_string()));
    }

    #[test]
    fn peak_hour_multiplier_composes_with_other_modifiers() {
        let config = PricingConfig::default();
        let peak_now = DateTime::parse_from_rfc3339("2026-01-01T19:00:00Z").unwrap().with_timezone(&Utc);
        let quote = quote_with_config(&config, "optimization", Decimal::from(50_000), false, peak_now).unwrap();
        assert!(quote.modifier_tags.contains(&"peak_multiplier".to_string()));
        assert_eq!(quote.amount, Decimal::from(25) * Decimal::new(120, 2));
    }

    #[test]
    fn unknown_query_type_is_a_validation_error() {
        let config = PricingConfig::default();
        let result = quote_with_config(&config, "not_a_real_query", Decimal::ZERO, false, off_peak_now());
        assert!(result.is_err());
    }
}
