//! L10 — `buildPlayerSnapshot(wallet)`: a structured, point-in-time view
//! of a wallet's on-chain state, consumed both by the daily pipeline (L11)
//! and by the `snapshot` CLI subcommand / tool-call API handler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::wallet_snapshot::WalletSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LpPosition {
    pub pair_name: String,
    pub lp_token_address: String,
    pub staked_lp: Decimal,
    pub usd_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlayerSnapshot {
    pub wallet: String,
    pub hero_count: u32,
    pub gen0_hero_count: u32,
    pub influence: Decimal,
    pub total_lp_usd: f64,
    pub native_balance: Decimal,
    pub emission_balance: Decimal,
    pub governance_balance: Decimal,
    pub governance_lock_days_remaining: u32,
    pub account_age_days: u32,
    pub lp_positions: Vec<LpPosition>,
    pub generated_at: DateTime<Utc>,
}

/// Facts the snapshot builder needs from chain clients it does not own.
/// One impl per environment (live chain client, or a fixture for tests).
#[async_trait]
pub trait WalletFactsSource: Send + Sync {
    async fn hero_count(&self, wallet: &str) -> Result<(u32, u32), EngineError>;
    async fn influence(&self, wallet: &str) -> Result<Decimal, EngineError>;
    async fn lp_positions(&self, wallet: &str) -> Result<Vec<LpPosition>, EngineError>;
    async fn token_balances(&self, wallet: &str) -> Result<(Decimal, Decimal, Decimal), EngineError>;
    async fn governance_lock_days_remaining(&self, wallet: &str) -> Result<u32, EngineError>;
    async fn first_tx_timestamp(&self, wallet: &str) -> Result<DateTime<Utc>, EngineError>;
}

pub struct SnapshotBuilder<F: WalletFactsSource> {
    pub facts: F,
}

impl<F: WalletFactsSource> SnapshotBuilder<F> {
    pub fn new(facts: F) -> Self {
        SnapshotBuilder { facts }
    }

    pub async fn build(&self, wallet: &str, now: DateTime<Utc>) -> Result<PlayerSnapshot, EngineError> {
        let wallet = wallet.to_lowercase();
        let (hero_count, gen0_hero_count) = self.facts.hero_count(&wallet).await?;
        let influence = self.facts.influence(&wallet).await?;
        let lp_positions = self.facts.lp_positions(&wallet).await?;
        let total_lp_usd = lp_positions.iter().map(|p| p.usd_value).sum();
        let (native_balance, emission_balance, governance_balance) = self.facts.token_balances(&wallet).await?;
        let governance_lock_days_remaining = self.facts.governance_lock_days_remaining(&wallet).await?;
        let first_tx = self.facts.first_tx_timestamp(&wallet).await?;
        let account_age_days = (now - first_tx).num_days().max(0) as u32;

        Ok(PlayerSnapshot {
            wallet,
            hero_count,
            gen0_hero_count,
            influence,
            total_lp_usd,
            native_balance,
            emission_balance,
            governance_balance,
            governance_lock_days_remaining,
            account_age_days,
            lp_positions,
            generated_at: now,
        })
    }
}

impl PlayerSnapshot {
    /// The row persisted into `wallet_snapshots`, keyed by `(wallet,
    /// as_of_date)`. `as_of_date` is midnight UTC of the run, not of
    /// `generated_at`, so reruns within the same UTC day collide on the
    /// same key (upsert no-ops rather than duplicating).
    pub fn to_wallet_snapshot_row(&self, as_of_date: chrono::NaiveDate) -> WalletSnapshot {
        WalletSnapshot {
            wallet: self.wallet.clone(),
            as_of_date,
            jewel: self.native_balance,
            crystal: self.emission_balance,
            cjewel: self.governance_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixtureFacts;

    #[async_trait]
    impl WalletFactsSource for FixtureFacts {
        async fn hero_count(&self, _wallet: &str) -> Result<(u32, u32), EngineError> {
            Ok((5, 2))
        }
        async fn influence(&self, _wallet: &str) -> Result<Decimal, EngineError> {
            Ok(Decimal::from(100))
        }
        async fn lp_positions(&self, _wallet: &str) -> Result<Vec<LpPosition>, EngineError> {
            Ok(vec![
                LpPosition { pair_name: "JEWEL-USDC".into(), lp_token_address: "0xlp".into(), staked_lp: Decimal::from(10), usd_value: 250.0 },
                LpPosition { pair_name: "CRYSTAL-AVAX".into(), lp_token_address: "0xlp2".into(), staked_lp: Decimal::from(5), usd_value: 100.0 },
            ])
        }
        async fn token_balances(&self, _wallet: &str) -> Result<(Decimal, Decimal, Decimal), EngineError> {
            Ok((Decimal::from(50), Decimal::from(20), Decimal::from(5)))
        }
        async fn governance_lock_days_remaining(&self, _wallet: &str) -> Result<u32, EngineError> {
            Ok(30)
        }
        async fn first_tx_timestamp(&self, _wallet: &str) -> Result<DateTime<Utc>, EngineError> {
            Ok(chrono::DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z").unwrap().with_timezone(&Utc))
        }
    }

    #[tokio::test]
    async fn builds_total_lp_usd_from_all_positions() {
        let builder = SnapshotBuilder::new(FixtureFacts);
        let now = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let snap = builder.build("0xABC", now).await.unwrap();
        assert_eq!(snap.wallet, "0xabc");
        assert_eq!(snap.total_lp_usd, 350.0);
        assert_eq!(snap.account_age_days, 365);
        assert_eq!(snap.hero_count, 5);
        assert_eq!(snap.gen0_hero_count, 2);
    }
}
