//! L14 — the balance ledger. The arithmetic (`apply_credit`/`apply_debit`)
//! is pure and tested without a database; the transactional guarantee
//! (single DB transaction, `WHERE`-guarded idempotent deposit) is the
//! storage layer's (L15) job, behind the `LedgerStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::model::jewel_balance::{JewelBalance, Tier};
use crate::optimizer::OptimizationLedger;

/// `balance += amount; lifetime += amount; tier = Tier::from(lifetime);
/// last_deposit_at = now`.
pub fn apply_credit(mut balance: JewelBalance, amount: Decimal, now: DateTime<Utc>) -> JewelBalance {
    balance.balance += amount;
    balance.lifetime_deposits += amount;
    balance.tier = Tier::from_lifetime_deposits(balance.lifetime_deposits);
    balance.last_deposit_at = Some(now);
    balance.updated_at = now;
    balance
}

/// `balance -= amount`, requiring `balance >= amount`.
pub fn apply_debit(mut balance: JewelBalance, amount: Decimal, now: DateTime<Utc>) -> Result<JewelBalance, EngineError> {
    if balance.balance < amount {
        return Err(EngineError::Insufficient { have: balance.balance, need: amount });
    }
    balance.balance -= amount;
    balance.updated_at = now;
    Ok(balance)
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_or_create(&self, player_id: &str, now: DateTime<Utc>) -> Result<JewelBalance, EngineError>;
    async fn save(&self, balance: &JewelBalance) -> Result<(), EngineError>;

    /// `true` iff `job_id` has not already been credited. A storage-layer
    /// `WHERE` guard (e.g. a unique `ledger_credits(job_id)` row) makes
    /// this check-and-set atomic so a retried call is a no-op.
    async fn claim_deposit(&self, job_id: &str) -> Result<bool, EngineError>;
}

pub struct BalanceLedger<S: LedgerStore> {
    pub store: S,
}

impl<S: LedgerStore> BalanceLedger<S> {
    pub fn new(store: S) -> Self {
        BalanceLedger { store }
    }

    pub async fn credit(&self, player_id: &str, amount: Decimal, now: DateTime<Utc>) -> Result<JewelBalance, EngineError> {
        let balance = self.store.get_or_create(player_id, now).await?;
        let updated = apply_credit(balance, amount, now);
        self.store.save(&updated).await?;
        Ok(updated)
    }

    pub async fn debit(&self, player_id: &str, amount: Decimal, now: DateTime<Utc>) -> Result<JewelBalance, EngineError> {
        let balance = self.store.get_or_create(player_id, now).await?;
        let updated = apply_debit(balance, amount, now)?;
        self.store.save(&updated).await?;
        Ok(updated)
    }

    /// Wraps `credit` with a per-job idempotency guard: a `job_id` already
    /// claimed is treated as already-processed and returns success-no-op.
    pub async fn record_deposit(&self, player_id: &str, job_id: &str, amount: Decimal, now: DateTime<Utc>) -> Result<(), EngineError> {
        if !self.store.claim_deposit(job_id).await? {
            return Ok(());
        }
        self.credit(player_id, amount, now).await?;
        Ok(())
    }
}

#[async_trait]
impl<S: LedgerStore> OptimizationLedger for BalanceLedger<S> {
    async fn record_deposit(&self, player_id: &str, job_id: &str, amount: Decimal) -> Result<(), EngineError> {
        BalanceLedger::record_deposit(self, player_id, job_id, amount, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn credit_raises_tier_when_lifetime_crosses_a_boundary() {
        let balance = JewelBalance::new("p1".into(), now());
        let credited = apply_credit(balance, Decimal::from(500), now());
        assert_eq!(credited.lifetime_deposits, Decimal::from(500));
        assert_eq!(credited.tier, Tier::Silver);
    }

    #[test]
    fn debit_below_balance_fails_with_insufficient() {
        let mut balance = JewelBalance::new("p1".into(), now());
        balance.balance = Decimal::from(10);
        let result = apply_debit(balance, Decimal::from(20), now());
        assert!(matches!(result, Err(EngineError::Insufficient { .. })));
    }

    #[test]
    fn debit_never_goes_negative_on_exact_balance() {
        let mut balance = JewelBalance::new("p1".into(), now());
        balance.balance = Decimal::from(25);
        let result = apply_debit(balance, Decimal::from(25), now()).unwrap();
        assert_eq!(result.balance, Decimal::ZERO);
    }

    #[test]
    fn tier_never_decreases_from_a_single_credit() {
        let mut balance = JewelBalance::new("p1".into(), now());
        balance.lifetime_deposits = Decimal::from(9_999);
        balance.tier = Tier::Gold;
        let credited = apply_credit(balance, Decimal::from(2), now());
        assert_eq!(credited.tier, Tier::Whale);
    }
}
