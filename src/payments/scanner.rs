//! L7 — per-job fast scanner (no global backfill). Each job tracks
//! `startBlock`/`lastScannedBlock`; the scanner iterates jobs, scanning
//! `lastScan+1..currentTip` in ~50 block chunks, and matches transfers
//! against open invoices by `(sender, amount+-eps, time window)`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::chain::{Chain, ChainClient};
use crate::error::EngineError;
use crate::model::payment_job::PaymentJob;

use super::explorer::ExplorerClient;
use super::registry::SharedRegistry;

pub const CHUNK_SIZE: u64 = 50;
pub const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);
pub const MANUAL_VERIFY_LOOKBACK_BLOCKS: u64 = 1000;
pub const DEFAULT_EPSILON: &str = "0.1";

/// True iff `transfer.amount` is within `epsilon` of `expected` and
/// `transfer.from` matches `job_wallet` case-insensitively.
pub fn matches_job(transfer_amount: Decimal, transfer_from: &str, expected: Decimal, job_wallet: &str, epsilon: Decimal) -> bool {
    (transfer_amount - expected).abs() <= epsilon && transfer_from.to_lowercase() == job_wallet.to_lowercase()
}

/// Durable mirror of job state transitions. Implemented by the storage
/// layer; the scanner only ever calls WHERE-guarded transitions so a lost
/// race (another worker already flipped the row) is a no-op, not an error.
#[async_trait]
pub trait PaymentJobStore: Send + Sync {
    /// `pending -> payment_verified`, guarded by `WHERE status = 'pending'`.
    /// Returns `true` if this call performed the transition.
    async fn mark_payment_verified(
        &self,
        job_id: &str,
        tx_hash: &str,
        paid_amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, EngineError>;

    async fn set_last_scanned_block(&self, job_id: &str, block: u64) -> Result<(), EngineError>;

    /// `pending -> expired`, unguarded by other state since `expired` is a
    /// terminal sink for `pending` only.
    async fn mark_expired(&self, job_id: &str) -> Result<(), EngineError>;
}

pub enum VerifyOutcome {
    Verified { tx_hash: String },
    AlreadyProcessed,
    NoMatch,
}

pub struct PaymentScanner<S: PaymentJobStore> {
    pub chain_client: Arc<ChainClient>,
    pub registry: SharedRegistry,
    pub store: Arc<S>,
    pub explorer: Option<Arc<ExplorerClient>>,
    pub house_wallet: String,
    pub epsilon: Decimal,
    pub token_address: std::collections::HashMap<Chain, alloy::primitives::Address>,
    manual_verify_lock: tokio::sync::Mutex<()>,
}

impl<S: PaymentJobStore> PaymentScanner<S> {
    pub fn new(
        chain_client: Arc<ChainClient>,
        registry: SharedRegistry,
        store: Arc<S>,
        explorer: Option<Arc<ExplorerClient>>,
        house_wallet: String,
        epsilon: Decimal,
        token_address: std::collections::HashMap<Chain, alloy::primitives::Address>,
    ) -> Self {
        PaymentScanner {
            chain_client,
            registry,
            store,
            explorer,
            house_wallet,
            epsilon,
            token_address,
            manual_verify_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// One full poll cycle: scans each open job's chunk, matches, flips
    /// state on match, and runs the expiry sweep at the end.
    pub async fn poll_once(&self, chain: Chain, now: DateTime<Utc>) -> Result<(), EngineError> {
        let jobs = self.registry.all().await;
        for job in &jobs {
            if let Err(e) = self.scan_job(chain, job, now).await {
                tracing::warn!(job_id = %job.id, error = %e, "payment scan failed for job, will retry next cycle");
            }
        }
        self.sweep_expired(now).await;
        Ok(())
    }

    async fn scan_job(&self, chain: Chain, job: &PaymentJob, now: DateTime<Utc>) -> Result<(), EngineError> {
        if !job.status.accepts_payment_match() {
            return Ok(());
        }
        let tip = self.chain_client.get_block_number(chain).await?;
        let from_block = job.last_scanned_block + 1;
        if from_block > tip {
            return Ok(());
        }

        let mut cursor = from_block;
        while cursor <= tip {
            let chunk_end = (cursor + CHUNK_SIZE - 1).min(tip);

            let mut transfers = self.chain_client.query_native_transfers_to_house(chain, cursor, chunk_end).await?;
            if let Some(&token) = self.token_address.get(&chain) {
                transfers.extend(self.chain_client.query_transfer_events(chain, token, cursor, chunk_end).await?);
            }

            if let Some(found) = transfers
                .into_iter()
                .find(|t| matches_job(t.amount, &t.from, job.expected_amount, &job.from_wallet, self.epsilon))
            {
                let flipped = self
                    .store
                    .mark_payment_verified(&job.id, &found.tx_hash, found.amount, now)
                    .await?;
                if flipped {
                    self.registry.remove(&job.id).await;
                }
                return Ok(());
            }

            self.store.set_last_scanned_block(&job.id, chunk_end).await?;
            self.registry.set_last_scanned_block(&job.id, chunk_end).await;
            cursor = chunk_end + 1;
        }
        Ok(())
    }

    /// Any job past `expires_at` flips to `expired`, unguarded by other
    /// state (terminal sink for `pending`).
    async fn sweep_expired(&self, now: DateTime<Utc>) {
        for job in self.registry.all().await {
            if job.status.accepts_payment_match() && job.is_expired(now) {
                if let Err(e) = self.store.mark_expired(&job.id).await {
                    tracing::warn!(job_id = %job.id, error = %e, "failed to expire payment job");
                    continue;
                }
                self.registry.remove(&job.id).await;
            }
        }
    }

    /// Fast-track verify for one job with a ~1000-block lookback (or a
    /// full explorer query). Protected by a process-wide mutex to prevent
    /// concurrent duplicate scans.
    pub async fn manual_verify(&self, chain: Chain, job_id: &str, now: DateTime<Utc>) -> Result<VerifyOutcome, EngineError> {
        let _guard = self.manual_verify_lock.lock().await;
        let Some(job) = self.registry.get(job_id).await else {
            return Ok(VerifyOutcome::AlreadyProcessed);
        };
        if !job.status.accepts_payment_match() {
            return Ok(VerifyOutcome::AlreadyProcessed);
        }

        if let Some(explorer) = &self.explorer {
            let txs = explorer.query_wallet_transactions(&job.from_wallet, &self.house_wallet).await?;
            if let Some(found) = txs
                .into_iter()
                .find(|t| t.success && matches_job(t.amount, &t.from, job.expected_amount, &job.from_wallet, self.epsilon))
            {
                let flipped = self.store.mark_payment_verified(&job.id, &found.tx_hash, found.amount, now).await?;
                if flipped {
                    self.registry.remove(&job.id).await;
                    return Ok(VerifyOutcome::Verified { tx_hash: found.tx_hash });
                }
                return Ok(VerifyOutcome::AlreadyProcessed);
            }
            return Ok(VerifyOutcome::NoMatch);
        }

        let tip = self.chain_client.get_block_number(chain).await?;
        let from_block = tip.saturating_sub(MANUAL_VERIFY_LOOKBACK_BLOCKS);
        let mut transfers = self.chain_client.query_native_transfers_to_house(chain, from_block, tip).await?;
        if let Some(&token) = self.token_address.get(&chain) {
            transfers.extend(self.chain_client.query_transfer_events(chain, token, from_block, tip).await?);
        }
        match transfers
            .into_iter()
            .find(|t| matches_job(t.amount, &t.from, job.expected_amount, &job.from_wallet, self.epsilon))
        {
            Some(found) => {
                let flipped = self.store.mark_payment_verified(&job.id, &found.tx_hash, found.amount, now).await?;
                if flipped {
                    self.registry.remove(&job.id).await;
                    Ok(VerifyOutcome::Verified { tx_hash: found.tx_hash })
                } else {
                    Ok(VerifyOutcome::AlreadyProcessed)
                }
            }
            None => Ok(VerifyOutcome::NoMatch),
        }
    }

    /// A user submits a specific tx hash. Fetches the receipt, requires
    /// `status == success`, `to == house`, `from == job.wallet`,
    /// `value >= job.expected`. Each check failure produces a specific
    /// error; repeat calls on an already-verified job are a no-op success.
    pub async fn verify_tx_hash(&self, chain: Chain, job_id: &str, tx_hash: &str, now: DateTime<Utc>) -> Result<VerifyOutcome, EngineError> {
        let Some(job) = self.registry.get(job_id).await else {
            return Ok(VerifyOutcome::AlreadyProcessed);
        };
        if !job.status.accepts_payment_match() {
            return Ok(VerifyOutcome::AlreadyProcessed);
        }

        let Some(receipt) = self.chain_client.get_transaction_receipt(chain, tx_hash).await? else {
            return Err(EngineError::Validation(format!("transaction {tx_hash} not found")));
        };
        if !receipt.success {
            return Err(EngineError::Validation(format!("transaction {tx_hash} reverted")));
        }
        let Some(to) = &receipt.to else {
            return Err(EngineError::Validation(format!("transaction {tx_hash} has no recipient (contract creation)")));
        };
        if to.to_lowercase() != self.house_wallet.to_lowercase() {
            return Err(EngineError::Validation(format!(
                "transaction {tx_hash} was not sent to the house wallet"
            )));
        }
        if receipt.from.to_lowercase() != job.from_wallet.to_lowercase() {
            return Err(EngineError::Validation(format!(
                "transaction {tx_hash} was not sent from the linked wallet"
            )));
        }
        if receipt.value < job.expected_amount {
            return Err(EngineError::Validation(format!(
                "transaction {tx_hash} amount {} is less than the expected {}",
                receipt.value, job.expected_amount
            )));
        }

        let flipped = self.store.mark_payment_verified(&job.id, tx_hash, receipt.value, now).await?;
        if flipped {
            self.registry.remove(&job.id).await;
            Ok(VerifyOutcome::Verified { tx_hash: tx_hash.to_string() })
        } else {
            Ok(VerifyOutcome::AlreadyProcessed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_within_epsilon_and_case_insensitive_wallet() {
        let expected = Decimal::new(250, 1); // 25.0
        let eps = Decimal::new(1, 1); // 0.1
        assert!(matches_job(Decimal::new(2495, 2), "0xABC", expected, "0xabc", eps));
        assert!(!matches_job(Decimal::new(2489, 2), "0xabc", expected, "0xabc", eps));
    }

    #[test]
    fn wrong_sender_never_matches_even_with_right_amount() {
        let expected = Decimal::from(25);
        let eps = Decimal::new(1, 1);
        assert!(!matches_job(Decimal::from(25), "0xother", expected, "0xabc", eps));
    }
}
