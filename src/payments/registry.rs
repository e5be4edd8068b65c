//! L6 — in-memory set of open payment jobs, mirrored in the durable
//! store. Concurrent add/remove is always paired with a DB write in the
//! same operation so the store stays authoritative.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::payment_job::PaymentJob;

#[derive(Default)]
pub struct PaymentJobRegistry {
    jobs: RwLock<HashMap<String, PaymentJob>>,
}

impl PaymentJobRegistry {
    pub fn new() -> Self {
        PaymentJobRegistry { jobs: RwLock::new(HashMap::new()) }
    }

    /// Replays all `pending` jobs from the store at startup.
    pub async fn load(&self, pending_jobs: Vec<PaymentJob>) {
        let mut jobs = self.jobs.write().await;
        jobs.clear();
        for job in pending_jobs {
            jobs.insert(job.id.clone(), job);
        }
    }

    pub async fn insert(&self, job: PaymentJob) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    pub async fn remove(&self, job_id: &str) -> Option<PaymentJob> {
        self.jobs.write().await.remove(job_id)
    }

    pub async fn get(&self, job_id: &str) -> Option<PaymentJob> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn all(&self) -> Vec<PaymentJob> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn set_last_scanned_block(&self, job_id: &str, block: u64) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.last_scanned_block = block;
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

pub type SharedRegistry = Arc<PaymentJobRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn job(id: &str) -> PaymentJob {
        PaymentJob::new(id.into(), "player1".into(), "0xwallet".into(), Decimal::from(25), 100, Utc::now())
    }

    #[tokio::test]
    async fn insert_then_remove_round_trips() {
        let registry = PaymentJobRegistry::new();
        registry.insert(job("job1")).await;
        assert_eq!(registry.len().await, 1);
        let removed = registry.remove("job1").await;
        assert!(removed.is_some());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn load_replaces_existing_jobs() {
        let registry = PaymentJobRegistry::new();
        registry.insert(job("stale")).await;
        registry.load(vec![job("fresh")]).await;
        assert!(registry.get("stale").await.is_none());
        assert!(registry.get("fresh").await.is_some());
    }
}
