//! L9 — drains `payment_verified` jobs one at a time and ships a
//! personalized garden-assignment report back through outbound chat.
//!
//! Modeled as a linear pipeline (`claim -> analyze -> optimize -> format
//! -> send -> complete`), each stage returning a typed intermediate and
//! propagating failure with `?` into a single per-job `match` at the call
//! site -- no deep callback nesting.

pub mod algorithm;
pub mod format;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

use crate::cache::PoolCache;
use crate::chat::{send_chunked, OutboundChat, MESSAGE_CHAR_LIMIT};
use crate::error::EngineError;
use crate::model::hero::{HeroGeneticRecord, HeroInfo};
use crate::model::payment_job::PaymentJob;
use crate::model::player::Player;

use self::algorithm::{optimize, DefaultHeroAssignmentStrategy, HeroAssignmentStrategy, HeroCandidate, DEFAULT_MAX_ASSIGNMENTS};
use self::format::{additional_annual_usd, render_current_state, render_math_breakdown, render_recommendation};

#[async_trait]
pub trait HeroSource: Send + Sync {
    async fn get_heroes_by_owner(&self, wallet: &str) -> Result<Vec<HeroInfo>, EngineError>;
}

#[async_trait]
pub trait PlayerSource: Send + Sync {
    async fn get_player(&self, player_id: &str) -> Result<Option<Player>, EngineError>;
}

/// Durable mirror of the job's second half of its lifecycle. Claiming is
/// the WHERE-guarded `payment_verified -> processing` transition; losing
/// the race (another worker already claimed it) returns `Ok(None)`, never
/// an error.
#[async_trait]
pub trait OptimizationJobStore: Send + Sync {
    async fn claim_for_processing(&self, job_id: &str) -> Result<Option<PaymentJob>, EngineError>;
    async fn complete(&self, job_id: &str, report: serde_json::Value) -> Result<(), EngineError>;
    async fn fail(&self, job_id: &str, message: &str) -> Result<(), EngineError>;
}

#[async_trait]
pub trait OptimizationLedger: Send + Sync {
    async fn record_deposit(&self, player_id: &str, job_id: &str, amount: Decimal) -> Result<(), EngineError>;
}

pub struct OptimizationProcessor {
    pub job_store: Arc<dyn OptimizationJobStore>,
    pub hero_source: Arc<dyn HeroSource>,
    pub player_source: Arc<dyn PlayerSource>,
    pub ledger: Arc<dyn OptimizationLedger>,
    pub pool_cache: Arc<PoolCache>,
    pub chat: Arc<dyn OutboundChat>,
    pub strategy: Box<dyn HeroAssignmentStrategy>,
    pub max_assignments: usize,
}

struct Analysis {
    player: Player,
    heroes: Vec<HeroCandidate>,
    pools_by_pid: HashMap<u32, crate::model::pool::GardenPool>,
}

impl OptimizationProcessor {
    pub fn new(
        job_store: Arc<dyn OptimizationJobStore>,
        hero_source: Arc<dyn HeroSource>,
        player_source: Arc<dyn PlayerSource>,
        ledger: Arc<dyn OptimizationLedger>,
        pool_cache: Arc<PoolCache>,
        chat: Arc<dyn OutboundChat>,
    ) -> Self {
        OptimizationProcessor {
            job_store,
            hero_source,
            player_source,
            ledger,
            pool_cache,
            chat,
            strategy: Box::new(DefaultHeroAssignmentStrategy),
            max_assignments: DEFAULT_MAX_ASSIGNMENTS,
        }
    }

    /// Drains one job end to end. Any stage's failure transitions the job
    /// to `failed` with the error message stored; it never propagates
    /// past this call, so one bad job never halts the draining loop.
    pub async fn process_one(&self, job_id: &str) -> Result<(), EngineError> {
        let job = match self.job_store.claim_for_processing(job_id).await? {
            Some(job) => job,
            None => return Ok(()),
        };

        match self.run_pipeline(&job).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "optimization job failed");
                self.job_store.fail(&job.id, &e.user_message()).await?;
                Ok(())
            }
        }
    }

    async fn run_pipeline(&self, job: &PaymentJob) -> Result<(), EngineError> {
        let analysis = self.analyze(job).await?;
        let assignments = optimize(&analysis.heroes, &analysis.pools_by_pid.values().cloned().collect::<Vec<_>>(), self.max_assignments, self.strategy.as_ref());

        let current_chunk = render_current_state(&analysis.player.display_name, analysis.heroes.len(), &assignments);
        let recommendation_chunk = render_recommendation(&assignments, &analysis.pools_by_pid);
        let avg_staked_usd_hint = 1000.0;
        let usd_gain = additional_annual_usd(&assignments, avg_staked_usd_hint);
        let math_chunk = render_math_breakdown(&assignments);

        let chat_id = analysis.player.chat_id.clone();
        send_chunked(self.chat.as_ref(), &chat_id, &current_chunk, MESSAGE_CHAR_LIMIT).await?;
        send_chunked(self.chat.as_ref(), &chat_id, &recommendation_chunk, MESSAGE_CHAR_LIMIT).await?;
        send_chunked(self.chat.as_ref(), &chat_id, &math_chunk, MESSAGE_CHAR_LIMIT).await?;

        let report = json!({
            "generatedAt": Utc::now(),
            "heroCount": analysis.heroes.len(),
            "assignments": assignments.iter().map(|a| json!({
                "heroId": a.hero_id,
                "poolPid": a.pool_pid,
                "currentApr": a.current_apr,
                "expectedApr": a.expected_apr,
                "deltaApr": a.delta_apr,
            })).collect::<Vec<_>>(),
            "additionalAnnualUsd": usd_gain,
        });
        self.job_store.complete(&job.id, report).await?;
        self.ledger.record_deposit(&job.player_id, &job.id, job.expected_amount).await?;
        Ok(())
    }

    async fn analyze(&self, job: &PaymentJob) -> Result<Analysis, EngineError> {
        let player = self
            .player_source
            .get_player(&job.player_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("player {} not found", job.player_id)))?;

        if !self.pool_cache.wait_for_ready(|_elapsed_secs| {}).await {
            return Err(EngineError::Stale("pool cache did not become ready in time".into()));
        }
        let pools_by_pid: HashMap<u32, crate::model::pool::GardenPool> = (*self.pool_cache.get_all().await).clone();

        let raw_heroes = self.hero_source.get_heroes_by_owner(&job.from_wallet).await?;
        let heroes = raw_heroes
            .iter()
            .filter_map(|h| HeroGeneticRecord::decode(h).ok().map(|r| HeroCandidate { hero_id: r.hero_id, genes: r.genes, current_pid: None }))
            .collect();

        Ok(Analysis { player, heroes, pools_by_pid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::payment_job::PaymentJobStatus;
    use std::sync::Mutex as StdMutex;

    struct NeverClaims;
    #[async_trait]
    impl OptimizationJobStore for NeverClaims {
        async fn claim_for_processing(&self, _job_id: &str) -> Result<Option<PaymentJob>, EngineError> {
            Ok(None)
        }
        async fn complete(&self, _job_id: &str, _report: serde_json::Value) -> Result<(), EngineError> {
            unreachable!()
        }
        async fn fail(&self, _job_id: &str, _message: &str) -> Result<(), EngineError> {
            unreachable!()
        }
    }

    struct NoopHeroes;
    #[async_trait]
    impl HeroSource for NoopHeroes {
        async fn get_heroes_by_owner(&self, _wallet: &str) -> Result<Vec<HeroInfo>, EngineError> {
            Ok(vec![])
        }
    }

    struct NoopPlayers;
    #[async_trait]
    impl PlayerSource for NoopPlayers {
        async fn get_player(&self, _player_id: &str) -> Result<Option<Player>, EngineError> {
            Ok(None)
        }
    }

    struct NoopLedger;
    #[async_trait]
    impl OptimizationLedger for NoopLedger {
        async fn record_deposit(&self, _player_id: &str, _job_id: &str, _amount: Decimal) -> Result<(), EngineError> {
            Ok(())
        }
    }

    struct CapturingChat(StdMutex<Vec<String>>);
    #[async_trait]
    impl OutboundChat for CapturingChat {
        async fn send_direct(&self, _chat_user_id: &str, message: &str) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    fn job() -> PaymentJob {
        let mut j = PaymentJob::new("job1".into(), "player1".into(), "0xwallet".into(), Decimal::from(25), 100, Utc::now());
        j.status = PaymentJobStatus::PaymentVerified;
        j
    }

    #[tokio::test]
    async fn losing_the_claim_race_is_a_silent_noop() {
        let processor = OptimizationProcessor::new(
            Arc::new(NeverClaims),
            Arc::new(NoopHeroes),
            Arc::new(NoopPlayers),
            Arc::new(NoopLedger),
            Arc::new(PoolCache::new(None)),
            Arc::new(CapturingChat(StdMutex::new(vec![]))),
        );
        assert!(processor.process_one(&job().id).await.is_ok());
    }
}
