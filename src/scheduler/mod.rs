//! L11 — a single cooperative task driving the daily snapshot pipeline
//! (cron, default `0 3 * * *`) and the 10-minute incremental ETL watermark
//! sweep (a fixed interval). Wall-clock cron fields drive the former;
//! a plain duration timer drives the latter.

pub mod cron;

use std::collections::HashMap;
use std::time::{Duration as StdDuration, Instant};

use chrono::Utc;

use crate::error::EngineError;

use self::cron::CronExpr;

pub const INCREMENTAL_ETL_INTERVAL: StdDuration = StdDuration::from_secs(10 * 60);
pub const DEFAULT_SNAPSHOT_CRON: &str = "0 3 * * *";

enum JobKind {
    Cron(CronExpr),
    Interval(StdDuration),
}

struct ScheduledJob {
    name: String,
    kind: JobKind,
}

/// Tracks due-ness per job. Cron jobs compare against wall-clock
/// `DateTime<Utc>`; interval jobs compare against monotonic `Instant`, so
/// neither is perturbed by a system clock adjustment mid-run.
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    next_cron_fire: HashMap<String, chrono::DateTime<Utc>>,
    last_interval_fire: HashMap<String, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { jobs: Vec::new(), next_cron_fire: HashMap::new(), last_interval_fire: HashMap::new() }
    }

    pub fn with_cron_job(mut self, name: &str, expr: &str) -> Result<Self, EngineError> {
        let parsed = CronExpr::parse(expr)?;
        self.jobs.push(ScheduledJob { name: name.to_string(), kind: JobKind::Cron(parsed) });
        Ok(self)
    }

    pub fn with_interval_job(mut self, name: &str, interval: StdDuration) -> Self {
        self.jobs.push(ScheduledJob { name: name.to_string(), kind: JobKind::Interval(interval) });
        self
    }

    pub fn has_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    /// Sleeps until the soonest due job, then returns the names of every
    /// job due at (or before) that instant.
    pub async fn wait_for_next(&mut self) -> Result<Vec<String>, EngineError> {
        if self.jobs.is_empty() {
            tokio::time::sleep(StdDuration::from_secs(86400)).await;
            return Ok(Vec::new());
        }

        let wait = self.shortest_wait()?;
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let mut fired = Vec::new();
        let now = Utc::now();
        let monotonic_now = Instant::now();
        for job in &self.jobs {
            match &job.kind {
                JobKind::Cron(expr) => {
                    let next = *self
                        .next_cron_fire
                        .entry(job.name.clone())
                        .or_insert_with(|| expr.next_after(now).unwrap_or(now));
                    if next <= now {
                        fired.push(job.name.clone());
                        let recomputed = expr.next_after(now)?;
                        self.next_cron_fire.insert(job.name.clone(), recomputed);
                    }
                }
                JobKind::Interval(interval) => {
                    let last = self.last_interval_fire.get(&job.name).copied();
                    let due = match last {
                        None => true,
                        Some(last) => monotonic_now.duration_since(last) >= *interval,
                    };
                    if due {
                        fired.push(job.name.clone());
                        self.last_interval_fire.insert(job.name.clone(), monotonic_now);
                    }
                }
            }
        }
        Ok(fired)
    }

    fn shortest_wait(&mut self) -> Result<StdDuration, EngineError> {
        let now = Utc::now();
        let monotonic_now = Instant::now();
        let mut min_wait = StdDuration::from_secs(86400);

        for job in &self.jobs {
            let wait = match &job.kind {
                JobKind::Cron(expr) => {
                    let next = *self.next_cron_fire.entry(job.name.clone()).or_insert(expr.next_after(now)?);
                    (next - now).to_std().unwrap_or(StdDuration::ZERO)
                }
                JobKind::Interval(interval) => match self.last_interval_fire.get(&job.name) {
                    None => StdDuration::ZERO,
                    Some(last) => interval.saturating_sub(monotonic_now.duration_since(*last)),
                },
            };
            if wait < min_wait {
                min_wait = wait;
            }
        }
        Ok(min_wait)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_parse_rejects_bad_expression_at_construction() {
        let result = Scheduler::new().with_cron_job("snapshot", "not a cron");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn interval_job_fires_immediately_on_first_poll() {
        let mut scheduler = Scheduler::new().with_interval_job("etl", StdDuration::from_millis(1));
        let fired = scheduler.wait_for_next().await.unwrap();
        assert_eq!(fired, vec!["etl".to_string()]);
    }
}
