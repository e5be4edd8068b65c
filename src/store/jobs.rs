use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::EngineError;
use crate::model::payment_job::{PaymentJob, PaymentJobStatus};
use crate::optimizer::OptimizationJobStore;
use crate::payments::PaymentJobStore;

use super::Db;

pub struct JobStore {
    pub db: Db,
}

impl JobStore {
    pub fn new(db: Db) -> Self {
        JobStore { db }
    }

    pub async fn insert(&self, job: &PaymentJob) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        insert_row(&conn, job)
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<PaymentJob>, EngineError> {
        let conn = self.db.lock().await;
        get_row(&conn, job_id)
    }

    /// Jobs the optimization drain loop should pick up next.
    pub async fn list_payment_verified(&self) -> Result<Vec<PaymentJob>, EngineError> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, player_id, status, from_wallet, expected_amount, requested_at, expires_at,
                start_block, last_scanned_block, tx_hash, paid_amount, paid_at, error_message, lp_snapshot_json, report_json
             FROM payment_jobs WHERE status = 'payment_verified'",
        )?;
        let rows = stmt.query_map([], row_to_job)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row??);
        }
        Ok(out)
    }

    /// Jobs still open for a payment match, replayed into the in-memory
    /// registry (L6) at startup.
    pub async fn list_pending(&self) -> Result<Vec<PaymentJob>, EngineError> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, player_id, status, from_wallet, expected_amount, requested_at, expires_at,
                start_block, last_scanned_block, tx_hash, paid_amount, paid_at, error_message, lp_snapshot_json, report_json
             FROM payment_jobs WHERE status = 'pending'",
        )?;
        let rows = stmt.query_map([], row_to_job)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row??);
        }
        Ok(out)
    }
}

fn insert_row(conn: &rusqlite::Connection, job: &PaymentJob) -> Result<(), EngineError> {
    conn.execute(
        "INSERT INTO payment_jobs (id, player_id, status, from_wallet, expected_amount, requested_at, expires_at,
            start_block, last_scanned_block, tx_hash, paid_amount, paid_at, error_message, lp_snapshot_json, report_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            job.id,
            job.player_id,
            job.status.as_str(),
            job.from_wallet,
            job.expected_amount.to_string(),
            job.requested_at.to_rfc3339(),
            job.expires_at.to_rfc3339(),
            job.start_block as i64,
            job.last_scanned_block as i64,
            job.tx_hash,
            job.paid_amount.map(|d| d.to_string()),
            job.paid_at.map(|d| d.to_rfc3339()),
            job.error_message,
            job.lp_snapshot.as_ref().map(|v| v.to_string()),
            job.report_payload.as_ref().map(|v| v.to_string()),
        ],
    )?;
    Ok(())
}

fn get_row(conn: &rusqlite::Connection, job_id: &str) -> Result<Option<PaymentJob>, EngineError> {
    conn.query_row(
        "SELECT id, player_id, status, from_wallet, expected_amount, requested_at, expires_at,
            start_block, last_scanned_block, tx_hash, paid_amount, paid_at, error_message, lp_snapshot_json, report_json
         FROM payment_jobs WHERE id = ?1",
        params![job_id],
        row_to_job,
    )
    .optional()
    .map_err(EngineError::from)?
    .transpose()
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Result<PaymentJob, EngineError>> {
    let status: String = row.get(2)?;
    let expected_amount: String = row.get(4)?;
    let requested_at: String = row.get(5)?;
    let expires_at: String = row.get(6)?;
    let paid_amount: Option<String> = row.get(10)?;
    let paid_at: Option<String> = row.get(11)?;
    let lp_snapshot_json: Option<String> = row.get(13)?;
    let report_json: Option<String> = row.get(14)?;

    Ok((|| -> Result<PaymentJob, EngineError> {
        Ok(PaymentJob {
            id: row.get(0)?,
            player_id: row.get(1)?,
            status: PaymentJobStatus::from_str(&status).ok_or_else(|| EngineError::Internal(format!("bad status '{status}'")))?,
            from_wallet: row.get(3)?,
            expected_amount: Decimal::from_str(&expected_amount).map_err(|e| EngineError::Internal(e.to_string()))?,
            requested_at: parse_rfc3339(&requested_at)?,
            expires_at: parse_rfc3339(&expires_at)?,
            start_block: row.get::<_, i64>(7)? as u64,
            last_scanned_block: row.get::<_, i64>(8)? as u64,
            tx_hash: row.get(9)?,
            paid_amount: paid_amount.map(|s| Decimal::from_str(&s)).transpose().map_err(|e| EngineError::Internal(e.to_string()))?,
            paid_at: paid_at.map(|s| parse_rfc3339(&s)).transpose()?,
            error_message: row.get(12)?,
            lp_snapshot: lp_snapshot_json.map(|s| serde_json::from_str(&s)).transpose().map_err(|e| EngineError::Internal(e.to_string()))?,
            report_payload: report_json.map(|s| serde_json::from_str(&s)).transpose().map_err(|e| EngineError::Internal(e.to_string()))?,
        })
    })())
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)).map_err(|e| EngineError::Internal(e.to_string()))
}

#[async_trait]
impl PaymentJobStore for JobStore {
    async fn mark_payment_verified(&self, job_id: &str, tx_hash: &str, paid_amount: Decimal, paid_at: DateTime<Utc>) -> Result<bool, EngineError> {
        let conn = self.db.lock().await;
        let changed = conn.execute(
            "UPDATE payment_jobs SET status = 'payment_verified', tx_hash = ?2, paid_amount = ?3, paid_at = ?4
             WHERE id = ?1 AND status = 'pending'",
            params![job_id, tx_hash, paid_amount.to_string(), paid_at.to_rfc3339()],
        )?;
        Ok(changed == 1)
    }

    async fn set_last_scanned_block(&self, job_id: &str, block: u64) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        conn.execute(
            "UPDATE payment_jobs SET last_scanned_block = ?2 WHERE id = ?1",
            params![job_id, block as i64],
        )?;
        Ok(())
    }

    async fn mark_expired(&self, job_id: &str) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        conn.execute(
            "UPDATE payment_jobs SET status = 'expired' WHERE id = ?1 AND status = 'pending'",
            params![job_id],
        )?;
        Ok(())
    }
}

#[async_trait]
impl OptimizationJobStore for JobStore {
    async fn claim_for_processing(&self, job_id: &str) -> Result<Option<PaymentJob>, EngineError> {
        let conn = self.db.lock().await;
        let changed = conn.execute(
            "UPDATE payment_jobs SET status = 'processing' WHERE id = ?1 AND status = 'payment_verified'",
            params![job_id],
        )?;
        if changed != 1 {
            return Ok(None);
        }
        get_row(&conn, job_id)
    }

    async fn complete(&self, job_id: &str, report: serde_json::Value) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        conn.execute(
            "UPDATE payment_jobs SET status = 'completed', report_json = ?2 WHERE id = ?1",
            params![job_id, report.to_string()],
        )?;
        Ok(())
    }

    async fn fail(&self, job_id: &str, message: &str) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        conn.execute(
            "UPDATE payment_jobs SET status = 'failed', error_message = ?2 WHERE id = ?1",
            params![job_id, message],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn test_db() -> Db {
        let conn = Connection::open_in_memory().unwrap();
        super::super::migrate(&conn).unwrap();
        std::sync::Arc::new(tokio::sync::Mutex::new(conn))
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    async fn seed_player(db: &Db, id: &str) {
        let conn = db.lock().await;
        conn.execute(
            "INSERT INTO players (id, chat_id, display_name, primary_wallet, wallets_json, first_seen_at, last_seen_at, profile_json, status)
             VALUES (?1, ?1, ?1, NULL, '[]', ?2, ?2, '{}', 'active')",
            params![id, now().to_rfc3339()],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn claim_for_processing_only_succeeds_from_payment_verified() {
        let db = test_db();
        seed_player(&db, "p1").await;
        let store = JobStore::new(db);
        let mut job = PaymentJob::new("j1".into(), "p1".into(), "0xabc".into(), Decimal::from(25), 100, now());
        store.insert(&job).await.unwrap();

        assert!(store.claim_for_processing("j1").await.unwrap().is_none());

        job.status = PaymentJobStatus::PaymentVerified;
        let conn = store.db.lock().await;
        conn.execute("UPDATE payment_jobs SET status = 'payment_verified' WHERE id = 'j1'", []).unwrap();
        drop(conn);

        let claimed = store.claim_for_processing("j1").await.unwrap();
        assert!(claimed.is_some());
        assert!(store.claim_for_processing("j1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_payment_verified_is_where_guarded_to_pending() {
        let db = test_db();
        seed_player(&db, "p1").await;
        let store = JobStore::new(db);
        let job = PaymentJob::new("j1".into(), "p1".into(), "0xabc".into(), Decimal::from(25), 100, now());
        store.insert(&job).await.unwrap();

        let flipped = PaymentJobStore::mark_payment_verified(&store, "j1", "0xtx", Decimal::from(25), now()).await.unwrap();
        assert!(flipped);
        let again = PaymentJobStore::mark_payment_verified(&store, "j1", "0xtx2", Decimal::from(25), now()).await.unwrap();
        assert!(!again);
    }

    #[tokio::test]
    async fn mark_expired_only_applies_to_pending() {
        let db = test_db();
        seed_player(&db, "p1").await;
        let store = JobStore::new(db);
        let job = PaymentJob::new("j1".into(), "p1".into(), "0xabc".into(), Decimal::from(25), 100, now());
        store.insert(&job).await.unwrap();
        PaymentJobStore::mark_payment_verified(&store, "j1", "0xtx", Decimal::from(25), now()).await.unwrap();
        PaymentJobStore::mark_expired(&store, "j1").await.unwrap();
        let reloaded = store.get("j1").await.unwrap().unwrap();
        assert_eq!(reloaded.status, PaymentJobStatus::PaymentVerified);
    }
}
