use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::EngineError;
use crate::ledger::LedgerStore;
use crate::model::jewel_balance::{JewelBalance, Tier};

use super::Db;

pub struct SqliteLedgerStore {
    pub db: Db,
}

impl SqliteLedgerStore {
    pub fn new(db: Db) -> Self {
        SqliteLedgerStore { db }
    }
}

fn tier_str(tier: Tier) -> &'static str {
    match tier {
        Tier::Free => "free",
        Tier::Bronze => "bronze",
        Tier::Silver => "silver",
        Tier::Gold => "gold",
        Tier::Whale => "whale",
    }
}

fn parse_tier(s: &str) -> Tier {
    match s {
        "bronze" => Tier::Bronze,
        "silver" => Tier::Silver,
        "gold" => Tier::Gold,
        "whale" => Tier::Whale,
        _ => Tier::Free,
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn get_or_create(&self, player_id: &str, now: DateTime<Utc>) -> Result<JewelBalance, EngineError> {
        let conn = self.db.lock().await;
        let existing = conn
            .query_row(
                "SELECT balance, lifetime_deposits, tier, last_deposit_at, updated_at FROM jewel_balances WHERE player_id = ?1",
                params![player_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(EngineError::from)?;

        match existing {
            Some((balance, lifetime, tier, last_deposit_at, updated_at)) => Ok(JewelBalance {
                player_id: player_id.to_string(),
                balance: Decimal::from_str(&balance).map_err(|e| EngineError::Internal(e.to_string()))?,
                lifetime_deposits: Decimal::from_str(&lifetime).map_err(|e| EngineError::Internal(e.to_string()))?,
                tier: parse_tier(&tier),
                last_deposit_at: last_deposit_at
                    .map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
                    .transpose()
                    .map_err(|e| EngineError::Internal(e.to_string()))?,
                updated_at: DateTime::parse_from_rfc3339(&updated_at)
                    .map_err(|e| EngineError::Internal(e.to_string()))?
                    .with_timezone(&Utc),
            }),
            None => {
                let fresh = JewelBalance::new(player_id.to_string(), now);
                conn.execute(
                    "INSERT INTO jewel_balances (player_id, balance, lifetime_deposits, tier, last_deposit_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        fresh.player_id,
                        fresh.balance.to_string(),
                        fresh.lifetime_deposits.to_string(),
                        tier_str(fresh.tier),
                        fresh.last_deposit_at.map(|d| d.to_rfc3339()),
                        fresh.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(fresh)
            }
        }
    }

    async fn save(&self, balance: &JewelBalance) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO jewel_balances (player_id, balance, lifetime_deposits, tier, last_deposit_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(player_id) DO UPDATE SET
                balance = excluded.balance,
                lifetime_deposits = excluded.lifetime_deposits,
                tier = excluded.tier,
                last_deposit_at = excluded.last_deposit_at,
                updated_at = excluded.updated_at",
            params![
                balance.player_id,
                balance.balance.to_string(),
                balance.lifetime_deposits.to_string(),
                tier_str(balance.tier),
                balance.last_deposit_at.map(|d| d.to_rfc3339()),
                balance.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn claim_deposit(&self, job_id: &str) -> Result<bool, EngineError> {
        let conn = self.db.lock().await;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO ledger_credits (job_id, credited_at) VALUES (?1, ?2)",
            params![job_id, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
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

    #[tokio::test]
    async fn get_or_create_persists_a_fresh_zero_balance() {
        let store = SqliteLedgerStore::new(test_db());
        let balance = store.get_or_create("p1", now()).await.unwrap();
        assert_eq!(balance.balance, Decimal::ZERO);
        let reloaded = store.get_or_create("p1", now()).await.unwrap();
        assert_eq!(reloaded, balance);
    }

    #[tokio::test]
    async fn claim_deposit_is_one_shot_per_job() {
        let store = SqliteLedgerStore::new(test_db());
        assert!(store.claim_deposit("job1").await.unwrap());
        assert!(!store.claim_deposit("job1").await.unwrap());
        assert!(store.claim_deposit("job2").await.unwrap());
    }

    #[tokio::test]
    async fn save_round_trips_decimal_precision() {
        let store = SqliteLedgerStore::new(test_db());
        let mut balance = store.get_or_create("p1", now()).await.unwrap();
        balance.balance = Decimal::from_str("123.456789").unwrap();
        store.save(&balance).await.unwrap();
        let reloaded = store.get_or_create("p1", now()).await.unwrap();
        assert_eq!(reloaded.balance, Decimal::from_str("123.456789").unwrap());
    }
}
