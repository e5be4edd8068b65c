use rusqlite::params;

use crate::error::EngineError;
use crate::model::player::ProfileData;
use crate::model::wallet_snapshot::WalletSnapshot;

use super::Db;

pub struct SnapshotStore {
    pub db: Db,
}

impl SnapshotStore {
    pub fn new(db: Db) -> Self {
        SnapshotStore { db }
    }

    /// Rows are immutable once written: a rerun within the same UTC day
    /// collides on `(wallet, as_of_date)` and is a silent no-op.
    pub async fn upsert_wallet_snapshot(&self, row: &WalletSnapshot) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO wallet_snapshots (player_id, wallet, as_of_date, jewel, crystal, cjewel)
             SELECT id, ?2, ?3, ?4, ?5, ?6 FROM players WHERE wallets_json LIKE ?1
             ON CONFLICT(wallet, as_of_date) DO NOTHING",
            params![
                format!("%\"{}\"%", row.wallet),
                row.wallet,
                row.as_of_date.to_string(),
                row.jewel.to_string(),
                row.crystal.to_string(),
                row.cjewel.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Merges a freshly built snapshot into the owning player's
    /// `profile_data.dfk_snapshot`, replacing whatever was there before.
    pub async fn merge_into_player_profile(&self, player_id: &str, snapshot: &serde_json::Value) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        let profile_json: String = conn
            .query_row("SELECT profile_json FROM players WHERE id = ?1", params![player_id], |row| row.get(0))
            .map_err(EngineError::from)?;
        let mut profile: ProfileData = serde_json::from_str(&profile_json).map_err(|e| EngineError::Internal(e.to_string()))?;
        profile.dfk_snapshot = Some(snapshot.clone());
        let updated = serde_json::to_string(&profile).map_err(|e| EngineError::Internal(e.to_string()))?;
        conn.execute("UPDATE players SET profile_json = ?2 WHERE id = ?1", params![player_id, updated])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::players::PlayerStore;
    use chrono::Utc;
    use rusqlite::Connection;
    use rust_decimal::Decimal;

    fn test_db() -> Db {
        let conn = Connection::open_in_memory().unwrap();
        super::super::migrate(&conn).unwrap();
        std::sync::Arc::new(tokio::sync::Mutex::new(conn))
    }

    #[tokio::test]
    async fn upsert_is_a_no_op_on_the_second_call_for_the_same_day() {
        let db = test_db();
        let players = PlayerStore::new(db.clone());
        let now = Utc::now();
        let mut player = players.get_or_create("chat1", "Ada", now).await.unwrap();
        player.link_wallet("0xabc");
        players.save(&player).await.unwrap();

        let store = SnapshotStore::new(db.clone());
        let row = WalletSnapshot {
            wallet: "0xabc".into(),
            as_of_date: now.date_naive(),
            jewel: Decimal::from(10),
            crystal: Decimal::from(5),
            cjewel: Decimal::from(1),
        };
        store.upsert_wallet_snapshot(&row).await.unwrap();
        store.upsert_wallet_snapshot(&row).await.unwrap();

        let conn = db.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM wallet_snapshots", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn merge_into_player_profile_sets_dfk_snapshot() {
        let db = test_db();
        let players = PlayerStore::new(db.clone());
        let now = Utc::now();
        let player = players.get_or_create("chat1", "Ada", now).await.unwrap();

        let store = SnapshotStore::new(db.clone());
        let snapshot = serde_json::json!({"heroCount": 5});
        store.merge_into_player_profile(&player.id, &snapshot).await.unwrap();

        let reloaded = players.get(&player.id).await.unwrap().unwrap();
        assert_eq!(reloaded.profile_data.dfk_snapshot, Some(snapshot));
    }
}
