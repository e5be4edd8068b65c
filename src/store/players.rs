use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::EngineError;
use crate::model::player::{Player, PlayerStatus, ProfileData};
use crate::optimizer::PlayerSource;

use super::Db;

pub struct PlayerStore {
    pub db: Db,
}

impl PlayerStore {
    pub fn new(db: Db) -> Self {
        PlayerStore { db }
    }

    pub async fn get(&self, player_id: &str) -> Result<Option<Player>, EngineError> {
        let conn = self.db.lock().await;
        get_by_id(&conn, player_id)
    }

    pub async fn get_by_chat_id(&self, chat_id: &str) -> Result<Option<Player>, EngineError> {
        let conn = self.db.lock().await;
        conn.query_row("SELECT id FROM players WHERE chat_id = ?1", params![chat_id], |row| row.get::<_, String>(0))
            .optional()
            .map_err(EngineError::from)?
            .map(|id| get_by_id(&conn, &id))
            .transpose()
            .map(Option::flatten)
    }

    /// Creates the player row if absent, returning the existing row
    /// otherwise (chat_id is unique, so this is a safe get-or-create).
    pub async fn get_or_create(&self, chat_id: &str, display_name: &str, now: DateTime<Utc>) -> Result<Player, EngineError> {
        if let Some(existing) = self.get_by_chat_id(chat_id).await? {
            return Ok(existing);
        }
        let player = Player::new(uuid::Uuid::new_v4().to_string(), chat_id.to_string(), display_name.to_string(), now);
        self.save(&player).await?;
        Ok(player)
    }

    /// Every non-banned player, for the daily snapshot pipeline (L11) to
    /// walk. Small enough to load in full; revisit with pagination if the
    /// player base outgrows one process's memory.
    pub async fn list_active(&self) -> Result<Vec<Player>, EngineError> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, display_name, primary_wallet, wallets_json, first_seen_at, last_seen_at, profile_json, status
             FROM players WHERE status = 'active'",
        )?;
        let ids: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?.filter_map(Result::ok).collect();
        drop(stmt);
        ids.into_iter().filter_map(|id| get_by_id(&conn, &id).transpose()).collect()
    }

    pub async fn save(&self, player: &Player) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        let wallets_json = serde_json::to_string(&player.wallets).map_err(|e| EngineError::Internal(e.to_string()))?;
        let profile_json = serde_json::to_string(&player.profile_data).map_err(|e| EngineError::Internal(e.to_string()))?;
        conn.execute(
            "INSERT INTO players (id, chat_id, display_name, primary_wallet, wallets_json, first_seen_at, last_seen_at, profile_json, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                primary_wallet = excluded.primary_wallet,
                wallets_json = excluded.wallets_json,
                last_seen_at = excluded.last_seen_at,
                profile_json = excluded.profile_json,
                status = excluded.status",
            params![
                player.id,
                player.chat_id,
                player.display_name,
                player.primary_wallet,
                wallets_json,
                player.first_seen_at.to_rfc3339(),
                player.last_seen_at.to_rfc3339(),
                profile_json,
                status_str(player.status),
            ],
        )?;
        Ok(())
    }
}

fn status_str(status: PlayerStatus) -> &'static str {
    match status {
        PlayerStatus::Active => "active",
        PlayerStatus::Banned => "banned",
    }
}

fn parse_status(s: &str) -> PlayerStatus {
    match s {
        "banned" => PlayerStatus::Banned,
        _ => PlayerStatus::Active,
    }
}

fn get_by_id(conn: &rusqlite::Connection, player_id: &str) -> Result<Option<Player>, EngineError> {
    conn.query_row(
        "SELECT id, chat_id, display_name, primary_wallet, wallets_json, first_seen_at, last_seen_at, profile_json, status
         FROM players WHERE id = ?1",
        params![player_id],
        |row| {
            let wallets_json: String = row.get(4)?;
            let profile_json: String = row.get(7)?;
            let status: String = row.get(8)?;
            let first_seen_at: String = row.get(5)?;
            let last_seen_at: String = row.get(6)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                wallets_json,
                first_seen_at,
                last_seen_at,
                profile_json,
                status,
            ))
        },
    )
    .optional()
    .map_err(EngineError::from)?
    .map(|(id, chat_id, display_name, primary_wallet, wallets_json, first_seen_at, last_seen_at, profile_json, status)| {
        let wallets: Vec<String> = serde_json::from_str(&wallets_json).map_err(|e| EngineError::Internal(e.to_string()))?;
        let profile_data: ProfileData = serde_json::from_str(&profile_json).map_err(|e| EngineError::Internal(e.to_string()))?;
        let first_seen_at = DateTime::parse_from_rfc3339(&first_seen_at)
            .map_err(|e| EngineError::Internal(e.to_string()))?
            .with_timezone(&Utc);
        let last_seen_at = DateTime::parse_from_rfc3339(&last_seen_at)
            .map_err(|e| EngineError::Internal(e.to_string()))?
            .with_timezone(&Utc);
        Ok(Player {
            id,
            chat_id,
            display_name,
            primary_wallet,
            wallets,
            first_seen_at,
            last_seen_at,
            profile_data,
            status: parse_status(&status),
        })
    })
    .transpose()
}

#[async_trait]
impl PlayerSource for PlayerStore {
    async fn get_player(&self, player_id: &str) -> Result<Option<Player>, EngineError> {
        self.get(player_id).await
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

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_chat_id() {
        let store = PlayerStore::new(test_db());
        let now = Utc::now();
        let a = store.get_or_create("chat1", "Ada", now).await.unwrap();
        let b = store.get_or_create("chat1", "Ada Again", now).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn save_round_trips_wallet_links() {
        let store = PlayerStore::new(test_db());
        let now = Utc::now();
        let mut player = store.get_or_create("chat2", "Bo", now).await.unwrap();
        player.link_wallet("0xABC");
        store.save(&player).await.unwrap();
        let reloaded = store.get(&player.id).await.unwrap().unwrap();
        assert_eq!(reloaded.primary_wallet.as_deref(), Some("0xabc"));
    }
}
