use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::error::EngineError;
use crate::model::pricing_config::PricingConfig;
use crate::pricing::PricingConfigStore;

use super::Db;

const CONFIG_KEY: &str = "pricing_config";

pub struct SqlitePricingConfigStore {
    pub db: Db,
}

impl SqlitePricingConfigStore {
    pub fn new(db: Db) -> Self {
        SqlitePricingConfigStore { db }
    }

    /// Persists a config, overwriting the current row. Used by the admin
    /// surface; not part of the hot-path read trait.
    pub async fn save(&self, config: &PricingConfig, updated_by: &str) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        let value = serde_json::to_string(config).map_err(|e| EngineError::Internal(e.to_string()))?;
        conn.execute(
            "INSERT INTO pricing_config (config_key, config_value, description, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(config_key) DO UPDATE SET
                config_value = excluded.config_value,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at",
            params![CONFIG_KEY, value, "garden keeper pricing table", updated_by, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl PricingConfigStore for SqlitePricingConfigStore {
    async fn load(&self) -> Result<PricingConfig, EngineError> {
        let conn = self.db.lock().await;
        let value: Option<String> = conn
            .query_row(
                "SELECT config_value FROM pricing_config WHERE config_key = ?1",
                params![CONFIG_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(EngineError::from)?;

        match value {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| EngineError::Internal(e.to_string())),
            None => Ok(PricingConfig::default()),
        }
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
    async fn load_without_a_saved_row_falls_back_to_defaults() {
        let store = SqlitePricingConfigStore::new(test_db());
        let config = store.load().await.unwrap();
        assert_eq!(config, PricingConfig::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = SqlitePricingConfigStore::new(test_db());
        let mut config = PricingConfig::default();
        config.version = 2;
        store.save(&config, "admin").await.unwrap();
        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.version, 2);
    }
}
