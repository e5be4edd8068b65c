//! L15 — the SQLite storage layer. One `rusqlite::Connection` behind a
//! `tokio::sync::Mutex`, WAL mode, idempotent `CREATE TABLE IF NOT
//! EXISTS` migrations. Every table maps to one logical entity; nested
//! structured data (classification vectors, snapshots, reports) is
//! stored as a JSON text column rather than normalized further.

pub mod jobs;
pub mod ledger;
pub mod players;
pub mod pricing;
pub mod snapshots;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tokio::sync::Mutex;

pub type Db = Arc<Mutex<Connection>>;

pub fn open(path: &Path) -> Result<Db> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("creating storage directory")?;
        }
    }

    let conn = Connection::open(path).with_context(|| format!("opening sqlite at {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
    migrate(&conn)?;

    Ok(Arc::new(Mutex::new(conn)))
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS players (
            id             TEXT PRIMARY KEY,
            chat_id        TEXT UNIQUE NOT NULL,
            display_name   TEXT NOT NULL,
            primary_wallet TEXT,
            wallets_json   TEXT NOT NULL,
            first_seen_at  TEXT NOT NULL,
            last_seen_at   TEXT NOT NULL,
            profile_json   TEXT NOT NULL,
            status         TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS wallet_snapshots (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id   TEXT NOT NULL REFERENCES players(id) ON DELETE CASCADE,
            wallet      TEXT NOT NULL,
            as_of_date  TEXT NOT NULL,
            jewel       TEXT NOT NULL,
            crystal     TEXT NOT NULL,
            cjewel      TEXT NOT NULL,
            UNIQUE(wallet, as_of_date)
        );

        CREATE TABLE IF NOT EXISTS jewel_balances (
            player_id         TEXT PRIMARY KEY REFERENCES players(id) ON DELETE CASCADE,
            balance           TEXT NOT NULL,
            lifetime_deposits TEXT NOT NULL,
            tier              TEXT NOT NULL,
            last_deposit_at   TEXT,
            updated_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ledger_credits (
            job_id      TEXT PRIMARY KEY,
            credited_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS payment_jobs (
            id                 TEXT PRIMARY KEY,
            player_id          TEXT NOT NULL REFERENCES players(id) ON DELETE CASCADE,
            status             TEXT NOT NULL,
            from_wallet        TEXT NOT NULL,
            expected_amount    TEXT NOT NULL,
            requested_at       TEXT NOT NULL,
            expires_at         TEXT NOT NULL,
            start_block        INTEGER NOT NULL,
            last_scanned_block INTEGER NOT NULL,
            tx_hash            TEXT,
            paid_amount        TEXT,
            paid_at            TEXT,
            error_message      TEXT,
            lp_snapshot_json   TEXT,
            report_json        TEXT
        );

        CREATE TABLE IF NOT EXISTS pricing_config (
            config_key   TEXT PRIMARY KEY,
            config_value TEXT NOT NULL,
            description  TEXT,
            updated_by   TEXT,
            updated_at   TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }
}
