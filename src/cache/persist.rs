//! On-disk persistence for the pool cache: `pool_cache.json`. Rejected on
//! load if older than 24h or schema-mismatched.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::pool::GardenPool;

pub const SCHEMA_VERSION: u32 = 1;
const MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCache {
    pub version: u32,
    pub last_updated: DateTime<Utc>,
    pub data: Vec<GardenPool>,
    pub timing_history_ms: Vec<u64>,
}

#[derive(Debug)]
pub enum LoadError {
    Missing,
    Io(std::io::Error),
    Malformed(serde_json::Error),
    SchemaMismatch { found: u32 },
    TooOld { age: Duration },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Missing => write!(f, "no persisted cache file"),
            LoadError::Io(e) => write!(f, "io error reading persisted cache: {e}"),
            LoadError::Malformed(e) => write!(f, "persisted cache is malformed json: {e}"),
            LoadError::SchemaMismatch { found } => {
                write!(f, "persisted cache schema version {found} != {SCHEMA_VERSION}")
            }
            LoadError::TooOld { age } => write!(f, "persisted cache is {age:?} old, rejecting"),
        }
    }
}

pub fn load(path: &Path, now: DateTime<Utc>) -> Result<PersistedCache, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing);
    }
    let raw = std::fs::read_to_string(path).map_err(LoadError::Io)?;
    let parsed: PersistedCache = serde_json::from_str(&raw).map_err(LoadError::Malformed)?;
    if parsed.version != SCHEMA_VERSION {
        return Err(LoadError::SchemaMismatch { found: parsed.version });
    }
    let age = (now - parsed.last_updated).to_std().unwrap_or(Duration::MAX);
    if age > MAX_AGE {
        return Err(LoadError::TooOld { age });
    }
    Ok(parsed)
}

pub fn save(path: &Path, cache: &PersistedCache) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let file = std::fs::File::create(&tmp)?;
    serde_json::to_writer_pretty(file, cache)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_cache_older_than_24h() {
        let dir = tempdir();
        let path = dir.join("pool_cache.json");
        let cache = PersistedCache {
            version: SCHEMA_VERSION,
            last_updated: Utc::now() - chrono::Duration::hours(25),
            data: vec![],
            timing_history_ms: vec![],
        };
        save(&path, &cache).unwrap();
        let result = load(&path, Utc::now());
        assert!(matches!(result, Err(LoadError::TooOld { .. })));
    }

    #[test]
    fn rejects_schema_mismatch() {
        let dir = tempdir();
        let path = dir.join("pool_cache.json");
        let cache = PersistedCache {
            version: SCHEMA_VERSION + 1,
            last_updated: Utc::now(),
            data: vec![],
            timing_history_ms: vec![],
        };
        save(&path, &cache).unwrap();
        let result = load(&path, Utc::now());
        assert!(matches!(result, Err(LoadError::SchemaMismatch { .. })));
    }

    #[test]
    fn accepts_fresh_matching_cache() {
        let dir = tempdir();
        let path = dir.join("pool_cache.json");
        let cache = PersistedCache {
            version: SCHEMA_VERSION,
            last_updated: Utc::now(),
            data: vec![],
            timing_history_ms: vec![10, 20],
        };
        save(&path, &cache).unwrap();
        let loaded = load(&path, Utc::now()).unwrap();
        assert_eq!(loaded.timing_history_ms, vec![10, 20]);
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("gardenkeeper-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
