use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classification::ClassificationVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Active,
    Banned,
}

/// Stable identity keyed by an external chat ID. Created lazily on first
/// interaction; never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub chat_id: String,
    pub display_name: String,
    /// Must, when present, be a member of `wallets`.
    pub primary_wallet: Option<String>,
    /// Lowercased addresses.
    pub wallets: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub profile_data: ProfileData,
    pub status: PlayerStatus,
}

/// Tagged union stored as the opaque `profile_data` JSON column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    pub classification: ClassificationVector,
    /// Most recent result of the daily snapshot pipeline, merged in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dfk_snapshot: Option<serde_json::Value>,
}

impl Player {
    pub fn new(id: String, chat_id: String, display_name: String, now: DateTime<Utc>) -> Self {
        Player {
            id,
            chat_id,
            display_name,
            primary_wallet: None,
            wallets: Vec::new(),
            first_seen_at: now,
            last_seen_at: now,
            profile_data: ProfileData {
                classification: ClassificationVector::new(now),
                dfk_snapshot: None,
            },
            status: PlayerStatus::Active,
        }
    }

    pub fn is_banned(&self) -> bool {
        matches!(self.status, PlayerStatus::Banned)
    }

    /// Links a wallet (lowercased) and, if this is the first wallet, makes
    /// it primary.
    pub fn link_wallet(&mut self, wallet: &str) {
        let wallet = wallet.to_lowercase();
        if !self.wallets.contains(&wallet) {
            self.wallets.push(wallet.clone());
        }
        if self.primary_wallet.is_none() {
            self.primary_wallet = Some(wallet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linking_first_wallet_sets_primary() {
        let now = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut p = Player::new("p1".into(), "chat1".into(), "Ada".into(), now);
        p.link_wallet("0xABC");
        assert_eq!(p.primary_wallet.as_deref(), Some("0xabc"));
        p.link_wallet("0xdef");
        assert_eq!(p.primary_wallet.as_deref(), Some("0xabc"));
        assert_eq!(p.wallets, vec!["0xabc".to_string(), "0xdef".to_string()]);
    }
}
