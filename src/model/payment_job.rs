use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentJobStatus {
    Pending,
    PaymentVerified,
    Processing,
    Completed,
    Failed,
    Expired,
}

impl PaymentJobStatus {
    /// A job in any state other than `pending` never matches another
    /// transfer.
    pub fn accepts_payment_match(&self) -> bool {
        matches!(self, PaymentJobStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentJobStatus::Pending => "pending",
            PaymentJobStatus::PaymentVerified => "payment_verified",
            PaymentJobStatus::Processing => "processing",
            PaymentJobStatus::Completed => "completed",
            PaymentJobStatus::Failed => "failed",
            PaymentJobStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => PaymentJobStatus::Pending,
            "payment_verified" => PaymentJobStatus::PaymentVerified,
            "processing" => PaymentJobStatus::Processing,
            "completed" => PaymentJobStatus::Completed,
            "failed" => PaymentJobStatus::Failed,
            "expired" => PaymentJobStatus::Expired,
            _ => return None,
        })
    }
}

/// A tracked invoice expecting a specific on-chain transfer from a
/// specific wallet within a time window. Holds a non-owning reference
/// (`player_id`) to its player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentJob {
    pub id: String,
    pub player_id: String,
    pub from_wallet: String,
    pub status: PaymentJobStatus,
    pub expected_amount: Decimal,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub start_block: u64,
    pub last_scanned_block: u64,
    pub tx_hash: Option<String>,
    pub paid_amount: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub lp_snapshot: Option<serde_json::Value>,
    pub report_payload: Option<serde_json::Value>,
}

pub const DEFAULT_JOB_TTL_SECS: i64 = 2 * 60 * 60;

impl PaymentJob {
    pub fn new(
        id: String,
        player_id: String,
        from_wallet: String,
        expected_amount: Decimal,
        start_block: u64,
        now: DateTime<Utc>,
    ) -> Self {
        PaymentJob {
            id,
            player_id,
            from_wallet: from_wallet.to_lowercase(),
            status: PaymentJobStatus::Pending,
            expected_amount,
            requested_at: now,
            expires_at: now + chrono::Duration::seconds(DEFAULT_JOB_TTL_SECS),
            start_block,
            last_scanned_block: start_block,
            tx_hash: None,
            paid_amount: None,
            paid_at: None,
            error_message: None,
            lp_snapshot: None,
            report_payload: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_jobs_accept_a_payment_match() {
        assert!(PaymentJobStatus::Pending.accepts_payment_match());
        assert!(!PaymentJobStatus::PaymentVerified.accepts_payment_match());
        assert!(!PaymentJobStatus::Expired.accepts_payment_match());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in ["pending", "payment_verified", "processing", "completed", "failed", "expired"] {
            let parsed = PaymentJobStatus::from_str(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
    }
}
