use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `(wallet, as_of_date)` unique. One row per wallet per UTC-midnight date,
/// never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub wallet: String,
    pub as_of_date: NaiveDate,
    pub jewel: Decimal,
    pub crystal: Decimal,
    pub cjewel: Decimal,
}
