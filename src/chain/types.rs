use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The two chains the engine observes. Addresses and RPC endpoints for
/// each are configuration, not code (`AppConfig`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    Serendale,
    Crystalvale,
}

impl Chain {
    pub fn all() -> [Chain; 2] {
        [Chain::Serendale, Chain::Crystalvale]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Chain::Serendale => "serendale",
            Chain::Crystalvale => "crystalvale",
        }
    }
}

/// `archived` is derived from `alloc_point == 0`, the MasterChef-style
/// convention for "rewards disabled for this pool" -- the registry exposes
/// no separate archived/withdrawn flag. Staked LP amount is read
/// separately from the LP token's own `balanceOf(registry)`, since
/// `poolInfo` doesn't carry it either; `PoolInfo` doesn't duplicate that
/// field so there is only one place callers can get it from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub pid: u32,
    pub lp_token: String,
    pub alloc_point: u64,
    pub total_alloc_point: u64,
    pub archived: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LpReserves {
    pub reserve0: Decimal,
    pub reserve1: Decimal,
    pub total_supply: Decimal,
}

/// A single transfer, either an ERC-20 `Transfer` event or a native
/// value-bearing transaction, normalized to one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub token: Option<String>,
    pub block_number: u64,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

/// Normalized explorer-API transaction row, the same shape as `Transfer`
/// plus a success flag (explorer APIs report reverted txs too).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerTx {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub token: Option<String>,
    pub block_number: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxReceiptSummary {
    pub tx_hash: String,
    pub from: String,
    pub to: Option<String>,
    pub value: Decimal,
    pub success: bool,
    pub block_number: u64,
}
