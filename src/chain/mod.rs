//! L3 — the chain client. Wraps JSON-RPC (balances, contract reads, event
//! log ranges) and the read-only GraphQL hero endpoint behind a typed,
//! retrying interface. Every method here is a suspension point; CPU-only
//! transforms (gene decoding, classification, pricing) never call into it.

pub mod client;
pub mod graphql;
pub mod retry;
pub mod types;

pub use client::ChainClient;
pub use graphql::HeroGraphQlClient;
pub use types::{Chain, ExplorerTx, LpReserves, PoolInfo, Transfer, TxReceiptSummary};
