//! Explorer API fallback for the payment scanner (the "RouteScan-style"
//! path named in the source material): a paginated per-wallet tx list,
//! O(1) per poll rather than O(block range). The exact response shape
//! isn't specified upstream; this models the common block-explorer
//! "address transactions" envelope.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::chain::types::ExplorerTx;
use crate::error::EngineError;
use crate::model::decimal::from_wei_str;

#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    items: Vec<ExplorerItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExplorerItem {
    hash: String,
    from: String,
    to: String,
    value: String,
    #[serde(rename = "tokenAddress")]
    token_address: Option<String>,
    #[serde(rename = "blockNumber")]
    block_number: u64,
    timestamp: i64,
    status: Option<String>,
}

pub struct ExplorerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ExplorerClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        ExplorerClient { http, base_url, api_key }
    }

    /// Fetches the wallet's outgoing transactions to `house`, paginating
    /// until `nextPageToken` is absent. Deduplicates by tx hash.
    pub async fn query_wallet_transactions(&self, wallet: &str, house: &str) -> Result<Vec<ExplorerTx>, EngineError> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .http
                .get(format!("{}/address/{}/transactions", self.base_url, wallet))
                .query(&[("to", house)]);
            if let Some(key) = &self.api_key {
                req = req.query(&[("apikey", key)]);
            }
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| EngineError::TransientUpstream(format!("explorer request failed: {e}")))?;
            if resp.status().is_server_error() {
                return Err(EngineError::TransientUpstream(format!("explorer returned {}", resp.status())));
            }
            if !resp.status().is_success() {
                return Err(EngineError::PermanentUpstream(format!("explorer returned {}", resp.status())));
            }

            let envelope: ExplorerEnvelope = resp
                .json()
                .await
                .map_err(|e| EngineError::PermanentUpstream(format!("explorer response malformed: {e}")))?;

            for item in envelope.items {
                let amount: Decimal = from_wei_str(&item.value, 18)
                    .map_err(|e| EngineError::PermanentUpstream(e.to_string()))?;
                let timestamp = chrono::DateTime::from_timestamp(item.timestamp, 0).unwrap_or_else(chrono::Utc::now);
                out.push(ExplorerTx {
                    tx_hash: item.hash,
                    from: item.from.to_lowercase(),
                    to: item.to.to_lowercase(),
                    amount,
                    token: item.token_address,
                    block_number: item.block_number,
                    timestamp,
                    success: item.status.as_deref().map(|s| s == "success" || s == "1").unwrap_or(true),
                });
            }

            page_token = envelope.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(out)
    }

    /// The wallet's earliest transaction timestamp, queried without a
    /// `to` filter. Used by the snapshot builder for account age; `None`
    /// if the explorer has no history for the wallet at all.
    pub async fn earliest_tx_timestamp(&self, wallet: &str) -> Result<Option<DateTime<Utc>>, EngineError> {
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self.http.get(format!("{}/address/{}/transactions", self.base_url, wallet));
            if let Some(key) = &self.api_key {
                req = req.query(&[("apikey", key)]);
            }
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| EngineError::TransientUpstream(format!("explorer request failed: {e}")))?;
            if resp.status().is_server_error() {
                return Err(EngineError::TransientUpstream(format!("explorer returned {}", resp.status())));
            }
            if !resp.status().is_success() {
                return Err(EngineError::PermanentUpstream(format!("explorer returned {}", resp.status())));
            }

            let envelope: ExplorerEnvelope = resp
                .json()
                .await
                .map_err(|e| EngineError::PermanentUpstream(format!("explorer response malformed: {e}")))?;

            for item in &envelope.items {
                let ts = chrono::DateTime::from_timestamp(item.timestamp, 0).unwrap_or_else(Utc::now);
                earliest = Some(match earliest {
                    Some(current) => current.min(ts),
                    None => ts,
                });
            }

            page_token = envelope.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(earliest)
    }
}
