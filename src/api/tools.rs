//! The LLM intent router is an external collaborator; this module is the
//! only surface it is specified to call. Each tool is a plain async
//! function over a `schemars`-derived request type (the same
//! `#[derive(JsonSchema)]` usage `model/classification.rs` and
//! `genes/decode.rs` already carry for their own JSON shapes) so the
//! schema served at `GET /api/tools` and the request body a handler
//! deserializes can never drift apart.

use std::sync::Arc;

use chrono::Utc;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::Application;
use crate::chain::Chain;
use crate::error::EngineError;
use crate::queue::WaitingUser;

use super::error::ApiError;

fn parse_chain(raw: &str) -> Result<Chain, EngineError> {
    match raw.to_lowercase().as_str() {
        "serendale" => Ok(Chain::Serendale),
        "crystalvale" => Ok(Chain::Crystalvale),
        other => Err(EngineError::Validation(format!("unknown chain '{other}', expected 'serendale' or 'crystalvale'"))),
    }
}

/// One entry of the catalogue served at `GET /api/tools` and printed by
/// `gardenkeeper tool-schema`.
#[derive(Debug, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

macro_rules! tool_spec {
    ($name:literal, $description:literal, $request:ty) => {
        ToolSpec { name: $name, description: $description, parameters: serde_json::to_value(schema_for!($request)).unwrap() }
    };
}

/// The full tool catalogue the LLM intent router is told about. Order is
/// stable across calls.
pub fn catalogue() -> Vec<ToolSpec> {
    vec![
        tool_spec!("get_player_snapshot", "Look up a player's cached classification and latest daily wallet snapshot by chat user id.", GetPlayerSnapshotRequest),
        tool_spec!("get_pool", "Fetch one garden pool's cached analytics by pool id.", GetPoolRequest),
        tool_spec!("search_pools", "Search cached garden pools by pair name or token alias.", SearchPoolsRequest),
        tool_spec!("decode_hero", "Decode a hero's stat and visual gene strings into its trait matrix.", DecodeHeroRequest),
        tool_spec!("create_payment_job", "Open a payment invoice for a premium optimization request.", CreatePaymentJobRequest),
        tool_spec!("check_payment_status", "Check the current status of a payment job by id.", CheckPaymentStatusRequest),
        tool_spec!("verify_payment_tx", "Verify a specific on-chain transaction hash against an open payment job.", VerifyPaymentTxRequest),
        tool_spec!("request_optimization", "Force-drain a payment-verified job through the optimization pipeline now, instead of waiting for the next poll.", RequestOptimizationRequest),
    ]
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetPlayerSnapshotRequest {
    /// The external chat identity (e.g. Discord user id).
    pub chat_user_id: String,
}

pub async fn get_player_snapshot(app: &Arc<Application>, req: GetPlayerSnapshotRequest) -> Result<Value, ApiError> {
    let player = app.player_store.get_by_chat_id(&req.chat_user_id).await?;
    Ok(match player {
        Some(player) => serde_json::json!({
            "found": true,
            "displayName": player.display_name,
            "primaryWallet": player.primary_wallet,
            "wallets": player.wallets,
            "status": player.status,
            "classification": player.profile_data.classification,
            "latestSnapshot": player.profile_data.dfk_snapshot,
        }),
        None => serde_json::json!({ "found": false }),
    })
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetPoolRequest {
    /// The pool id (pid) in the LP staking registry.
    pub pid: u32,
}

pub async fn get_pool(app: &Arc<Application>, req: GetPoolRequest) -> Result<Value, ApiError> {
    let pool = app.pool_cache.get(req.pid).await;
    Ok(serde_json::json!({ "found": pool.is_some(), "pool": pool }))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchPoolsRequest {
    /// Free-text query matched against pair names, normalized the same
    /// way the cache normalizes its own entries (lowercased, `[-\s]`
    /// stripped, wrapped/unwrapped native token aliased).
    pub query: String,
}

pub async fn search_pools(app: &Arc<Application>, req: SearchPoolsRequest) -> Result<Value, ApiError> {
    let pools = app.pool_cache.search(&req.query).await;
    Ok(serde_json::json!({ "pools": pools }))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DecodeHeroRequest {
    /// The hero's opaque 256-bit stat-gene string (base-10).
    pub stat_genes: String,
    /// The hero's opaque 256-bit visual-gene string (base-10).
    pub visual_genes: String,
}

pub async fn decode_hero(req: DecodeHeroRequest) -> Result<Value, ApiError> {
    let decoded = crate::genes::decode(&req.stat_genes, &req.visual_genes)
        .map_err(|e| ApiError(EngineError::Validation(e.to_string())))?;
    Ok(serde_json::to_value(decoded).map_err(|e| ApiError(EngineError::Internal(e.to_string())))?)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePaymentJobRequest {
    pub chat_user_id: String,
    pub display_name: String,
    /// The wallet the player will pay from.
    pub wallet: String,
}

pub async fn create_payment_job(app: &Arc<Application>, req: CreatePaymentJobRequest) -> Result<Value, ApiError> {
    let now = Utc::now();
    let user = WaitingUser {
        chat_user_id: req.chat_user_id.clone(),
        display_name: req.display_name.clone(),
        wallet: req.wallet.clone(),
        requested_at: now,
    };

    if !app.pool_cache.is_ready().await {
        app.queue.add(user).await;
        return Ok(serde_json::json!({
            "status": "queued",
            "message": "Pool cache is still warming up; you'll receive payment instructions as soon as it's ready.",
        }));
    }

    let job = app.payment_request_handler().create_job(&user, now).await?;
    Ok(serde_json::json!({
        "status": "created",
        "jobId": job.id,
        "expectedAmount": job.expected_amount,
        "houseWallet": app.config.house_wallet,
        "expiresAt": job.expires_at,
    }))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckPaymentStatusRequest {
    pub job_id: String,
}

pub async fn check_payment_status(app: &Arc<Application>, req: CheckPaymentStatusRequest) -> Result<Value, ApiError> {
    let job = app.job_store.get(&req.job_id).await?;
    Ok(serde_json::json!({ "found": job.is_some(), "job": job }))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VerifyPaymentTxRequest {
    pub job_id: String,
    /// Which chain the transaction was sent on ("serendale" or "crystalvale").
    pub chain: String,
    pub tx_hash: String,
}

pub async fn verify_payment_tx(app: &Arc<Application>, req: VerifyPaymentTxRequest) -> Result<Value, ApiError> {
    let chain = parse_chain(&req.chain)?;
    let outcome = app.scanner.verify_tx_hash(chain, &req.job_id, &req.tx_hash, Utc::now()).await?;
    Ok(serde_json::to_value(describe_outcome(outcome)).map_err(|e| ApiError(EngineError::Internal(e.to_string())))?)
}

#[derive(Debug, Serialize)]
#[serde(tag = "result")]
enum VerifyOutcomeView {
    Verified { tx_hash: String },
    AlreadyProcessed,
    NoMatch,
}

fn describe_outcome(outcome: crate::payments::scanner::VerifyOutcome) -> VerifyOutcomeView {
    match outcome {
        crate::payments::scanner::VerifyOutcome::Verified { tx_hash } => VerifyOutcomeView::Verified { tx_hash },
        crate::payments::scanner::VerifyOutcome::AlreadyProcessed => VerifyOutcomeView::AlreadyProcessed,
        crate::payments::scanner::VerifyOutcome::NoMatch => VerifyOutcomeView::NoMatch,
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RequestOptimizationRequest {
    pub job_id: String,
}

pub async fn request_optimization(app: &Arc<Application>, req: RequestOptimizationRequest) -> Result<Value, ApiError> {
    app.optimizer.process_one(&req.job_id).await?;
    let job = app.job_store.get(&req.job_id).await?;
    Ok(serde_json::json!({ "job": job }))
}
