//! The HTTP surface this engine exposes to its one caller: the LLM
//! intent router (out of scope -- only its tool-calling contract is
//! specified). `GET /api/tools` serves the JSON Schema catalogue;
//! `POST /api/tools/:name` dispatches a single call. Everything else
//! (command dispatch, DM transport, prompting) lives in the bot
//! framework and the router, neither of which this crate implements.

pub mod error;
pub mod tools;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::Application;
use crate::error::EngineError;

use self::error::ApiError;

/// Boots the admin/tool HTTP API over an already-bootstrapped
/// `Application`. Does not spawn the background tasks itself -- the
/// caller decides whether this process also runs `run_background_tasks`.
pub async fn serve(app: Arc<Application>, addr: SocketAddr) -> Result<()> {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let router = Router::new()
        .route("/health", get(health))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/{name}", post(call_tool))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app);

    tracing::info!(%addr, "tool-contract API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding to {addr}"))?;
    axum::serve(listener, router).await.context("running tool-contract API")?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_tools() -> Json<Vec<tools::ToolSpec>> {
    Json(tools::catalogue())
}

/// A single dispatch point keeps `/api/tools/:name` additions to one
/// match arm instead of one route per tool -- the LLM router already
/// knows tool names from the catalogue, so the path segment is enough.
async fn call_tool(State(app): State<Arc<Application>>, Path(name): Path<String>, Json(body): Json<Value>) -> Result<Json<Value>, ApiError> {
    let parse = |body: Value| serde_json::from_value(body).map_err(|e| ApiError(EngineError::Validation(format!("invalid arguments for tool '{name}': {e}"))));

    let result = match name.as_str() {
        "get_player_snapshot" => tools::get_player_snapshot(&app, parse(body)?).await?,
        "get_pool" => tools::get_pool(&app, parse(body)?).await?,
        "search_pools" => tools::search_pools(&app, parse(body)?).await?,
        "decode_hero" => tools::decode_hero(parse(body)?).await?,
        "create_payment_job" => tools::create_payment_job(&app, parse(body)?).await?,
        "check_payment_status" => tools::check_payment_status(&app, parse(body)?).await?,
        "verify_payment_tx" => tools::verify_payment_tx(&app, parse(body)?).await?,
        "request_optimization" => tools::request_optimization(&app, parse(body)?).await?,
        other => return Err(ApiError(EngineError::Validation(format!("unknown tool '{other}'")))),
    };
    Ok(Json(result))
}
