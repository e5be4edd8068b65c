use std::sync::Arc;

use clap::Parser;
use gardenkeeper::app::Application;
use gardenkeeper::config::AppConfig;

mod cli;
mod logs;

fn main() -> anyhow::Result<()> {
    logs::init();
    let cli = cli::Cli::parse();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli.command))
}

async fn run(command: cli::Command) -> anyhow::Result<()> {
    match command {
        cli::Command::Serve => serve().await,
        cli::Command::DecodeGene { stat_genes, visual_genes } => decode_gene(&stat_genes, &visual_genes),
        cli::Command::Classify { profile, event } => classify(&profile, &event),
        cli::Command::Snapshot { wallet } => snapshot(&wallet).await,
        cli::Command::ToolSchema => tool_schema(),
    }
}

/// Boots the engine: opens the store, warms the pool cache, spawns the
/// L5/L7/L8/L9/L11 background tasks, then serves the tool-contract HTTP
/// API on the foreground task until the process receives a shutdown
/// signal.
async fn serve() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.http_host, config.http_port).parse()?;

    let chat: Arc<dyn gardenkeeper::chat::OutboundChat> = Arc::new(gardenkeeper::app::LoggingChat);
    let app = Arc::new(Application::bootstrap(config, chat).await?);
    app.run_background_tasks();

    tracing::info!("gardenkeeper engine booted, serving tool-contract API");
    tokio::select! {
        result = gardenkeeper::api::serve(app, addr) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, exiting");
            Ok(())
        }
    }
}

/// Pure L2 decode, no store, no chain client -- exists for support and
/// for exercising the worked vector from Testable Property 2 offline.
fn decode_gene(stat_genes: &str, visual_genes: &str) -> anyhow::Result<()> {
    let decoded = gardenkeeper::genes::decode(stat_genes, visual_genes)?;
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(())
}

/// Pure L12 `processEvent` over a JSON document on disk, printed back out
/// -- no network, no store, for exercising core logic offline.
fn classify(profile_path: &std::path::Path, event_path: &std::path::Path) -> anyhow::Result<()> {
    #[derive(serde::Deserialize)]
    struct ClassifyInput {
        profile: gardenkeeper::model::ClassificationVector,
        facts: gardenkeeper::classify::WalletFacts,
    }

    let input: ClassifyInput = serde_json::from_reader(std::fs::File::open(profile_path)?)?;
    let event: gardenkeeper::classify::ClassificationEvent = serde_json::from_reader(std::fs::File::open(event_path)?)?;

    let now = chrono::Utc::now();
    let reclassified = gardenkeeper::classify::process_event(input.profile, &input.facts, &event, now);
    println!("{}", serde_json::to_string_pretty(&reclassified)?);
    Ok(())
}

/// Builds one wallet's L10 snapshot against live chain endpoints resolved
/// from the environment, without touching the store -- useful for
/// debugging the daily pipeline against a single wallet.
async fn snapshot(wallet: &str) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let chat: Arc<dyn gardenkeeper::chat::OutboundChat> = Arc::new(gardenkeeper::app::LoggingChat);
    let app = Application::bootstrap(config, chat).await?;
    let snapshot = app.snapshot_builder.build(wallet, chrono::Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn tool_schema() -> anyhow::Result<()> {
    let catalogue = gardenkeeper::api::tools::catalogue();
    println!("{}", serde_json::to_string_pretty(&catalogue)?);
    Ok(())
}
