use clap::{Parser, Subcommand};

/// GardenKeeper -- on-chain data ingestion, payment-gated optimization,
/// and player classification for a blockchain gardening game companion.
#[derive(Parser)]
#[command(name = "gardenkeeper", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Boot the full engine: open the store, warm the pool cache, and
    /// spawn the background tasks plus the tool-contract HTTP API.
    Serve,

    /// Run the pure L2 gene decoder over a stat-gene and visual-gene
    /// string and print the resulting trait matrix as JSON.
    DecodeGene {
        stat_genes: String,
        visual_genes: String,
    },

    /// Run L12 `processEvent` over a JSON profile and a JSON event and
    /// print the reclassified profile.
    Classify {
        /// Path to a JSON `ClassificationVector` + `WalletFacts` document.
        profile: std::path::PathBuf,
        /// Path to a JSON `ClassificationEvent`.
        event: std::path::PathBuf,
    },

    /// Run L10 `buildPlayerSnapshot` once for a single wallet and print
    /// the resulting JSON document, without touching the store.
    Snapshot {
        wallet: String,
    },

    /// Print the JSON Schema catalogue of LLM-callable tools (the same
    /// catalogue served at `GET /api/tools`).
    ToolSchema,
}
