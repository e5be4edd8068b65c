//! Installs the process-wide `tracing` subscriber. Every background task
//! (`cache::refresh`, `payments::scanner`, `optimizer::processor`,
//! `scheduler`, `queue`) logs through spans opened with its own name;
//! pure modules (gene decoder, classification, pricing math) never log,
//! per the concurrency model's "CPU-only transforms never suspend, never
//! log" rule.

use tracing_subscriber::EnvFilter;

/// Installs the subscriber from `RUST_LOG`, defaulting to `info`. Safe to
/// call once at process start; a second call (e.g. from a test harness
/// that also boots an `Application`) is a no-op rather than a panic.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
