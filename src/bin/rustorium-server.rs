#![forbid(unsafe_code)]
//! Rustorium API server

use rustorium::api::{run_api_server, AppState};
use rustorium::config::load_config;
use rustorium::ledger::Ledger;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!(
        difficulty = config.ledger.difficulty,
        genesis_accounts = config.ledger.genesis_accounts.len(),
        auto_mine = config.api.auto_mine,
        "Starting Rustorium"
    );

    // Genesis mining can take a moment at higher difficulties
    let ledger_config = config.ledger.clone();
    let ledger = tokio::task::spawn_blocking(move || Ledger::new(&ledger_config)).await??;

    let state = Arc::new(AppState::new(Arc::new(ledger), config.api.auto_mine));
    run_api_server(state, &config.api.host, config.api.port).await
}
