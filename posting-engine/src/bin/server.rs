//! Posting engine server binary

use anyhow::Context;
use posting_engine::{Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Configuration file as the first argument, environment otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => Config::from_env().context("loading configuration from environment")?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting posting engine"
    );

    let ledger = Ledger::open(config).await.context("opening ledger")?;

    let stats = ledger.storage().get_stats()?;
    tracing::info!(
        transactions = stats.total_transactions,
        slots = stats.total_slots,
        accounts = stats.total_accounts,
        "Ledger opened successfully"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down posting engine");
    ledger.shutdown().await?;
    Ok(())
}
