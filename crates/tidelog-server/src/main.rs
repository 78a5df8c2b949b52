use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tidelog_core::SharedStore;
use tidelog_logging::TidelogSubscriberBuilder;
use tidelog_server::{AppState, Cli, router};
use tidelog_storage::InMemoryLogStore;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("loading configuration")?;

    let _log_guard = TidelogSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init()?;

    let store = Arc::new(InMemoryLogStore::new());
    let state = AppState::new(store.clone() as SharedStore, config.clone());

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(
        bind = %config.bind,
        max_len = config.engine.max_len,
        device_prefixing = config.multi_device_prefixing,
        "Tidelog server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(store))
        .await?;

    info!("Tidelog server stopped");
    Ok(())
}

async fn shutdown_signal(store: Arc<InMemoryLogStore>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    // Wakes blocked readers so open sessions end
    store.close();
}
