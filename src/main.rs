//! Donowatch - Twitch chat donation watcher
//!
//! Joins the configured Twitch channels, picks donation notices out of
//! the chat, records them, and answers queries from a remote console.

mod common;
mod config;
mod console;
mod ingest;
mod protocol;
mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use common::{ChannelSet, ConnectionResult, Credentials};
use config::load_and_validate;
use console::{register_commands, CommandRegistry, ConsoleClient, ConsoleHandle};
use ingest::{DonationHandler, IngestClient};
use store::{DonationStore, JsonlStore, MemoryStore};

/// Time tasks get to wind down after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Donowatch v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_and_validate().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Check the environment variables and the streamers file.");
        e
    })?;

    info!("Configuration loaded ({})", config.env);
    info!("  Streamers: {} from {}", config.streamers.len(), config.streamers_file);
    info!("  Chat server: {}:{}", config.twitch.host, config.twitch.port);
    match config.console {
        Some(ref console) => info!("  Console: {}", console.addr()),
        None => info!("  Console: disabled"),
    }

    let store: Arc<dyn DonationStore> = if config.store.in_memory() {
        warn!("DB_DSN is {:?}, donations are kept in memory only", config.store.dsn);
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(JsonlStore::open(&config.store.dsn)?)
    };
    let cancel = CancellationToken::new();

    // ============================================================
    // Console
    // ============================================================
    let console_handle = ConsoleHandle::detached();
    let console_task = config.console.clone().map(|console_config| {
        let mut registry = CommandRegistry::new();
        register_commands(&mut registry, store.clone());

        let client = ConsoleClient::new(console_config, Arc::new(registry), console_handle.clone());
        tokio::spawn(client.run(cancel.clone()))
    });

    // ============================================================
    // Chat ingestion
    // ============================================================
    let handler = Arc::new(DonationHandler::from_config(
        &config,
        store,
        Arc::new(console_handle),
    )?);
    let channels = ChannelSet::new(handler.channels())?;
    let credentials = Credentials::from_parts(&config.twitch.nick, &config.twitch.oauth);
    if credentials.is_anonymous() {
        info!("No chat credentials, logging in anonymously as {}", credentials.nick);
    }

    let client = IngestClient::new(
        config.twitch.host.clone(),
        config.twitch.port,
        credentials,
        channels,
        handler,
    );
    let mut ingest_task = tokio::spawn(client.run(cancel.clone()));

    // ============================================================
    // Run until shutdown
    // ============================================================
    let ingest_finished = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping...");
            false
        }
        result = &mut ingest_task => {
            report_ingest(result);
            if console_task.is_some() {
                info!("Console stays available until shutdown");
                shutdown_signal().await;
            }
            true
        }
    };

    cancel.cancel();

    if !ingest_finished {
        match tokio::time::timeout(SHUTDOWN_GRACE, ingest_task).await {
            Ok(result) => report_ingest(result),
            Err(_) => warn!("Chat ingestion did not stop in time"),
        }
    }
    if let Some(task) = console_task {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Console task panicked: {}", e),
            Err(_) => warn!("Console task did not stop in time"),
        }
    }

    info!("Exiting...");
    Ok(())
}

fn report_ingest(result: std::result::Result<ConnectionResult<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => info!("Chat ingestion finished"),
        Ok(Err(e)) => error!("Chat ingestion stopped: {}", e),
        Err(e) => warn!("Chat ingestion task panicked: {}", e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
