use anyhow::Result;
use tokio::signal;

mod auth;
mod config;
mod error;
mod gmail_client;
mod logging;
mod notifier;
mod watcher;

use auth::{CredentialManager, LoginDelegate};
use config::{WatcherConfig, WatcherPaths};
use watcher::{PollSettings, Watcher};

#[tokio::main]
async fn main() -> Result<()> {
    let paths = WatcherPaths::resolve();
    let _log_guard = logging::init(&paths.log_file);

    tracing::info!("🚀 Gmail watcher started.");
    tracing::debug!("Base directory: {}", paths.base_dir.display());

    let config = WatcherConfig::load(&paths);
    tracing::info!("TARGET_SENDERS loaded: {:?}", config.allow_list.sorted());
    if config.allow_list.is_empty() {
        tracing::warn!("TARGET_SENDERS is empty; no notifications will be raised.");
    }

    let notifier = notifier::from_kind(config.notifier);

    tracing::info!("Starting Gmail authentication...");
    let delegate = LoginDelegate::new(notifier.clone(), config.preferred_browsers.clone());
    let manager = CredentialManager::new(&paths, delegate, config.login_timeout);
    let client = match manager.authenticate().await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Gmail authentication failed: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Gmail authenticated successfully.");

    let watcher = Watcher::new(
        client,
        notifier,
        config.allow_list.clone(),
        PollSettings::from(&config),
    );

    watcher.run(shutdown_signal()).await;

    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where there is one
async fn shutdown_signal() {
    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("Watcher stopped by user (interrupt)."),
            Err(e) => {
                tracing::error!("Failed to listen for interrupt: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Watcher stopped (terminate signal).");
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
