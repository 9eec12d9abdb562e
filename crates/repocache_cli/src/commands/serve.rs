//! Long-running server: HTTP endpoints plus the periodic sync timer.

use std::path::PathBuf;
use std::sync::Arc;

use repocache::sync::{SyncEngine, SyncOutcome, SyncScheduler};

use crate::config::Config;
use crate::server::{AppState, router};
use crate::shutdown::shutdown_signal;

/// Command-line overrides for the server section of the config.
#[derive(Debug, Clone, Default, clap::Args)]
pub(crate) struct ServeOptions {
    /// Address to bind (default from config or 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (default from config or 3000)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory of static files served at / (default from config or ./public)
    #[arg(long)]
    pub public_dir: Option<PathBuf>,

    /// Don't run a sync at startup even if no snapshot exists
    #[arg(long)]
    pub no_initial_sync: bool,
}

/// Run one cycle when the snapshot is missing or unreadable.
async fn bootstrap(engine: &SyncEngine) {
    match engine.store().read().await {
        Ok(Some(snapshot)) => {
            tracing::info!(
                total = snapshot.total_count(),
                last_updated = %snapshot.last_updated(),
                "Existing snapshot found, skipping initial sync"
            );
            return;
        }
        Ok(None) => tracing::info!("No snapshot found, running initial sync"),
        Err(e) => tracing::warn!(error = %e, "Snapshot unreadable, running initial sync"),
    }

    match engine.run_once().await {
        Ok(SyncOutcome::Succeeded(stats)) => {
            tracing::info!(total = stats.merged_count, "Initial sync complete");
        }
        Ok(SyncOutcome::Skipped { reason, .. }) => {
            tracing::warn!(reason = %reason, "Initial sync skipped");
        }
        Err(e) => tracing::error!(error = %e, kind = %e.kind(), "Initial sync failed"),
    }
}

/// Handle the serve command.
pub(crate) async fn handle_serve(
    engine: SyncEngine,
    options: ServeOptions,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = options.host.unwrap_or_else(|| config.server.host.clone());
    let port = options.port.unwrap_or(config.server.port);
    let public_dir = options
        .public_dir
        .unwrap_or_else(|| config.server.public_dir.clone());

    let engine = Arc::new(engine);
    let scheduler = Arc::new(SyncScheduler::new());
    let interval = config.sync_interval();

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        public_dir = %public_dir.display(),
        "Server listening"
    );

    // The timer is armed only after the initial cycle so the two never overlap.
    let startup = tokio::spawn({
        let engine = Arc::clone(&engine);
        let scheduler = Arc::clone(&scheduler);
        let initial_sync = !options.no_initial_sync;
        async move {
            if initial_sync {
                bootstrap(&engine).await;
            }
            scheduler.schedule(engine, interval);
        }
    });

    let app = router(AppState::new(engine), &public_dir);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    startup.abort();
    scheduler.stop();
    tracing::info!("Server stopped");

    served?;
    Ok(())
}
