use std::error::Error;
use std::sync::Arc;

use repocache::github::GitHubClient;
use repocache::snapshot::SnapshotStore;
use repocache::sync::{SyncEngine, SyncOptions};

use crate::config::Config;
use crate::progress::LoggingReporter;

/// Create the GitHub client from configuration.
pub(crate) fn build_client(config: &Config) -> Result<GitHubClient, Box<dyn Error>> {
    let username = config.github_username().ok_or(
        "GitHub username not configured. Set GITHUB_USERNAME or [github] username in repocache.toml",
    )?;

    let mut client = GitHubClient::new(username, config.github_token(), config.request_timeout())?;
    if let Some(api_url) = config.github.api_url.as_deref() {
        client = client.with_api_url(api_url);
    }

    if !client.is_authenticated() {
        tracing::warn!("No GitHub token configured, requests use the anonymous rate limit");
    }

    Ok(client)
}

/// Wire client, snapshot store, pacing and progress into a sync engine.
pub(crate) fn build_engine(
    config: &Config,
    options: SyncOptions,
) -> Result<SyncEngine, Box<dyn Error>> {
    let client = build_client(config)?;
    let path = config
        .snapshot_path()
        .ok_or("Could not determine snapshot path. Set [storage] path in repocache.toml")?;

    if path.is_relative() {
        tracing::warn!(
            "Snapshot path '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            path.display()
        );
    }

    let mut engine = SyncEngine::new(Arc::new(client), SnapshotStore::new(path), options)
        .with_progress(LoggingReporter::new().into_callback());
    if let Some(limiter) = config.rate_limiter() {
        engine = engine.with_rate_limiter(limiter);
    }

    Ok(engine)
}

/// Format a duration as a short human string ("2m 5s", "1h 5m").
pub(crate) fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}
