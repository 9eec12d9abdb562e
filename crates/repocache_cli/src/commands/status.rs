//! Rate limit and snapshot freshness report.

use clap::ValueEnum;
use serde::Serialize;

use repocache::platform::check_quota;
use repocache::{CacheInfo, RateLimitInfo, SnapshotError, SyncEngine};

use super::shared::format_duration;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Current quota and snapshot summary.
///
/// Serializes to the same shape the `/api/status` endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StatusReport {
    pub rate: Option<RateLimitInfo>,
    #[serde(rename = "cacheInfo")]
    pub cache_info: Option<CacheInfo>,
}

impl StatusReport {
    /// Query the quota and read the snapshot summary.
    ///
    /// An unreachable quota endpoint yields `rate: None`; only a snapshot
    /// that exists but cannot be read is an error.
    pub(crate) async fn collect(engine: &SyncEngine) -> Result<Self, SnapshotError> {
        let rate = check_quota(engine.source()).await;
        let cache_info = engine.store().read_info().await?;
        Ok(Self { rate, cache_info })
    }

    fn rows(&self) -> Vec<StatusRow> {
        let mut rows = Vec::new();
        let now = chrono::Utc::now();

        match self.rate {
            Some(rate) => {
                let usage_percent = match rate.headroom() {
                    Some(headroom) => format!("{:.1}%", (1.0 - headroom) * 100.0),
                    None => "-".to_string(),
                };
                let reset_at = rate.reset_at();
                let reset_in = reset_at.signed_duration_since(now);
                let reset_in = if reset_in.num_seconds() > 0 {
                    format_duration(reset_in)
                } else {
                    "now".to_string()
                };

                rows.push(StatusRow::new(
                    "Rate limit",
                    format!("{}/{} remaining", rate.remaining, rate.limit),
                ));
                rows.push(StatusRow::new("Usage %", usage_percent));
                rows.push(StatusRow::new(
                    "Resets At",
                    reset_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                ));
                rows.push(StatusRow::new("Resets In", reset_in));
            }
            None => rows.push(StatusRow::new("Rate limit", "unavailable".to_string())),
        }

        match self.cache_info {
            Some(info) => {
                let age = now.signed_duration_since(info.last_updated);
                let age = if age.num_seconds() > 0 {
                    format!("{} ago", format_duration(age))
                } else {
                    "just now".to_string()
                };
                rows.push(StatusRow::new("Repositories", info.total_count.to_string()));
                rows.push(StatusRow::new(
                    "Last updated",
                    info.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                ));
                rows.push(StatusRow::new("Snapshot age", age));
            }
            None => rows.push(StatusRow::new("Snapshot", "not found".to_string())),
        }

        rows
    }

    pub(crate) fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Table => {
                let mut table = tabled::Table::new(self.rows());
                table.with(tabled::settings::Style::rounded());
                Ok(table.to_string())
            }
            OutputFormat::Json => serde_json::to_string_pretty(self),
        }
    }
}

#[derive(Debug, Clone, tabled::Tabled)]
struct StatusRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl StatusRow {
    fn new(field: &'static str, value: String) -> Self {
        Self { field, value }
    }
}

/// Handle the status command.
pub(crate) async fn handle_status(
    engine: &SyncEngine,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = StatusReport::collect(engine).await?;
    println!("{}", report.render(output)?);
    Ok(())
}
