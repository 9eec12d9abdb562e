//! One-off sync cycle.

use console::style;
use serde::Serialize;

use repocache::sync::{SyncEngine, SyncOutcome, SyncStats};

use super::status::OutputFormat;

#[derive(Debug, Clone, Serialize, tabled::Tabled)]
struct SyncSummary {
    #[tabled(rename = "Fetched")]
    fetched: usize,
    #[tabled(rename = "Total")]
    total: usize,
    #[tabled(rename = "Pages")]
    pages: u32,
    #[tabled(rename = "Strategy")]
    strategy: String,
    #[tabled(rename = "Stopped Early")]
    stopped_early: bool,
}

impl From<&SyncStats> for SyncSummary {
    fn from(stats: &SyncStats) -> Self {
        Self {
            fetched: stats.fetched_count,
            total: stats.merged_count,
            pages: stats.pages,
            strategy: stats.strategy.to_string(),
            stopped_early: stats.stopped_early,
        }
    }
}

fn render(outcome: &SyncOutcome, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(outcome),
        OutputFormat::Table => Ok(match outcome {
            SyncOutcome::Skipped { reason, .. } => {
                format!("{} {}", style("Skipped:").yellow().bold(), reason)
            }
            SyncOutcome::Succeeded(stats) => {
                let mut out = String::new();
                if stats.recovered_from_corrupt {
                    out.push_str(&format!(
                        "{} previous snapshot was unreadable and has been rebuilt\n",
                        style("Warning:").yellow().bold()
                    ));
                }
                let mut table = tabled::Table::new(vec![SyncSummary::from(stats)]);
                table.with(tabled::settings::Style::rounded());
                out.push_str(&table.to_string());
                out
            }
        }),
    }
}

/// Handle the sync command.
pub(crate) async fn handle_sync(
    engine: &SyncEngine,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = engine.run_once().await?;
    println!("{}", render(&outcome, output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use repocache::sync::MergeStrategy;

    use super::*;

    fn stats() -> SyncStats {
        SyncStats {
            fetched_count: 3,
            merged_count: 12,
            pages: 1,
            stopped_early: true,
            recovered_from_corrupt: false,
            strategy: MergeStrategy::Union,
        }
    }

    #[test]
    fn table_summarizes_successful_cycle() {
        let out = render(&SyncOutcome::Succeeded(stats()), OutputFormat::Table).unwrap();
        assert!(out.contains("union"));
        assert!(out.contains("12"));
        assert!(!out.contains("Warning"));
    }

    #[test]
    fn table_warns_after_corrupt_recovery() {
        let mut stats = stats();
        stats.recovered_from_corrupt = true;
        let out = render(&SyncOutcome::Succeeded(stats), OutputFormat::Table).unwrap();
        assert!(out.contains("rebuilt"));
    }

    #[test]
    fn skipped_cycle_shows_reason() {
        let outcome = SyncOutcome::Skipped {
            reason: "rate limit headroom 10/5000 is below the 20% buffer".into(),
            rate: None,
        };
        let out = render(&outcome, OutputFormat::Table).unwrap();
        assert!(out.contains("below the 20% buffer"));

        let json: serde_json::Value =
            serde_json::from_str(&render(&outcome, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["status"], "skipped");
    }
}
