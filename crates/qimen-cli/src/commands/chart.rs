//! Chart inspection command

use anyhow::{Context, Result};
use chrono::DateTime;

use qimen_core::ledger::reference_zone_from_env;
use qimen_core::{ChartProvider, QimenChartProvider};

/// Print the chart for a timestamp as pretty JSON.
///
/// With no `--at`, uses the current instant. An explicit timestamp is
/// parsed as RFC 3339 and converted into the reference zone, so the same
/// instant always yields the same chart regardless of the offset it was
/// written with.
pub fn cmd_chart(at: Option<&str>) -> Result<()> {
    let zone = reference_zone_from_env();

    let at = match at {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .context("Invalid timestamp, expected RFC 3339 (e.g. 2024-06-01T14:30:00-07:00)")?
            .with_timezone(&zone),
        None => chrono::Utc::now().with_timezone(&zone),
    };

    let chart = QimenChartProvider.generate(at)?;

    println!("Chart for {} ({})", at.format("%Y-%m-%d %H:%M"), zone);
    println!("{}", serde_json::to_string_pretty(&chart)?);

    Ok(())
}
