//! Export functionality for the station comparison table
//!
//! Stable column order so downloads diff cleanly between months; missing
//! averages render as empty cells, not zeros.

use crate::models::ComparisonTable;
use anyhow::{Context, Result};
use std::path::Path;

const COLUMNS: [&str; 6] = [
    "Station",
    "Total Starts",
    "Total Riders",
    "Avg Duration",
    "Avg Rating",
    "Heavy Users",
];

/// Serialize a comparison table to CSV text (the download payload).
pub fn comparison_to_csv(table: &ComparisonTable) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(COLUMNS)
        .context("Failed to write CSV header")?;

    for row in &table.rows {
        writer
            .write_record([
                row.station.clone(),
                row.total_starts.to_string(),
                row.total_riders.to_string(),
                row.avg_duration
                    .map(|v| format!("{v:.1}"))
                    .unwrap_or_default(),
                row.avg_rating
                    .map(|v| format!("{v:.2}"))
                    .unwrap_or_default(),
                row.heavy_users.to_string(),
            ])
            .with_context(|| format!("Failed to write row for station {}", row.station))?;
    }

    let bytes = writer
        .into_inner()
        .context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Write a comparison table to a CSV file, creating parent directories.
pub fn export_comparison_to_csv(table: &ComparisonTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let content = comparison_to_csv(table)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write CSV file: {}", path.display()))
}
