use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::Serialize;
use tracing::debug;

use crate::error::ReportResult;
use crate::models::{DETAILED_HEADERS, SUMMARY_HEADERS};
use crate::pipeline::Reconciled;

pub const SUMMARY_FILE: &str = "Summary_View.csv";
pub const DETAILED_FILE: &str = "Detailed_View.csv";

/// Serializes rows to UTF-8 CSV. The header row is always written, so an
/// empty view still yields a usable file.
pub fn to_csv<T: Serialize>(headers: &[&str], rows: &[T]) -> ReportResult<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    writer
        .into_inner()
        .map_err(|err| err.into_error().into())
}

/// Writes `Summary_View.csv` and `Detailed_View.csv` into `out_dir`.
pub fn write_views(out_dir: &Path, result: &Reconciled) -> ReportResult<(PathBuf, PathBuf)> {
    fs::create_dir_all(out_dir)?;

    let summary_path = out_dir.join(SUMMARY_FILE);
    let detailed_path = out_dir.join(DETAILED_FILE);

    fs::write(&summary_path, to_csv(&SUMMARY_HEADERS, &result.summary)?)?;
    fs::write(&detailed_path, to_csv(&DETAILED_HEADERS, &result.detailed)?)?;

    debug!(
        summary = %summary_path.display(),
        detailed = %detailed_path.display(),
        "Views written"
    );
    Ok((summary_path, detailed_path))
}

pub fn to_json(result: &Reconciled) -> ReportResult<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

fn cell<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn build_report(result: &Reconciled, as_of: NaiveDate) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Batch Health Report");
    let _ = writeln!(
        output,
        "Generated for {} batches across {} batch-weeks (as of {})",
        result.summary.len(),
        result.detailed.len(),
        as_of
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Batch Health");

    if result.summary.is_empty() {
        let _ = writeln!(output, "No batches found in the health sheets.");
    } else {
        let _ = writeln!(
            output,
            "| Batch | Start | Consumption Health | Live Health | Overall | Latest Week | Current Week |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|");
        for row in &result.summary {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} |",
                row.batch_name,
                row.batch_start_date.as_deref().unwrap_or("-"),
                cell(row.avg_consumption_health),
                cell(row.avg_live_health),
                cell(row.overall_health),
                cell(row.latest_week),
                cell(row.current_week)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Reported Batch Averages");

    if result.summary.is_empty() {
        let _ = writeln!(output, "No batches found in the health sheets.");
    } else {
        for row in &result.summary {
            let _ = writeln!(
                output,
                "- {}: consumption {} (weekly mean {}), live participation {} (weekly mean {})",
                row.batch_name,
                cell(row.reported_consumption),
                cell(row.avg_consumption),
                cell(row.reported_live_participation),
                cell(row.avg_live_participation)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality Notes");

    if result.warnings.is_empty() {
        let _ = writeln!(output, "No fields were degraded.");
    } else {
        for warning in &result.warnings {
            let _ = writeln!(output, "- {warning}");
        }
    }

    output
}
