use std::path::PathBuf;

use thiserror::Error;

use crate::models::Sheet;

/// Structural failures. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{sheet}: missing column '{column}' (accepted headers: {accepted})")]
    MissingColumn {
        sheet: Sheet,
        column: &'static str,
        accepted: String,
    },

    #[error("please upload all required files to proceed (missing: {})", list_sheets(.missing))]
    IncompleteInputSet { missing: Vec<Sheet> },

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;

fn list_sheets(sheets: &[Sheet]) -> String {
    sheets
        .iter()
        .map(|sheet| sheet.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Field-level problems that degrade a single value to null instead of
/// aborting the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldWarning {
    #[error("batch '{batch}': cannot parse start date '{value}'")]
    UnparseableDate { batch: String, value: String },

    #[error("batch '{batch}': week label '{label}' has no week number")]
    UnparseableWeekNumber { batch: String, label: String },

    #[error("batch '{batch}': week number in label '{label}' is out of range")]
    WeekNumberOutOfRange { batch: String, label: String },

    #[error("{sheet}, row {row}: cannot parse {column} value '{value}'")]
    UnparseableNumber {
        sheet: Sheet,
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("{sheet}: duplicate row for {key}, keeping the first")]
    DuplicateKey { sheet: Sheet, key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_input_set_names_every_missing_sheet() {
        let err = ReportError::IncompleteInputSet {
            missing: vec![Sheet::ConsumptionHealth, Sheet::LiveHealth],
        };
        let message = err.to_string();
        assert!(message.starts_with("please upload all required files"));
        assert!(message.contains("Consumption-Based Batch Health (Sheet3)"));
        assert!(message.contains("Live-Based Batch Health (Sheet4)"));
    }

    #[test]
    fn missing_column_mentions_accepted_headers() {
        let err = ReportError::MissingColumn {
            sheet: Sheet::LiveParticipationSummary,
            column: "Batch Name",
            accepted: "'Batch Name'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Average Live Participation by Batch (Sheet2): missing column 'Batch Name' \
             (accepted headers: 'Batch Name')"
        );
    }
}
