//! Maps the verbose headers of the exported sheets onto the canonical column
//! vocabulary and converts raw cells into typed rows.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{FieldWarning, ReportError, ReportResult};
use crate::models::{
    ConsumptionHealthRow, ConsumptionSummaryRow, LiveHealthRow, LiveSummaryRow, Sheet, Table,
    ACTIVE_PARTICIPATION, AVERAGE_CONSUMPTION, AVERAGE_LIVE_PARTICIPATION, BATCH_NAME,
    BATCH_START_DATE, HEALTH_CONSUMPTION, HEALTH_LIVE, WEEK_NUMBER,
};

/// A canonical column and the source headers that are renamed onto it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

const fn col(canonical: &'static str, aliases: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec { canonical, aliases }
}

const CONSUMPTION_SUMMARY_COLUMNS: &[ColumnSpec] = &[
    col(BATCH_NAME, &[]),
    col(AVERAGE_CONSUMPTION, &[]),
    col(BATCH_START_DATE, &[]),
];

const LIVE_SUMMARY_COLUMNS: &[ColumnSpec] = &[
    col(BATCH_NAME, &[]),
    col(AVERAGE_LIVE_PARTICIPATION, &[]),
];

const CONSUMPTION_HEALTH_COLUMNS: &[ColumnSpec] = &[
    col(BATCH_NAME, &["Institutions Wh Institution Batch Batch UID Name"]),
    col(WEEK_NUMBER, &[]),
    col(AVERAGE_CONSUMPTION, &["Average of Average Consumption"]),
    col(
        ACTIVE_PARTICIPATION,
        &["Average of Elevate Weeklyelevatebatchactiveparticipation Bat 3d103a10"],
    ),
    col(HEALTH_CONSUMPTION, &["Batch Health"]),
];

const LIVE_HEALTH_COLUMNS: &[ColumnSpec] = &[
    col(BATCH_NAME, &[]),
    col(WEEK_NUMBER, &[]),
    col(AVERAGE_LIVE_PARTICIPATION, &[]),
    col(ACTIVE_PARTICIPATION, &[]),
    col(HEALTH_LIVE, &["Batch Health"]),
];

const NULL_TOKENS: &[&str] = &["", "na", "n/a", "nan", "null", "none", "#n/a"];

pub fn columns_for(sheet: Sheet) -> &'static [ColumnSpec] {
    match sheet {
        Sheet::ConsumptionSummary => CONSUMPTION_SUMMARY_COLUMNS,
        Sheet::LiveParticipationSummary => LIVE_SUMMARY_COLUMNS,
        Sheet::ConsumptionHealth => CONSUMPTION_HEALTH_COLUMNS,
        Sheet::LiveHealth => LIVE_HEALTH_COLUMNS,
    }
}

/// Renames headers onto the canonical vocabulary for `sheet` and checks that
/// every expected column is present.
pub fn normalize(table: &Table, sheet: Sheet) -> ReportResult<Table> {
    let specs = columns_for(sheet);
    let renames: HashMap<&str, &str> = specs
        .iter()
        .flat_map(|spec| spec.aliases.iter().map(move |alias| (*alias, spec.canonical)))
        .collect();

    let headers: Vec<String> = table
        .headers
        .iter()
        .map(|h| renames.get(h.as_str()).map_or_else(|| h.clone(), |c| c.to_string()))
        .collect();

    for spec in specs {
        if !headers.iter().any(|h| h == spec.canonical) {
            let accepted = std::iter::once(&spec.canonical)
                .chain(spec.aliases.iter())
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ReportError::MissingColumn {
                sheet,
                column: spec.canonical,
                accepted,
            });
        }
    }

    Ok(Table {
        headers,
        rows: table.rows.clone(),
    })
}

/// Typed view over a normalized table.
struct Cells<'a> {
    sheet: Sheet,
    table: Table,
    warnings: &'a mut Vec<FieldWarning>,
}

impl<'a> Cells<'a> {
    fn new(raw: &Table, sheet: Sheet, warnings: &'a mut Vec<FieldWarning>) -> ReportResult<Self> {
        Ok(Cells {
            sheet,
            table: normalize(raw, sheet)?,
            warnings,
        })
    }

    fn index(&self, column: &'static str) -> usize {
        // normalize() has already checked presence
        self.table.column(column).unwrap_or(usize::MAX)
    }

    fn text(&self, row: usize, column: usize) -> String {
        self.table.rows[row].get(column).cloned().unwrap_or_default()
    }

    fn metric(&mut self, row: usize, column: usize, name: &'static str) -> Option<f64> {
        let raw = self.table.rows[row].get(column).map(String::as_str).unwrap_or("");
        match parse_metric(raw) {
            Ok(value) => value,
            Err(InvalidMetric) => {
                let warning = FieldWarning::UnparseableNumber {
                    sheet: self.sheet,
                    row: row + 2,
                    column: name,
                    value: raw.to_string(),
                };
                warn!(%warning, "Degrading cell to null");
                self.warnings.push(warning);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.table.rows.len()
    }
}

/// A numeric cell that is neither a finite number nor a null token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMetric;

/// Parses a numeric cell. Null tokens map to `Ok(None)`.
pub fn parse_metric(raw: &str) -> Result<Option<f64>, InvalidMetric> {
    let trimmed = raw.trim();
    if NULL_TOKENS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(InvalidMetric),
    }
}

pub fn consumption_summary(
    raw: &Table,
    warnings: &mut Vec<FieldWarning>,
) -> ReportResult<Vec<ConsumptionSummaryRow>> {
    let mut cells = Cells::new(raw, Sheet::ConsumptionSummary, warnings)?;
    let (batch, consumption, start) = (
        cells.index(BATCH_NAME),
        cells.index(AVERAGE_CONSUMPTION),
        cells.index(BATCH_START_DATE),
    );

    let mut rows = Vec::with_capacity(cells.len());
    for row in 0..cells.len() {
        rows.push(ConsumptionSummaryRow {
            batch_name: cells.text(row, batch),
            average_consumption: cells.metric(row, consumption, AVERAGE_CONSUMPTION),
            batch_start_date: cells.text(row, start),
        });
    }
    Ok(rows)
}

pub fn live_summary(
    raw: &Table,
    warnings: &mut Vec<FieldWarning>,
) -> ReportResult<Vec<LiveSummaryRow>> {
    let mut cells = Cells::new(raw, Sheet::LiveParticipationSummary, warnings)?;
    let (batch, live) = (
        cells.index(BATCH_NAME),
        cells.index(AVERAGE_LIVE_PARTICIPATION),
    );

    let mut rows = Vec::with_capacity(cells.len());
    for row in 0..cells.len() {
        rows.push(LiveSummaryRow {
            batch_name: cells.text(row, batch),
            average_live_participation: cells.metric(row, live, AVERAGE_LIVE_PARTICIPATION),
        });
    }
    Ok(rows)
}

pub fn consumption_health(
    raw: &Table,
    warnings: &mut Vec<FieldWarning>,
) -> ReportResult<Vec<ConsumptionHealthRow>> {
    let mut cells = Cells::new(raw, Sheet::ConsumptionHealth, warnings)?;
    let (batch, week, consumption, participation, health) = (
        cells.index(BATCH_NAME),
        cells.index(WEEK_NUMBER),
        cells.index(AVERAGE_CONSUMPTION),
        cells.index(ACTIVE_PARTICIPATION),
        cells.index(HEALTH_CONSUMPTION),
    );

    let mut rows = Vec::with_capacity(cells.len());
    for row in 0..cells.len() {
        rows.push(ConsumptionHealthRow {
            batch_name: cells.text(row, batch),
            week_number: cells.text(row, week),
            average_consumption: cells.metric(row, consumption, AVERAGE_CONSUMPTION),
            active_participation: cells.metric(row, participation, ACTIVE_PARTICIPATION),
            batch_health: cells.metric(row, health, HEALTH_CONSUMPTION),
        });
    }
    Ok(rows)
}

pub fn live_health(
    raw: &Table,
    warnings: &mut Vec<FieldWarning>,
) -> ReportResult<Vec<LiveHealthRow>> {
    let mut cells = Cells::new(raw, Sheet::LiveHealth, warnings)?;
    let (batch, week, live, participation, health) = (
        cells.index(BATCH_NAME),
        cells.index(WEEK_NUMBER),
        cells.index(AVERAGE_LIVE_PARTICIPATION),
        cells.index(ACTIVE_PARTICIPATION),
        cells.index(HEALTH_LIVE),
    );

    let mut rows = Vec::with_capacity(cells.len());
    for row in 0..cells.len() {
        rows.push(LiveHealthRow {
            batch_name: cells.text(row, batch),
            week_number: cells.text(row, week),
            average_live_participation: cells.metric(row, live, AVERAGE_LIVE_PARTICIPATION),
            active_participation: cells.metric(row, participation, ACTIVE_PARTICIPATION),
            batch_health: cells.metric(row, health, HEALTH_LIVE),
        });
    }
    Ok(rows)
}
