use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ReportError, ReportResult};
use crate::models::{Sheet, Table};

/// Paths for the four inputs. Any of them may be absent until the user
/// supplies it.
#[derive(Debug, Clone, Default)]
pub struct InputSet {
    pub consumption_summary: Option<PathBuf>,
    pub live_summary: Option<PathBuf>,
    pub consumption_health: Option<PathBuf>,
    pub live_health: Option<PathBuf>,
}

impl InputSet {
    fn path(&self, sheet: Sheet) -> Option<&PathBuf> {
        match sheet {
            Sheet::ConsumptionSummary => self.consumption_summary.as_ref(),
            Sheet::LiveParticipationSummary => self.live_summary.as_ref(),
            Sheet::ConsumptionHealth => self.consumption_health.as_ref(),
            Sheet::LiveHealth => self.live_health.as_ref(),
        }
    }

    /// Returns the four paths in sheet order, or `IncompleteInputSet` naming
    /// every sheet that was not supplied.
    pub fn require(&self) -> ReportResult<[&Path; 4]> {
        let missing: Vec<Sheet> = Sheet::ALL
            .into_iter()
            .filter(|sheet| self.path(*sheet).is_none())
            .collect();

        match Sheet::ALL.map(|sheet| self.path(sheet)) {
            [Some(s1), Some(s2), Some(s3), Some(s4)] => {
                Ok([s1.as_path(), s2.as_path(), s3.as_path(), s4.as_path()])
            }
            _ => Err(ReportError::IncompleteInputSet { missing }),
        }
    }
}

/// Loaded raw tables in sheet order.
#[derive(Debug, Clone)]
pub struct SheetSet {
    pub consumption_summary: Table,
    pub live_summary: Table,
    pub consumption_health: Table,
    pub live_health: Table,
}

impl SheetSet {
    pub fn load(inputs: &InputSet) -> ReportResult<Self> {
        let [s1, s2, s3, s4] = inputs.require()?;
        Ok(SheetSet {
            consumption_summary: read_table(s1)?,
            live_summary: read_table(s2)?,
            consumption_health: read_table(s3)?,
            live_health: read_table(s4)?,
        })
    }

    pub fn get(&self, sheet: Sheet) -> &Table {
        match sheet {
            Sheet::ConsumptionSummary => &self.consumption_summary,
            Sheet::LiveParticipationSummary => &self.live_summary,
            Sheet::ConsumptionHealth => &self.consumption_health,
            Sheet::LiveHealth => &self.live_health,
        }
    }
}

pub fn read_table(path: &Path) -> ReportResult<Table> {
    let reader = csv_reader().from_path(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table = collect_table(reader).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        columns = table.headers.len(),
        rows = table.rows.len(),
        "Loaded table"
    );
    Ok(table)
}

#[cfg(test)]
pub fn parse_table(csv_data: &str) -> ReportResult<Table> {
    let reader = csv_reader().from_reader(csv_data.as_bytes());
    Ok(collect_table(reader)?)
}

fn csv_reader() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers);
    builder
}

fn collect_table<R: Read>(mut reader: csv::Reader<R>) -> Result<Table, csv::Error> {
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        cells.resize(headers.len().max(cells.len()), String::new());
        rows.push(cells);
    }

    Ok(Table { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    fn parses_headers_and_pads_short_rows() {
        let table = parse_table("Batch Name , Average Consumption\nAlpha,81.5\nBeta\n").unwrap();
        assert_eq!(table.headers, vec!["Batch Name", "Average Consumption"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["Beta".to_string(), String::new()]);
        assert_eq!(table.column("Average Consumption"), Some(1));
    }

    #[test]
    fn require_reports_all_missing_sheets() {
        let inputs = InputSet {
            consumption_summary: Some(PathBuf::from("sheet1.csv")),
            live_summary: None,
            consumption_health: Some(PathBuf::from("sheet3.csv")),
            live_health: None,
        };

        match inputs.require() {
            Err(ReportError::IncompleteInputSet { missing }) => {
                assert_eq!(missing, vec![Sheet::LiveParticipationSummary, Sheet::LiveHealth]);
            }
            other => panic!("expected IncompleteInputSet, got {other:?}"),
        }
    }

    #[test]
    fn load_reads_every_sheet_from_disk() {
        let paths: Vec<PathBuf> = (1..=4)
            .map(|n| temp_path(&format!("batch_health_report_sources_{n}.csv")))
            .collect();
        for (n, path) in paths.iter().enumerate() {
            fs::write(path, format!("Batch Name,Value\nAlpha,{n}\n")).unwrap();
        }

        let inputs = InputSet {
            consumption_summary: Some(paths[0].clone()),
            live_summary: Some(paths[1].clone()),
            consumption_health: Some(paths[2].clone()),
            live_health: Some(paths[3].clone()),
        };
        let sheets = SheetSet::load(&inputs).unwrap();
        assert_eq!(sheets.get(Sheet::LiveHealth).rows[0][1], "3");
        assert_eq!(sheets.get(Sheet::ConsumptionSummary).rows[0][1], "0");

        for path in &paths {
            fs::remove_file(path).unwrap();
        }
    }

    #[test]
    fn read_table_names_the_unreadable_path() {
        let path = temp_path("batch_health_report_does_not_exist.csv");
        let err = read_table(&path).unwrap_err();
        assert!(err.to_string().contains("batch_health_report_does_not_exist.csv"));
    }
}
