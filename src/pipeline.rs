use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{FieldWarning, ReportResult};
use crate::models::{
    ConsumptionHealthRow, ConsumptionSummaryRow, DetailedRow, LiveHealthRow, LiveSummaryRow,
    MasterRow, MergedRow, Sheet, SummaryRow, Table,
};
use crate::normalize;

static WEEK_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));

/// Date layouts accepted for `Batch Start Date`, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%A, %B %d, %Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

const START_DATE_DISPLAY: &str = "%A, %B %d, %Y";

/// How two sources for the same field are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Primary value if present, else the fallback.
    #[default]
    PreferPrimary,
    /// Primary value only; the fallback is ignored.
    PrimaryOnly,
}

impl MergePolicy {
    pub fn merge<T>(self, primary: Option<T>, fallback: Option<T>) -> Option<T> {
        match self {
            MergePolicy::PreferPrimary => primary.or(fallback),
            MergePolicy::PrimaryOnly => primary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Active Participation: consumption source is primary, live source is fallback.
    pub participation_policy: MergePolicy,
    pub round_outputs: bool,
    pub today: NaiveDate,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            participation_policy: MergePolicy::PreferPrimary,
            round_outputs: true,
            today: Local::now().date_naive(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reconciled {
    pub summary: Vec<SummaryRow>,
    pub detailed: Vec<DetailedRow>,
    #[serde(skip)]
    pub warnings: Vec<FieldWarning>,
}

/// Per-batch values looked up once instead of read off whichever row sorts first.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BatchStart {
    start_date: Option<NaiveDate>,
    current_week: Option<i64>,
    reported_consumption: Option<f64>,
}

/// Runs the full reconciliation over the four raw sheets.
pub fn process(
    sheet1: &Table,
    sheet2: &Table,
    sheet3: &Table,
    sheet4: &Table,
    config: &PipelineConfig,
) -> ReportResult<Reconciled> {
    let mut warnings = Vec::new();

    let consumption_summary = normalize::consumption_summary(sheet1, &mut warnings)?;
    let live_summary = normalize::live_summary(sheet2, &mut warnings)?;
    let consumption_health = normalize::consumption_health(sheet3, &mut warnings)?;
    let live_health = normalize::live_health(sheet4, &mut warnings)?;

    let master = outer_join_health(
        &consumption_health,
        &live_health,
        config.participation_policy,
        &mut warnings,
    );
    debug!(rows = master.len(), "Health sources joined");

    let starts = batch_starts(&consumption_summary, config.today, &mut warnings);
    let mut merged = broadcast_summaries(master, &live_summary, &starts, &mut warnings);
    derive_weeks(&mut merged, &mut warnings);
    sort_rows(&mut merged);

    let mut summary = summarize(&merged);
    let mut detailed = detail(&merged);
    if config.round_outputs {
        summary.iter_mut().for_each(round_summary);
        detailed.iter_mut().for_each(round_detailed);
    }

    info!(
        batches = summary.len(),
        batch_weeks = detailed.len(),
        warnings = warnings.len(),
        "Reconciliation complete"
    );

    Ok(Reconciled {
        summary,
        detailed,
        warnings,
    })
}

fn push_warning(warnings: &mut Vec<FieldWarning>, warning: FieldWarning) {
    warn!(%warning, "Degrading field to null");
    warnings.push(warning);
}

/// Full outer join on (batch, week label). Consumption rows come first in
/// input order, followed by live-only rows in input order.
fn outer_join_health(
    consumption: &[ConsumptionHealthRow],
    live: &[LiveHealthRow],
    policy: MergePolicy,
    warnings: &mut Vec<FieldWarning>,
) -> Vec<MasterRow> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut rows: Vec<MasterRow> = Vec::with_capacity(consumption.len() + live.len());

    for row in consumption {
        match index.entry((row.batch_name.as_str(), row.week_number.as_str())) {
            Entry::Occupied(_) => push_warning(
                warnings,
                duplicate(Sheet::ConsumptionHealth, &row.batch_name, &row.week_number),
            ),
            Entry::Vacant(slot) => {
                slot.insert(rows.len());
                rows.push(MasterRow {
                    batch_name: row.batch_name.clone(),
                    week_number: row.week_number.clone(),
                    consumption_from_health_source: row.average_consumption,
                    participation_from_consumption_source: row.active_participation,
                    participation_from_live_source: None,
                    active_participation: None,
                    consumption_health: row.batch_health,
                    live_participation_from_health_source: None,
                    live_health: None,
                });
            }
        }
    }

    let mut seen_live: HashSet<(&str, &str)> = HashSet::new();
    for row in live {
        let key = (row.batch_name.as_str(), row.week_number.as_str());
        if !seen_live.insert(key) {
            push_warning(
                warnings,
                duplicate(Sheet::LiveHealth, &row.batch_name, &row.week_number),
            );
            continue;
        }

        match index.get(&key) {
            Some(&position) => {
                let master = &mut rows[position];
                master.participation_from_live_source = row.active_participation;
                master.live_participation_from_health_source = row.average_live_participation;
                master.live_health = row.batch_health;
            }
            None => rows.push(MasterRow {
                batch_name: row.batch_name.clone(),
                week_number: row.week_number.clone(),
                consumption_from_health_source: None,
                participation_from_consumption_source: None,
                participation_from_live_source: row.active_participation,
                active_participation: None,
                consumption_health: None,
                live_participation_from_health_source: row.average_live_participation,
                live_health: row.batch_health,
            }),
        }
    }

    for row in &mut rows {
        row.active_participation = policy.merge(
            row.participation_from_consumption_source,
            row.participation_from_live_source,
        );
    }

    rows
}

fn duplicate(sheet: Sheet, batch: &str, week: &str) -> FieldWarning {
    FieldWarning::DuplicateKey {
        sheet,
        key: format!("('{batch}', '{week}')"),
    }
}

/// One lookup entry per batch in the consumption summary; the first row for
/// a batch wins.
fn batch_starts(
    rows: &[ConsumptionSummaryRow],
    today: NaiveDate,
    warnings: &mut Vec<FieldWarning>,
) -> HashMap<String, BatchStart> {
    let mut starts = HashMap::new();

    for row in rows {
        if starts.contains_key(&row.batch_name) {
            push_warning(
                warnings,
                FieldWarning::DuplicateKey {
                    sheet: Sheet::ConsumptionSummary,
                    key: format!("'{}'", row.batch_name),
                },
            );
            continue;
        }

        let start_date = match parse_start_date(&row.batch_start_date) {
            Ok(date) => date,
            Err(()) => {
                push_warning(
                    warnings,
                    FieldWarning::UnparseableDate {
                        batch: row.batch_name.clone(),
                        value: row.batch_start_date.clone(),
                    },
                );
                None
            }
        };

        starts.insert(
            row.batch_name.clone(),
            BatchStart {
                start_date,
                current_week: start_date.map(|start| current_week(start, today)),
                reported_consumption: row.average_consumption,
            },
        );
    }

    starts
}

/// Left join of the live summary and the start lookup onto every master row.
fn broadcast_summaries(
    master: Vec<MasterRow>,
    live_summary: &[LiveSummaryRow],
    starts: &HashMap<String, BatchStart>,
    warnings: &mut Vec<FieldWarning>,
) -> Vec<MergedRow> {
    let mut live_by_batch: HashMap<&str, Option<f64>> = HashMap::new();
    for row in live_summary {
        match live_by_batch.entry(row.batch_name.as_str()) {
            Entry::Occupied(_) => push_warning(
                warnings,
                FieldWarning::DuplicateKey {
                    sheet: Sheet::LiveParticipationSummary,
                    key: format!("'{}'", row.batch_name),
                },
            ),
            Entry::Vacant(slot) => {
                slot.insert(row.average_live_participation);
            }
        }
    }

    master
        .into_iter()
        .map(|health| {
            let start = starts.get(&health.batch_name).copied().unwrap_or_default();
            MergedRow {
                live_participation_from_summary_source: live_by_batch
                    .get(health.batch_name.as_str())
                    .copied()
                    .flatten(),
                consumption_from_summary_source: start.reported_consumption,
                batch_start_date: start.start_date,
                current_week: start.current_week,
                week_numeric: None,
                health,
            }
        })
        .collect()
}

fn derive_weeks(rows: &mut [MergedRow], warnings: &mut Vec<FieldWarning>) {
    for row in rows.iter_mut() {
        let label = &row.health.week_number;
        row.week_numeric = parse_week_number(label);
        if row.week_numeric.is_some() {
            continue;
        }

        let batch = row.health.batch_name.clone();
        let label = label.clone();
        let warning = if WEEK_DIGITS.is_match(&label) {
            FieldWarning::WeekNumberOutOfRange { batch, label }
        } else {
            FieldWarning::UnparseableWeekNumber { batch, label }
        };
        push_warning(warnings, warning);
    }
}

/// First run of digits in the label: "Week 7" -> 7.
pub fn parse_week_number(label: &str) -> Option<u64> {
    WEEK_DIGITS
        .find(label)
        .and_then(|digits| digits.as_str().parse().ok())
}

/// Batch name ascending, then numeric week ascending with unparseable weeks
/// last. The sort is stable so ties keep join order.
fn sort_rows(rows: &mut [MergedRow]) {
    rows.sort_by(|a, b| {
        a.health
            .batch_name
            .cmp(&b.health.batch_name)
            .then_with(|| nulls_last(a.week_numeric, b.week_numeric))
    });
}

fn nulls_last(a: Option<u64>, b: Option<u64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Returns `Ok(None)` for an empty cell and `Err(())` for text that matches
/// none of the accepted layouts.
fn parse_start_date(raw: &str) -> Result<Option<NaiveDate>, ()> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(stamp.date_naive()));
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
    {
        return Ok(Some(date));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|stamp| Some(stamp.date()))
        .ok_or(())
}

/// Whole weeks elapsed since `start`, 1-indexed. Dates before the start
/// floor towards negative weeks.
pub fn current_week(start: NaiveDate, today: NaiveDate) -> i64 {
    (today - start).num_days().div_euclid(7) + 1
}

/// Two decimal places, halves rounded away from zero. Values too large to
/// scale by 100 carry no fractional digits and are returned unchanged.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

fn mean<'a>(values: impl Iterator<Item = &'a Option<f64>>) -> Option<f64> {
    // running mean; a plain sum can overflow for large finite inputs
    let (mean, count) = values
        .flatten()
        .fold((0.0, 0usize), |(mean, count), v| {
            let count = count + 1;
            (mean + (v - mean) / count as f64, count)
        });
    (count > 0).then_some(mean)
}

/// Normalized product of the two health means, not their average.
pub fn overall_health(consumption_health: Option<f64>, live_health: Option<f64>) -> Option<f64> {
    Some(consumption_health? * live_health? / 100.0)
}

/// Every row of a batch carries the same broadcast start date, current week
/// and reported averages, so reading them off the first row is order-independent.
fn summarize(rows: &[MergedRow]) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<&str, Vec<&MergedRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.health.batch_name.as_str()).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(batch_name, group)| {
            let first = group[0];
            let avg_consumption_health =
                mean(group.iter().map(|r| &r.health.consumption_health));
            let avg_live_health = mean(group.iter().map(|r| &r.health.live_health));

            SummaryRow {
                batch_name: batch_name.to_string(),
                batch_start_date: first
                    .batch_start_date
                    .map(|date| date.format(START_DATE_DISPLAY).to_string()),
                avg_consumption: mean(
                    group.iter().map(|r| &r.health.consumption_from_health_source),
                ),
                avg_active_participation: mean(
                    group.iter().map(|r| &r.health.active_participation),
                ),
                avg_consumption_health,
                avg_live_participation: mean(
                    group
                        .iter()
                        .map(|r| &r.health.live_participation_from_health_source),
                ),
                avg_live_health,
                overall_health: overall_health(avg_consumption_health, avg_live_health),
                latest_week: group.iter().filter_map(|r| r.week_numeric).max(),
                current_week: first.current_week,
                reported_consumption: first.consumption_from_summary_source,
                reported_live_participation: first.live_participation_from_summary_source,
            }
        })
        .collect()
}

fn detail(rows: &[MergedRow]) -> Vec<DetailedRow> {
    rows.iter()
        .map(|row| DetailedRow {
            batch_name: row.health.batch_name.clone(),
            week_number: row.health.week_number.clone(),
            consumption: row.health.consumption_from_health_source,
            active_participation: row.health.active_participation,
            consumption_health: row.health.consumption_health,
            live_participation: row.health.live_participation_from_health_source,
            live_health: row.health.live_health,
        })
        .collect()
}

fn round_opt(value: &mut Option<f64>) {
    if let Some(v) = value.as_mut() {
        *v = round2(*v);
    }
}

fn round_summary(row: &mut SummaryRow) {
    for value in [
        &mut row.avg_consumption,
        &mut row.avg_active_participation,
        &mut row.avg_consumption_health,
        &mut row.avg_live_participation,
        &mut row.avg_live_health,
        &mut row.overall_health,
        &mut row.reported_consumption,
        &mut row.reported_live_participation,
    ] {
        round_opt(value);
    }
}

fn round_detailed(row: &mut DetailedRow) {
    for value in [
        &mut row.consumption,
        &mut row.active_participation,
        &mut row.consumption_health,
        &mut row.live_participation,
        &mut row.live_health,
    ] {
        round_opt(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::parse_table;

    const SHEET3_HEADER: &str = "Institutions Wh Institution Batch Batch UID Name,Week Number,\
        Average of Average Consumption,\
        Average of Elevate Weeklyelevatebatchactiveparticipation Bat 3d103a10,Batch Health\n";
    const SHEET4_HEADER: &str =
        "Batch Name,Week Number,Average Live Participation,Active Participation,Batch Health\n";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            today: date(2024, 1, 22),
            ..PipelineConfig::default()
        }
    }

    fn run(sheet3_rows: &str, sheet4_rows: &str, config: &PipelineConfig) -> Reconciled {
        let sheet1 = parse_table(
            "Batch Name,Average Consumption,Batch Start Date\n\
             BatchA,78.5,2024-01-01\n\
             BatchB,61,not a date\n",
        )
        .unwrap();
        let sheet2 = parse_table(
            "Batch Name,Average Live Participation\n\
             BatchA,66.666\n",
        )
        .unwrap();
        let sheet3 = parse_table(&format!("{SHEET3_HEADER}{sheet3_rows}")).unwrap();
        let sheet4 = parse_table(&format!("{SHEET4_HEADER}{sheet4_rows}")).unwrap();
        process(&sheet1, &sheet2, &sheet3, &sheet4, config).unwrap()
    }

    #[test]
    fn matched_week_yields_normalized_product_health() {
        let result = run("BatchA,Week 1,80,50,90\n", "BatchA,Week 1,70,45,80\n", &config());

        assert_eq!(result.detailed.len(), 1);
        assert_eq!(result.summary.len(), 1);
        let batch = &result.summary[0];
        assert_eq!(batch.batch_name, "BatchA");
        assert_eq!(batch.overall_health, Some(72.0));
        assert_eq!(batch.avg_consumption, Some(80.0));
        assert_eq!(batch.avg_live_participation, Some(70.0));
        assert_eq!(batch.avg_active_participation, Some(50.0));
        assert_eq!(batch.latest_week, Some(1));
        assert_eq!(batch.current_week, Some(4));
        assert_eq!(
            batch.batch_start_date.as_deref(),
            Some("Monday, January 01, 2024")
        );
        assert_eq!(batch.reported_consumption, Some(78.5));
        assert_eq!(batch.reported_live_participation, Some(66.67));
    }

    #[test]
    fn detailed_rows_match_outer_join_cardinality() {
        let result = run(
            "BatchA,Week 1,80,50,90\nBatchA,Week 2,82,52,88\nBatchB,Week 1,60,30,70\n",
            "BatchA,Week 2,71,40,79\nBatchA,Week 3,72,41,81\nBatchC,Week 1,50,20,60\n",
            &config(),
        );

        // (A,1) (A,2) (A,3) (B,1) (C,1)
        assert_eq!(result.detailed.len(), 5);
        let batches: Vec<&str> = result.summary.iter().map(|r| r.batch_name.as_str()).collect();
        assert_eq!(batches, vec!["BatchA", "BatchB", "BatchC"]);

        let weeks: Vec<&str> = result
            .detailed
            .iter()
            .map(|r| r.week_number.as_str())
            .collect();
        assert_eq!(weeks, vec!["Week 1", "Week 2", "Week 3", "Week 1", "Week 1"]);
    }

    #[test]
    fn missing_live_week_is_null_and_excluded_from_mean() {
        let result = run(
            "BatchA,Week 1,80,50,90\nBatchA,Week 2,70,50,70\n",
            "BatchA,Week 1,60,45,80\n",
            &config(),
        );

        let week2 = &result.detailed[1];
        assert_eq!(week2.week_number, "Week 2");
        assert_eq!(week2.live_participation, None);
        assert_eq!(week2.live_health, None);

        let batch = &result.summary[0];
        assert_eq!(batch.avg_live_health, Some(80.0));
        assert_eq!(batch.avg_live_participation, Some(60.0));
        assert_eq!(batch.avg_consumption_health, Some(80.0));
        assert_eq!(batch.overall_health, Some(64.0));
    }

    #[test]
    fn participation_falls_back_to_live_source_when_coalescing() {
        let sheet3 = "BatchA,Week 1,80,,90\n";
        let sheet4 = "BatchA,Week 1,70,45,80\nBatchA,Week 2,70,35,80\n";

        let coalesced = run(sheet3, sheet4, &config());
        assert_eq!(coalesced.detailed[0].active_participation, Some(45.0));
        assert_eq!(coalesced.detailed[1].active_participation, Some(35.0));
        assert_eq!(coalesced.summary[0].avg_active_participation, Some(40.0));

        let separate = run(
            sheet3,
            sheet4,
            &PipelineConfig {
                participation_policy: MergePolicy::PrimaryOnly,
                ..config()
            },
        );
        assert_eq!(separate.detailed[0].active_participation, None);
        assert_eq!(separate.summary[0].avg_active_participation, None);
    }

    #[test]
    fn malformed_week_label_sorts_last_and_skips_latest_week() {
        let result = run(
            "BatchA,N/A,80,50,90\nBatchA,Week 10,80,50,90\nBatchA,Week 9,80,50,90\n",
            "",
            &config(),
        );

        let weeks: Vec<&str> = result
            .detailed
            .iter()
            .map(|r| r.week_number.as_str())
            .collect();
        assert_eq!(weeks, vec!["Week 9", "Week 10", "N/A"]);
        assert_eq!(result.summary[0].latest_week, Some(10));
        assert!(result.warnings.contains(&FieldWarning::UnparseableWeekNumber {
            batch: "BatchA".to_string(),
            label: "N/A".to_string(),
        }));
    }

    #[test]
    fn unparseable_start_date_degrades_current_week() {
        let result = run("BatchB,Week 1,60,30,70\n", "", &config());

        let batch = &result.summary[0];
        assert_eq!(batch.batch_start_date, None);
        assert_eq!(batch.current_week, None);
        assert_eq!(batch.overall_health, None);
        assert!(result.warnings.iter().any(|w| matches!(
            w,
            FieldWarning::UnparseableDate { batch, .. } if batch == "BatchB"
        )));
    }

    #[test]
    fn batch_absent_from_summaries_keeps_its_rows() {
        let result = run("", "BatchZ,Week 2,70,45,80\n", &config());

        assert_eq!(result.detailed.len(), 1);
        let batch = &result.summary[0];
        assert_eq!(batch.batch_name, "BatchZ");
        assert_eq!(batch.batch_start_date, None);
        assert_eq!(batch.reported_live_participation, None);
        assert_eq!(batch.avg_active_participation, Some(45.0));
    }

    #[test]
    fn duplicate_health_rows_keep_the_first() {
        let result = run(
            "BatchA,Week 1,80,50,90\nBatchA,Week 1,10,10,10\n",
            "",
            &config(),
        );
        assert_eq!(result.detailed.len(), 1);
        assert_eq!(result.detailed[0].consumption, Some(80.0));
        assert!(matches!(
            result.warnings[0],
            FieldWarning::DuplicateKey {
                sheet: Sheet::ConsumptionHealth,
                ..
            }
        ));
    }

    #[test]
    fn rounding_is_optional_and_idempotent() {
        let sheet3 = "BatchA,Week 1,80.126,50,90.333\n";
        let sheet4 = "BatchA,Week 1,70,45,80\n";

        let rounded = run(sheet3, sheet4, &config());
        assert_eq!(rounded.detailed[0].consumption, Some(80.13));
        assert_eq!(rounded.summary[0].overall_health, Some(72.27));

        let raw = run(
            sheet3,
            sheet4,
            &PipelineConfig {
                round_outputs: false,
                ..config()
            },
        );
        assert_eq!(raw.detailed[0].consumption, Some(80.126));

        for value in [80.13, 72.27, 0.1, 99.99, 1234.56] {
            assert_eq!(round2(round2(value)), round2(value));
        }
        assert_eq!(round2(1e307), 1e307);
        assert_eq!(round2(-1e307), -1e307);
    }

    #[test]
    fn huge_metrics_stay_finite_through_both_views() {
        let result = run(
            "BatchA,Week 1,1e307,1,1\nBatchA,Week 2,1.7e308,1,1\n",
            "",
            &config(),
        );

        assert_eq!(result.detailed[0].consumption, Some(1e307));
        assert_eq!(result.detailed[1].consumption, Some(1.7e308));
        let avg = result.summary[0].avg_consumption.unwrap();
        assert!(avg.is_finite());
        assert!((avg - 9e307).abs() / 9e307 < 1e-12);
    }

    #[test]
    fn mean_ignores_nulls_and_does_not_overflow() {
        let values = [Some(1.5e308), None, Some(1.5e308)];
        assert_eq!(mean(values.iter()), Some(1.5e308));
        assert_eq!(mean([None, None].iter()), None);
        assert_eq!(mean([Some(90.0), Some(70.0)].iter()), Some(80.0));
    }

    #[test]
    fn wide_week_numbers_are_kept() {
        let result = run(
            "BatchA,Week 99999999999,80,50,90\nBatchA,Week 2,80,50,90\n",
            "",
            &config(),
        );

        assert_eq!(result.summary[0].latest_week, Some(99_999_999_999));
        assert_eq!(result.detailed[1].week_number, "Week 99999999999");
        assert!(!result
            .warnings
            .iter()
            .any(|w| matches!(w, FieldWarning::UnparseableWeekNumber { .. })));
    }

    #[test]
    fn week_numbers_beyond_range_get_their_own_warning() {
        let label = "Week 123456789012345678901234567890";
        let result = run(&format!("BatchA,{label},80,50,90\n"), "", &config());

        assert_eq!(result.summary[0].latest_week, None);
        assert!(result.warnings.contains(&FieldWarning::WeekNumberOutOfRange {
            batch: "BatchA".to_string(),
            label: label.to_string(),
        }));
    }

    #[test]
    fn current_week_counts_elapsed_whole_weeks() {
        assert_eq!(current_week(date(2024, 1, 1), date(2024, 1, 22)), 4);
        assert_eq!(current_week(date(2024, 1, 1), date(2024, 1, 1)), 1);
        assert_eq!(current_week(date(2024, 1, 1), date(2024, 1, 7)), 1);
        assert_eq!(current_week(date(2024, 1, 1), date(2024, 1, 8)), 2);
        assert_eq!(current_week(date(2024, 1, 10), date(2024, 1, 8)), 0);
    }

    #[test]
    fn start_dates_accept_common_layouts() {
        let expected = Ok(Some(date(2024, 3, 5)));
        assert_eq!(parse_start_date("2024-03-05"), expected);
        assert_eq!(parse_start_date("03/05/2024"), expected);
        assert_eq!(parse_start_date("March 05, 2024"), expected);
        assert_eq!(parse_start_date("Tuesday, March 05, 2024"), expected);
        assert_eq!(parse_start_date("2024-03-05 09:30:00"), expected);
        assert_eq!(parse_start_date("2024-03-05T09:30:00+00:00"), expected);
        assert_eq!(parse_start_date(""), Ok(None));
        assert_eq!(parse_start_date("soon"), Err(()));
    }

    #[test]
    fn week_numbers_use_the_first_digit_run() {
        assert_eq!(parse_week_number("Week 7"), Some(7));
        assert_eq!(parse_week_number("W12 (late)"), Some(12));
        assert_eq!(parse_week_number("N/A"), None);
    }

    #[test]
    fn merge_policy_prefers_primary() {
        assert_eq!(MergePolicy::PreferPrimary.merge(Some(1), Some(2)), Some(1));
        assert_eq!(MergePolicy::PreferPrimary.merge(None, Some(2)), Some(2));
        assert_eq!(MergePolicy::PrimaryOnly.merge(None, Some(2)), None);
    }
}
