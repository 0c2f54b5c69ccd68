use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

pub const BATCH_NAME: &str = "Batch Name";
pub const WEEK_NUMBER: &str = "Week Number";
pub const BATCH_START_DATE: &str = "Batch Start Date";
pub const AVERAGE_CONSUMPTION: &str = "Average Consumption";
pub const AVERAGE_LIVE_PARTICIPATION: &str = "Average Live Participation";
pub const ACTIVE_PARTICIPATION: &str = "Active Participation";
pub const HEALTH_CONSUMPTION: &str = "Batch Health (Consumption)";
pub const HEALTH_LIVE: &str = "Batch Health (Live Participation)";

pub const SUMMARY_HEADERS: [&str; 10] = [
    BATCH_NAME,
    BATCH_START_DATE,
    "Avg Consumption",
    "Avg Active Participation",
    "Avg Batch Health (Consumption)",
    "Avg Live Participation",
    "Avg Batch Health (Live Participation)",
    "Overall Batch Health",
    "Latest Week",
    "Current Week",
];

pub const DETAILED_HEADERS: [&str; 7] = [
    BATCH_NAME,
    WEEK_NUMBER,
    "Avg Consumption",
    "Avg Active Participation",
    "Avg Batch Health (Consumption)",
    "Avg Live Participation",
    "Avg Batch Health (Live Participation)",
];

/// A delimited table as read from disk: one header row plus raw string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// The four uploaded inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sheet {
    ConsumptionSummary,
    LiveParticipationSummary,
    ConsumptionHealth,
    LiveHealth,
}

impl Sheet {
    pub const ALL: [Sheet; 4] = [
        Sheet::ConsumptionSummary,
        Sheet::LiveParticipationSummary,
        Sheet::ConsumptionHealth,
        Sheet::LiveHealth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Sheet::ConsumptionSummary => "Sheet1",
            Sheet::LiveParticipationSummary => "Sheet2",
            Sheet::ConsumptionHealth => "Sheet3",
            Sheet::LiveHealth => "Sheet4",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Sheet::ConsumptionSummary => "Average Course Consumption by Batch",
            Sheet::LiveParticipationSummary => "Average Live Participation by Batch",
            Sheet::ConsumptionHealth => "Consumption-Based Batch Health",
            Sheet::LiveHealth => "Live-Based Batch Health",
        }
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionSummaryRow {
    pub batch_name: String,
    pub average_consumption: Option<f64>,
    pub batch_start_date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveSummaryRow {
    pub batch_name: String,
    pub average_live_participation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionHealthRow {
    pub batch_name: String,
    pub week_number: String,
    pub average_consumption: Option<f64>,
    pub active_participation: Option<f64>,
    pub batch_health: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveHealthRow {
    pub batch_name: String,
    pub week_number: String,
    pub average_live_participation: Option<f64>,
    pub active_participation: Option<f64>,
    pub batch_health: Option<f64>,
}

/// One (batch, week) pair after the full outer join of the two health sheets.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub batch_name: String,
    pub week_number: String,
    pub consumption_from_health_source: Option<f64>,
    pub participation_from_consumption_source: Option<f64>,
    pub participation_from_live_source: Option<f64>,
    /// Result of the configured merge policy over the two participation fields.
    pub active_participation: Option<f64>,
    pub consumption_health: Option<f64>,
    pub live_participation_from_health_source: Option<f64>,
    pub live_health: Option<f64>,
}

/// A master row with the per-batch summary values broadcast onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub health: MasterRow,
    pub consumption_from_summary_source: Option<f64>,
    pub live_participation_from_summary_source: Option<f64>,
    pub batch_start_date: Option<NaiveDate>,
    pub week_numeric: Option<u64>,
    pub current_week: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Batch Name")]
    pub batch_name: String,
    #[serde(rename = "Batch Start Date")]
    pub batch_start_date: Option<String>,
    #[serde(rename = "Avg Consumption")]
    pub avg_consumption: Option<f64>,
    #[serde(rename = "Avg Active Participation")]
    pub avg_active_participation: Option<f64>,
    #[serde(rename = "Avg Batch Health (Consumption)")]
    pub avg_consumption_health: Option<f64>,
    #[serde(rename = "Avg Live Participation")]
    pub avg_live_participation: Option<f64>,
    #[serde(rename = "Avg Batch Health (Live Participation)")]
    pub avg_live_health: Option<f64>,
    #[serde(rename = "Overall Batch Health")]
    pub overall_health: Option<f64>,
    #[serde(rename = "Latest Week")]
    pub latest_week: Option<u64>,
    #[serde(rename = "Current Week")]
    pub current_week: Option<i64>,
    #[serde(skip_serializing)]
    pub reported_consumption: Option<f64>,
    #[serde(skip_serializing)]
    pub reported_live_participation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedRow {
    #[serde(rename = "Batch Name")]
    pub batch_name: String,
    #[serde(rename = "Week Number")]
    pub week_number: String,
    #[serde(rename = "Avg Consumption")]
    pub consumption: Option<f64>,
    #[serde(rename = "Avg Active Participation")]
    pub active_participation: Option<f64>,
    #[serde(rename = "Avg Batch Health (Consumption)")]
    pub consumption_health: Option<f64>,
    #[serde(rename = "Avg Live Participation")]
    pub live_participation: Option<f64>,
    #[serde(rename = "Avg Batch Health (Live Participation)")]
    pub live_health: Option<f64>,
}
