use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod error;
mod models;
mod normalize;
mod pipeline;
mod report;
mod sources;

use crate::models::Sheet;
use crate::pipeline::{MergePolicy, PipelineConfig};
use crate::sources::{InputSet, SheetSet};

#[derive(Parser)]
#[command(name = "batch-health-report")]
#[command(about = "Reconcile batch consumption and live participation sheets into health views", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Average Course Consumption by Batch (Sheet1)
    #[arg(long, value_name = "CSV")]
    consumption_summary: Option<PathBuf>,
    /// Average Live Participation by Batch (Sheet2)
    #[arg(long, value_name = "CSV")]
    live_summary: Option<PathBuf>,
    /// Consumption-Based Batch Health (Sheet3)
    #[arg(long, value_name = "CSV")]
    consumption_health: Option<PathBuf>,
    /// Live-Based Batch Health (Sheet4)
    #[arg(long, value_name = "CSV")]
    live_health: Option<PathBuf>,
}

impl From<InputArgs> for InputSet {
    fn from(args: InputArgs) -> Self {
        InputSet {
            consumption_summary: args.consumption_summary,
            live_summary: args.live_summary,
            consumption_health: args.consumption_health,
            live_health: args.live_health,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the Summary and Detailed views
    Process {
        #[command(flatten)]
        inputs: InputArgs,
        /// Directory for Summary_View.csv and Detailed_View.csv
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Date used for Current Week (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        as_of: Option<NaiveDate>,
        /// Keep Active Participation from the consumption sheet only
        #[arg(long)]
        no_coalesce: bool,
        /// Leave metrics unrounded
        #[arg(long)]
        no_round: bool,
        /// Also write a markdown report
        #[arg(long = "report", value_name = "FILE")]
        report_path: Option<PathBuf>,
        /// Print both views as JSON instead of the summary listing
        #[arg(long)]
        json: bool,
    },
    /// Check that every sheet carries the expected headers
    Validate {
        #[command(flatten)]
        inputs: InputArgs,
    },
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("batch_health_report=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            inputs,
            out_dir,
            as_of,
            no_coalesce,
            no_round,
            report_path,
            json,
        } => {
            let sheets = SheetSet::load(&inputs.into())?;

            let config = PipelineConfig {
                participation_policy: if no_coalesce {
                    MergePolicy::PrimaryOnly
                } else {
                    MergePolicy::PreferPrimary
                },
                round_outputs: !no_round,
                today: as_of.unwrap_or_else(|| Local::now().date_naive()),
            };

            let result = pipeline::process(
                &sheets.consumption_summary,
                &sheets.live_summary,
                &sheets.consumption_health,
                &sheets.live_health,
                &config,
            )?;

            let (summary_path, detailed_path) = report::write_views(&out_dir, &result)
                .with_context(|| format!("failed to write views to {}", out_dir.display()))?;
            info!(
                summary = %summary_path.display(),
                detailed = %detailed_path.display(),
                "Views written"
            );

            if let Some(path) = report_path {
                let markdown = report::build_report(&result, config.today);
                std::fs::write(&path, markdown)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Report written to {}.", path.display());
            }

            if !result.warnings.is_empty() {
                warn!(count = result.warnings.len(), "Some fields were degraded to null");
            }

            if json {
                println!("{}", report::to_json(&result)?);
                return Ok(());
            }

            if result.summary.is_empty() {
                println!("No batches found in the health sheets.");
                return Ok(());
            }

            println!("Batch health summary:");
            for row in &result.summary {
                println!(
                    "- {} (started {}) overall {} | consumption {} | live {} | week {} of {}",
                    row.batch_name,
                    row.batch_start_date.as_deref().unwrap_or("unknown"),
                    display(row.overall_health),
                    display(row.avg_consumption_health),
                    display(row.avg_live_health),
                    display(row.latest_week),
                    display(row.current_week)
                );
            }
        }
        Commands::Validate { inputs } => {
            let sheets = SheetSet::load(&inputs.into())?;
            for sheet in Sheet::ALL {
                let table = normalize::normalize(sheets.get(sheet), sheet)?;
                println!("{sheet}: ok ({} rows)", table.rows.len());
            }
        }
    }

    Ok(())
}

fn display<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}
