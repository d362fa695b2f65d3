// src/main.rs
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shiftstats_core::{
    validate_assignment, Assignment, Config, HoursType, RawAssignment, ReportBuilder, ReportFilter,
    ReportOptions, ReportSummary, Snapshot, SnapshotRecords,
};

#[derive(Parser)]
#[command(name = "shiftstats")]
#[command(version)]
#[command(about = "Validates shift times and reports worked hours, shifts and overtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds an hours report from a data snapshot
    Report {
        #[arg(value_enum)]
        view: View,

        #[command(flatten)]
        args: ReportArgs,
    },
    /// Checks one assignment against its workday before it is written
    Validate {
        /// Snapshot JSON holding the workday and task types
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long)]
        workday_id: String,

        /// Assignment JSON as submitted
        #[arg(long)]
        assignment: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum View {
    Company,
    Employee,
    Event,
    Duty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    snapshot: PathBuf,

    #[arg(long)]
    start_date: Option<NaiveDate>,

    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// `actual` or `previsto`
    #[arg(long)]
    hours_type: Option<HoursType>,

    #[arg(long)]
    include_breaks_hourly: Option<bool>,

    #[arg(long)]
    show_break_times: Option<bool>,

    #[arg(long)]
    company_id: Option<String>,

    /// Required for the event view
    #[arg(long)]
    event_id: Option<String>,

    /// Required for the duty view
    #[arg(long)]
    duty_id: Option<String>,

    #[arg(long)]
    client_id: Option<String>,

    #[arg(long)]
    location_id: Option<String>,

    #[arg(long)]
    user_id: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ReportArgs {
    fn options(&self, config: &Config) -> ReportOptions {
        let defaults = config.report_options();
        ReportOptions {
            hours_type: self.hours_type.unwrap_or(defaults.hours_type),
            include_breaks_hourly: self
                .include_breaks_hourly
                .unwrap_or(defaults.include_breaks_hourly),
            show_break_times: self.show_break_times.unwrap_or(defaults.show_break_times),
        }
    }

    fn filter(&self) -> ReportFilter {
        ReportFilter {
            start_date: self.start_date,
            end_date: self.end_date,
            company_id: self.company_id.clone(),
            event_id: self.event_id.clone(),
            duty_id: self.duty_id.clone(),
            client_id: self.client_id.clone(),
            location_id: self.location_id.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

fn main() -> Result<ExitCode> {
    let config = Config::from_env().context("Failed to read SHIFTSTATS_* configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
    debug!("Configuration loaded: {:?}", config);

    let cli = Cli::parse();
    match cli.command {
        Commands::Report { view, args } => {
            run_report(view, &args, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate {
            snapshot,
            workday_id,
            assignment,
        } => run_validate(&snapshot, &workday_id, &assignment),
    }
}

// --- Report ---

fn run_report(view: View, args: &ReportArgs, config: &Config) -> Result<()> {
    let snapshot = load_snapshot(&args.snapshot)?;
    let options = args.options(config);
    let builder = ReportBuilder::new(&snapshot.lookups, options, args.filter());
    let assignments: Vec<&Assignment> = snapshot.shift_assignments().collect();
    info!(
        "Building {:?} report over {} shift assignments ({} hours)",
        view,
        assignments.len(),
        options.hours_type
    );

    match view {
        View::Company => emit(&builder.company_report(assignments), args),
        View::Employee => emit(&builder.employee_report(assignments), args),
        View::Event => {
            let Some(event_id) = args.event_id.as_deref() else {
                bail!("the event view needs --event-id");
            };
            emit(&builder.event_report(event_id, assignments), args)
        }
        View::Duty => {
            let Some(duty_id) = args.duty_id.as_deref() else {
                bail!("the duty view needs --duty-id");
            };
            emit(&builder.duty_report(duty_id, assignments), args)
        }
    }
}

fn emit<R: Serialize + ReportSummary>(report: &R, args: &ReportArgs) -> Result<()> {
    let bytes = match args.format {
        OutputFormat::Json => {
            serde_json::to_vec_pretty(report).context("Failed to serialize report")?
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in report.summary_rows() {
                writer.serialize(row).context("Failed to write CSV row")?;
            }
            writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e))?
        }
    };
    write_output(&bytes, args.output.as_deref())
}

fn write_output(bytes: &[u8], path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes).context("Failed to write to stdout")?;
            writeln!(stdout).context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

// --- Validate ---

fn run_validate(snapshot_path: &Path, workday_id: &str, assignment_path: &Path) -> Result<ExitCode> {
    let snapshot = load_snapshot(snapshot_path)?;
    let Some(workday) = snapshot.workday(workday_id) else {
        bail!("workday {} not found in {}", workday_id, snapshot_path.display());
    };

    let text = fs::read_to_string(assignment_path)
        .with_context(|| format!("Failed to read {}", assignment_path.display()))?;
    let raw: RawAssignment = serde_json::from_str(&text)
        .with_context(|| format!("{} is not an assignment record", assignment_path.display()))?;

    let outcome = Assignment::try_from_raw(raw)
        .and_then(|draft| validate_assignment(draft, workday, &snapshot.lookups.task_types));
    match outcome {
        Ok(assignment) => {
            print_json(&assignment)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            warn!("Assignment rejected: {}", e);
            print_json(&e.rejection())?;
            Ok(ExitCode::from(2))
        }
    }
}

// --- Helpers ---

fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let records: SnapshotRecords = serde_json::from_str(&text)
        .with_context(|| format!("Snapshot {} is not valid JSON", path.display()))?;
    let snapshot = Snapshot::from_records(records);
    info!(
        "Snapshot {} loaded: {} workdays",
        path.display(),
        snapshot.workdays.len()
    );
    Ok(snapshot)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
