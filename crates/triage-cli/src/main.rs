use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use triage_core::FailedTestRecord;
use triage_engine::{AlwaysNo, AlwaysYes, Confirm, Prompt, ReconcileConfig, Reconciler, RunReport};
use triage_results::{open_reader, prune, Layout, PruneOptions, ResultsError, DEFAULT_RESULTS_DIR};

mod config;
mod logging;

use config::{JiraSettings, TrackerArgs};

const EXIT_FAILED_OUTCOME: u8 = 1;
const EXIT_ENVIRONMENT: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "triage")]
#[command(about = "File, reopen or comment on Jira tickets for failed automated tests")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile every failed test with the tracker
    Report(ReportArgs),
    /// Print the failed tests found in the results directory as JSON
    Scan(ScanArgs),
    /// Delete passed test folders and collect failed ones under readable names
    Prune(PruneArgs),
}

#[derive(Debug, Clone, Args)]
struct ResultsArgs {
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    results_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = LayoutArg::Auto)]
    layout: LayoutArg,
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[command(flatten)]
    results: ResultsArgs,
    #[command(flatten)]
    tracker: TrackerArgs,
    #[arg(long, value_enum, default_value_t = ConfirmMode::Prompt)]
    confirm: ConfirmMode,
    /// Non-zero exit on failed outcomes (1) or environment errors (2)
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Print the full run report as JSON instead of the summary line
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Args)]
struct ScanArgs {
    #[command(flatten)]
    results: ResultsArgs,
}

#[derive(Debug, Args)]
struct PruneArgs {
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    results_dir: PathBuf,
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Browser project suffix cut from folder names; repeatable
    #[arg(long = "project-suffix")]
    project_suffixes: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    Auto,
    LogMarker,
    Structured,
}

impl LayoutArg {
    fn layout(self) -> Option<Layout> {
        match self {
            Self::Auto => None,
            Self::LogMarker => Some(Layout::LogMarker),
            Self::Structured => Some(Layout::Structured),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConfirmMode {
    Prompt,
    Yes,
    No,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match cli.command {
        Command::Report(args) => run_report(&args).await,
        Command::Scan(args) => run_scan(&args),
        Command::Prune(args) => run_prune(&args),
    }
}

async fn run_report(args: &ReportArgs) -> Result<ExitCode> {
    let report = match prepare(args) {
        Ok((records, settings)) => {
            let config = ReconcileConfig::new(settings.project_key.clone())
                .with_report_url(settings.report_url.clone());
            let reconciler = Reconciler::new(settings.client(), config);
            tracing::info!(
                tracker = reconciler.tracker().base_url(),
                project = %settings.project_key,
                tests = records.len(),
                "starting reconciliation"
            );

            let mut confirm: Box<dyn Confirm> = match args.confirm {
                ConfirmMode::Prompt => Box::new(Prompt::stdio()),
                ConfirmMode::Yes => Box::new(AlwaysYes),
                ConfirmMode::No => Box::new(AlwaysNo),
            };
            reconciler.run(records, confirm.as_mut()).await
        }
        Err(message) => {
            tracing::error!("{message}");
            RunReport::environment_failure(message)
        }
    };

    if args.json {
        print_json(&report)?;
    } else {
        println!("{}", report.summary_line());
    }

    Ok(exit_code(&report, args.strict))
}

/// Environment errors end the run before any tracker call, with an empty
/// input set.
fn prepare(args: &ReportArgs) -> Result<(Vec<FailedTestRecord>, JiraSettings), String> {
    let records = read_records(&args.results.results_dir, args.results.layout.layout())
        .map_err(|err| err.to_string())?;
    let settings = JiraSettings::from_args(&args.tracker).map_err(|err| err.to_string())?;
    Ok((records, settings))
}

fn exit_code(report: &RunReport, strict: bool) -> ExitCode {
    if !strict {
        return ExitCode::SUCCESS;
    }
    if report.environment_error.is_some() {
        ExitCode::from(EXIT_ENVIRONMENT)
    } else if report.has_failures() {
        ExitCode::from(EXIT_FAILED_OUTCOME)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_scan(args: &ScanArgs) -> Result<ExitCode> {
    let records = read_records(&args.results.results_dir, args.results.layout.layout())
        .with_context(|| format!("failed to scan {}", args.results.results_dir.display()))?;
    print_json(&records)?;
    Ok(ExitCode::SUCCESS)
}

fn run_prune(args: &PruneArgs) -> Result<ExitCode> {
    let mut options = PruneOptions { dry_run: args.dry_run, ..PruneOptions::default() };
    if !args.project_suffixes.is_empty() {
        options.project_suffixes.clone_from(&args.project_suffixes);
    }

    let report = prune(&args.results_dir, &options)
        .with_context(|| format!("failed to prune {}", args.results_dir.display()))?;
    tracing::info!(removed = report.removed.len(), kept = report.kept.len(), dry_run = report.dry_run, "prune finished");
    print_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

/// Unreadable entries are logged and left out; only a missing root fails.
fn read_records(root: &Path, layout: Option<Layout>) -> Result<Vec<FailedTestRecord>, ResultsError> {
    let reader = open_reader(root, layout)?;
    tracing::info!(root = %root.display(), layout = reader.layout().as_str(), "reading test results");

    let mut records = Vec::new();
    for item in reader.records()? {
        match item {
            Ok(record) => records.push(record),
            Err(err) => tracing::warn!(error = %err, "skipping unreadable test result"),
        }
    }
    tracing::info!(failed = records.len(), "found failed tests");
    Ok(records)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
