use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use component_scanner::commands::history::{clear_history, recent_history};
use component_scanner::commands::maintenance::{doctor, repair_csv, test_connection};
use component_scanner::commands::scan::{
    check_operator, scan_image, scan_manual, Confirmation, ScanDisposition, ScanOutcome,
};
use component_scanner::commands::{login, CommandError};
use component_scanner::config::ScannerConfig;
use component_scanner::core_state::CoreState;
use component_scanner::maintenance::has_failures;
use component_scanner::models::AppVariant;
use component_scanner::pipeline::ScanError;
use component_scanner::storage::{ChannelOutcome, DEFAULT_HISTORY_LIMIT};

#[derive(Parser)]
#[command(name = "scanner")]
#[command(about = "Scan component labels, validate the 7-digit code and record who took it")]
#[command(version)]
struct Cli {
    /// Config file (default: <data dir>/scanner.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// personal, multi_operator or admin
    #[arg(long, global = true)]
    variant: Option<AppVariant>,

    /// Login NIK (personal variant)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Login password (personal variant)
    #[arg(long, global = true)]
    password: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EntryArgs {
    /// Operator NIK (multi_operator and admin variants)
    #[arg(long)]
    operator: Option<String>,

    #[arg(long, default_value_t = 1)]
    quantity: u32,

    #[arg(long, default_value = "")]
    reason: String,

    /// Save the record; without it the scan is only validated
    #[arg(long)]
    confirm: bool,
}

impl EntryArgs {
    fn into_confirmation(self) -> Confirmation {
        Confirmation {
            operator: self.operator,
            quantity: self.quantity,
            reason: self.reason,
            confirm: self.confirm,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize a component code from a label image
    Scan {
        #[arg(long)]
        image: PathBuf,
        /// Label the record as a camera capture
        #[arg(long)]
        camera: bool,
        #[command(flatten)]
        entry: EntryArgs,
    },
    /// Enter a component code by hand
    Manual {
        #[arg(long)]
        code: String,
        #[command(flatten)]
        entry: EntryArgs,
    },
    /// Check an operator NIK against the operator catalog
    Operator { nik: String },
    /// Show the latest records of a partition
    History {
        #[arg(long)]
        partition: Option<String>,
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
    /// Delete the local records of a partition
    ClearHistory {
        #[arg(long)]
        partition: Option<String>,
    },
    /// Rewrite a legacy record CSV in the current column layout
    RepairCsv { path: PathBuf },
    /// Check OCR engines, catalogs, data directory and remote sheet
    Doctor,
    /// Open the remote sheet and append a test row
    TestConnection,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ScannerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(variant) = cli.variant {
        config.general.variant = variant;
    }
    component_scanner::init_tracing(config.logging.filter.as_deref());

    let state = CoreState::new(config);
    let json = cli.json;
    match run(&state, cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            report_error(&e, json);
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command. `Ok(false)` means it ran but did not succeed.
fn run(state: &CoreState, cli: Cli) -> Result<bool, CommandError> {
    let json = cli.json;
    let needs_login = matches!(
        cli.command,
        Commands::Scan { .. }
            | Commands::Manual { .. }
            | Commands::History { .. }
            | Commands::ClearHistory { .. }
    );
    let user = if needs_login {
        login(state, cli.user.as_deref(), cli.password.as_deref())?
    } else {
        None
    };

    match cli.command {
        Commands::Scan {
            image,
            camera,
            entry,
        } => {
            let confirmation = entry.into_confirmation();
            let outcome = scan_image(state, user.as_ref(), &image, camera, &confirmation)?;
            Ok(print_scan(&outcome, json))
        }
        Commands::Manual { code, entry } => {
            let confirmation = entry.into_confirmation();
            let outcome = scan_manual(state, user.as_ref(), &code, &confirmation)?;
            Ok(print_scan(&outcome, json))
        }
        Commands::Operator { nik } => {
            let validation = check_operator(state, &nik)?;
            let nik = &validation.personnel_number;
            emit(json, &validation, || {
                match (validation.valid, &validation.name, validation.verified) {
                    (true, Some(name), _) => println!("Operator {nik} ({name}) is valid"),
                    (true, None, false) => {
                        println!("Operator {nik} accepted UNVERIFIED: no operator catalog")
                    }
                    (true, None, true) => println!("Operator {nik} is valid"),
                    (false, ..) => println!("Operator {nik} not found"),
                }
            });
            Ok(validation.valid)
        }
        Commands::History { partition, limit } => {
            let view = recent_history(state, user.as_ref(), partition.as_deref(), limit)?;
            emit(json, &view, || {
                println!("History for {} ({} rows)", view.partition, view.entries.len());
                for e in &view.entries {
                    println!(
                        "{}  {}  {}  x{}  op {}  {}",
                        e.timestamp,
                        e.component_code,
                        e.component_description,
                        e.quantity,
                        e.operator_id,
                        e.reason
                    );
                }
            });
            Ok(true)
        }
        Commands::ClearHistory { partition } => {
            let cleared = clear_history(state, user.as_ref(), partition.as_deref())?;
            emit(json, &cleared, || {
                println!("Removed {} file(s) for {}", cleared.removed.len(), cleared.partition);
                for path in &cleared.removed {
                    println!("  {}", path.display());
                }
            });
            Ok(true)
        }
        Commands::RepairCsv { path } => {
            let report = repair_csv(&path)?;
            emit(json, &report, || {
                println!(
                    "Repaired {}: {} rows written, {} dropped",
                    path.display(),
                    report.rows_written,
                    report.rows_dropped
                );
            });
            Ok(true)
        }
        Commands::Doctor => {
            let results = doctor(state);
            emit(json, &results, || {
                for r in &results {
                    println!("[{:<4}] {:<18} {}", r.status.label(), r.name, r.detail);
                }
            });
            Ok(!has_failures(&results))
        }
        Commands::TestConnection => {
            let report = test_connection(state);
            emit(json, &report, || {
                for (i, step) in report.steps.iter().enumerate() {
                    let mark = if step.passed { "ok" } else { "FAILED" };
                    println!("{}. {:<16} {:<6} {}", i + 1, step.name, mark, step.detail);
                }
            });
            Ok(report.succeeded())
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce()) {
    if !json {
        text();
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(out) => println!("{out}"),
        Err(e) => eprintln!("error: cannot serialize output: {e}"),
    }
}

fn print_scan(outcome: &ScanOutcome, json: bool) -> bool {
    emit(json, outcome, || {
        println!("Code:        {}", outcome.code);
        println!("Description: {}", outcome.description);
        match outcome.engine {
            Some(engine) => println!("Source:      {} (OCR: {engine})", outcome.source),
            None => println!("Source:      {}", outcome.source),
        }
        if outcome.ambiguity_warning {
            println!(
                "WARNING: other codes were also found ({}); check the label",
                outcome.additional_matches.join(", ")
            );
        }
        if !outcome.operator_verified {
            println!(
                "WARNING: operator {} not verified (no operator catalog)",
                outcome.operator.id
            );
        }
        match &outcome.disposition {
            ScanDisposition::Cancelled => {
                println!("Not saved: pass --confirm to record this scan");
            }
            ScanDisposition::Persisted { report } => {
                println!("Partition:   {}", report.partition);
                println!("Remote:      {}", describe_channel(&report.remote));
                println!("Local:       {}", describe_channel(&report.local));
                if let Some(reason) = &report.local_fallback {
                    println!("             (spreadsheet write failed: {reason})");
                }
            }
        }
    });
    outcome.stored_or_cancelled()
}

fn describe_channel(outcome: &ChannelOutcome) -> String {
    match outcome {
        ChannelOutcome::Saved { location } => format!("saved ({location})"),
        ChannelOutcome::Skipped { reason } => format!("skipped ({reason})"),
        ChannelOutcome::Failed { error } => format!("FAILED ({error})"),
    }
}

fn report_error(error: &CommandError, json: bool) {
    if json {
        let body = serde_json::json!({ "error": error.to_string() });
        eprintln!("{body}");
        return;
    }
    eprintln!("error: {error}");
    match error {
        CommandError::Scan(ScanError::RecognitionEmpty { attempts }) => {
            for attempt in attempts {
                if let Some(failure) = &attempt.failure {
                    eprintln!("  {}: {failure}", attempt.engine);
                } else {
                    eprintln!("  {}: no text", attempt.engine);
                }
            }
            eprintln!("hint: enter the code with `scanner manual --code <7 digits>`");
        }
        CommandError::Scan(ScanError::NoCodeFound { .. })
        | CommandError::Scan(ScanError::CodeNotInCatalog(_)) => {
            eprintln!("hint: correct the code with `scanner manual --code <7 digits>`");
        }
        _ => {}
    }
}
