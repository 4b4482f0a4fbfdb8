/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Syu-Update. Loads the managed file list,
    runs one update batch, and reports what changed.

  Security / Safety Notes:
    Operates within user privileges. Performs HTTP(S) GET
    requests and writes only beneath the configured root.

  Dependencies:
    clap for CLI parsing, serde_json for report output.

  Operational Scope:
    Invoked by the Syn-Syu Bash layer via `syn-syu update` or by
    operators refreshing assets by hand.

  Revision History:
    2025-11-12 COD  Authored Syn-Syu-Update runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;

use synsyu_update::config::UpdaterConfig;
use synsyu_update::logger::Logger;
use synsyu_update::{
    BatchCoordinator, BatchReport, BatchState, FilePlan, LogSink, Result, UpdaterError,
};

/// Command-line arguments for Syn-Syu-Update.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Syu-Update",
    version,
    author = "Synavera Systems",
    about = "Conscious asset updater for Syn-Syu"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override install root directory.
    #[arg(long, value_name = "PATH")]
    root: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Maximum concurrent transfers (0 = hardware parallelism).
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,
    /// Deadline for the whole batch, in seconds.
    #[arg(long, value_name = "SECS")]
    batch_timeout: Option<u64>,
    /// Connect timeout per file, in milliseconds.
    #[arg(long, value_name = "MS")]
    connect_timeout: Option<u64>,
    /// Read timeout per file, in milliseconds.
    #[arg(long, value_name = "MS")]
    read_timeout: Option<u64>,
    /// Print decisions without downloading or deleting anything.
    #[arg(long, action = ArgAction::SetTrue)]
    plan: bool,
    /// Emit the batch report as JSON.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Syu-Update] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = UpdaterConfig::load_from_optional_path(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);

    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| Logger::session_path(&config.log_dir()));
    let logger = Arc::new(Logger::new(Some(log_path), cli.verbose)?);
    logger.info("INIT", "Syn-Syu Update awakening.");

    let descriptors = config.descriptors()?;
    let root = config.download_root();
    logger.info(
        "FILES",
        format!("Managing {} files under {}", descriptors.len(), root.display()),
    );

    let cancel = CancellationToken::new();
    let mut coordinator =
        BatchCoordinator::new(root, Arc::new(config.version_table()), descriptors)?
            .with_logger(Arc::clone(&logger))
            .with_status_sink(Arc::new(LogSink::new(Arc::clone(&logger))))
            .with_file_timeouts(config.connect_timeout(), config.read_timeout())
            .with_batch_timeout(config.batch_timeout())
            .with_max_parallel(config.updater.max_parallel)
            .with_cancellation(cancel.clone());
    if let Some(staging) = config.staging_dir() {
        coordinator = coordinator.with_staging_dir(staging);
    }
    if let Some(agent) = &config.updater.user_agent {
        coordinator = coordinator.with_user_agent(agent.clone());
    }

    if cli.plan {
        let plan = coordinator.plan();
        if cli.json {
            print_json(&plan)?;
        } else {
            print_plan(&plan);
        }
        logger.finalize()?;
        return Ok(ExitCode::SUCCESS);
    }

    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        let logger = Arc::clone(&logger);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                logger.warn("SIGINT", "Interrupt received; cancelling batch");
                cancel.cancel();
            }
        }
    });

    let report = coordinator.run_report().await;
    interrupt.abort();

    if cli.json {
        print_json(&report)?;
    } else {
        print_summary(&report);
    }

    match completion_note(&report) {
        None => logger.info("COMPLETE", "Assets synchronised."),
        Some(note) => logger.warn("COMPLETE", note),
    }
    logger.finalize()?;

    Ok(match report.state {
        BatchState::Interrupted => ExitCode::from(130),
        BatchState::Completed | BatchState::TimedOut => ExitCode::SUCCESS,
    })
}

fn apply_overrides(config: &mut UpdaterConfig, cli: &Cli) {
    if let Some(root) = &cli.root {
        config.updater.download_root = Some(root.clone());
    }
    if let Some(jobs) = cli.jobs {
        config.updater.max_parallel = jobs;
    }
    if let Some(secs) = cli.batch_timeout {
        config.updater.batch_timeout_secs = secs;
    }
    if let Some(ms) = cli.connect_timeout {
        config.updater.connect_timeout_ms = ms;
    }
    if let Some(ms) = cli.read_timeout {
        config.updater.read_timeout_ms = ms;
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| UpdaterError::Serialization(format!("Failed to render report: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn print_plan(plan: &[FilePlan]) {
    for file in plan {
        println!(
            "{:<32} {:<12} → {}",
            file.id,
            file.current.as_deref().unwrap_or("-"),
            file.decision
        );
    }
}

/// Closing log line for a batch that did not fully succeed.
fn completion_note(report: &BatchReport) -> Option<String> {
    let failures = report.failures();
    match report.state {
        BatchState::Completed if failures == 0 => None,
        BatchState::Completed => Some(format!("Batch finished; {failures} files failed.")),
        BatchState::TimedOut => Some(format!(
            "Batch deadline reached; {failures} files not synchronised."
        )),
        BatchState::Interrupted => Some(format!(
            "Batch interrupted; {failures} files not synchronised."
        )),
    }
}

fn print_summary(report: &BatchReport) {
    let state_note = match report.state {
        BatchState::Completed => "",
        BatchState::TimedOut => " (deadline reached)",
        BatchState::Interrupted => " (interrupted)",
    };
    println!(
        "→ Update batch finished{}. Files={} Failures={} Changed={}",
        state_note,
        report.files.len(),
        report.failures(),
        report.changed
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use synsyu_update::{FileOutcome, FileReport, UpdateDecision};

    use super::*;

    #[test]
    fn cli_overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "synsyu_update",
            "--root",
            "/srv/assets",
            "--jobs",
            "2",
            "--batch-timeout",
            "45",
            "--read-timeout",
            "900",
        ]);
        let mut config = UpdaterConfig::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.download_root(), PathBuf::from("/srv/assets"));
        assert_eq!(config.updater.max_parallel, 2);
        assert_eq!(config.batch_timeout(), Duration::from_secs(45));
        assert_eq!(config.read_timeout(), Duration::from_millis(900));
        assert_eq!(config.connect_timeout(), Duration::from_millis(3000));
    }

    #[test]
    fn plan_and_json_flags_parse() {
        let cli = Cli::parse_from(["synsyu_update", "--plan", "--json", "--verbose"]);
        assert!(cli.plan && cli.json && cli.verbose);
        assert!(cli.config.is_none());
    }

    fn report(state: BatchState, outcomes: Vec<FileOutcome>) -> BatchReport {
        let files = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| FileReport {
                plan: FilePlan {
                    id: format!("file{index}.bin"),
                    destination: PathBuf::from(format!("/srv/assets/file{index}.bin")),
                    current: None,
                    newest: Some("1".into()),
                    decision: UpdateDecision::Install {
                        version: "1".into(),
                    },
                },
                outcome,
            })
            .collect();
        BatchReport {
            state,
            changed: false,
            files,
        }
    }

    #[test]
    fn clean_batch_logs_synchronised() {
        let clean = report(BatchState::Completed, vec![FileOutcome::Changed(true)]);
        assert_eq!(completion_note(&clean), None);
    }

    #[test]
    fn failed_or_unfinished_batches_log_a_warning() {
        let failed = report(
            BatchState::Completed,
            vec![
                FileOutcome::Changed(true),
                FileOutcome::Failed("404".into()),
            ],
        );
        let note = completion_note(&failed).unwrap();
        assert!(note.contains("1 files failed"), "{note}");

        let late = report(BatchState::TimedOut, vec![FileOutcome::TimedOut]);
        assert!(completion_note(&late).unwrap().contains("deadline"));

        let stopped = report(BatchState::Interrupted, vec![FileOutcome::Cancelled]);
        assert!(completion_note(&stopped).unwrap().contains("interrupted"));
    }
}
