/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::batch
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Run one update batch: decide every file, install or delete
    them concurrently under a shared deadline, and reduce the
    per-file outcomes to a single "anything changed" signal.

  Security / Safety Notes:
    Each task owns a distinct destination and a private temp
    file; no locking is needed between tasks. Failures of one
    file never abort the others.

  Dependencies:
    tokio (JoinSet, Semaphore, time) for the task group,
    tokio-util CancellationToken for interruption, serde for
    batch reports.

  Operational Scope:
    Invoked by the Syn-Syu-Update binary or embedded by callers
    that refresh their own assets.

  Revision History:
    2025-11-12 COD  Authored batch coordinator.
    2025-11-19 COD  Panics settle against their own file.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Bounded parallelism with explicit deadline
    - Every failure reported, none fatal to the batch
    - Deterministic report ordering
============================================================*/

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::decision::{decide, UpdateDecision};
use crate::descriptor::FileDescriptor;
use crate::error::{BatchError, Result, UpdaterError};
use crate::installer::{FileInstaller, FileTimeouts};
use crate::logger::Logger;
use crate::status::{NullStatusSink, StatusSink};
use crate::version::VersionOracle;

/// Default deadline for a whole batch.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Extra time granted past the deadline before stuck tasks are aborted.
const ABORT_GRACE: Duration = Duration::from_secs(1);

/// Stand-in deadline when the configured timeout overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Completed,
    TimedOut,
    Interrupted,
}

/// Result of one file's task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FileOutcome {
    Changed(bool),
    Failed(String),
    TimedOut,
    Cancelled,
}

impl FileOutcome {
    /// True only for tasks that completed and modified the filesystem.
    pub fn changed(&self) -> bool {
        matches!(self, FileOutcome::Changed(true))
    }
}

/// Decision for one file, computed before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePlan {
    pub id: String,
    pub destination: PathBuf,
    pub current: Option<String>,
    pub newest: Option<String>,
    pub decision: UpdateDecision,
}

/// Plan and outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    #[serde(flatten)]
    pub plan: FilePlan,
    pub outcome: FileOutcome,
}

/// Everything a batch did, in descriptor order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub state: BatchState,
    pub changed: bool,
    pub files: Vec<FileReport>,
}

impl BatchReport {
    /// Number of files that did not complete successfully.
    pub fn failures(&self) -> usize {
        self.files
            .iter()
            .filter(|file| !matches!(file.outcome, FileOutcome::Changed(_)))
            .count()
    }
}

enum TaskEnd {
    Finished(std::result::Result<bool, BatchError>),
    TimedOut,
    Cancelled,
}

/// Coordinates one update batch across a bounded set of worker tasks.
pub struct BatchCoordinator {
    download_root: PathBuf,
    oracle: Arc<dyn VersionOracle>,
    descriptors: Vec<Arc<dyn FileDescriptor>>,
    sink: Arc<dyn StatusSink>,
    logger: Arc<Logger>,
    timeouts: FileTimeouts,
    batch_timeout: Duration,
    max_parallel: usize,
    staging_dir: Option<PathBuf>,
    user_agent: Option<String>,
    cancel: CancellationToken,
}

impl BatchCoordinator {
    /// Build a coordinator for `descriptors` installed beneath `download_root`.
    ///
    /// Fails when no descriptors are supplied.
    pub fn new(
        download_root: impl Into<PathBuf>,
        oracle: Arc<dyn VersionOracle>,
        descriptors: Vec<Arc<dyn FileDescriptor>>,
    ) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(UpdaterError::InputValidation(
                "You must provide at least one file to update".into(),
            ));
        }
        Ok(Self {
            download_root: download_root.into(),
            oracle,
            descriptors,
            sink: Arc::new(NullStatusSink),
            logger: Arc::new(Logger::stderr()),
            timeouts: FileTimeouts::default(),
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            max_parallel: default_parallelism(),
            staging_dir: None,
            user_agent: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Change the per-file connect and read timeouts. Default is 3 seconds each.
    pub fn with_file_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.timeouts = FileTimeouts { connect, read };
        self
    }

    /// Change the deadline for the whole batch. Default is 10 minutes.
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Limit concurrent transfers. Zero restores the hardware default.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = if max_parallel == 0 {
            default_parallelism()
        } else {
            max_parallel
        };
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Interrupt the batch when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that interrupts this coordinator's batches.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Decide every file without touching the filesystem or network.
    pub fn plan(&self) -> Vec<FilePlan> {
        self.descriptors
            .iter()
            .map(|descriptor| {
                let id = descriptor.name_ext();
                let current = self.oracle.current_version(&id);
                let newest = self.oracle.newest_version(&id);
                let decision = decide(current.as_deref(), newest.as_deref());
                FilePlan {
                    destination: descriptor.locate(&self.download_root),
                    id,
                    current,
                    newest,
                    decision,
                }
            })
            .collect()
    }

    /// Run one batch and report whether any file changed.
    pub async fn run_batch(&self) -> bool {
        self.run_report().await.changed
    }

    /// Run one batch and return the per-file report.
    ///
    /// Never fails: every per-file problem is delivered to the status sink
    /// and recorded in the report.
    pub async fn run_report(&self) -> BatchReport {
        let plans = self.plan();
        self.logger.info(
            "BATCH",
            format!(
                "Updating {} files; parallel={} deadline={}s",
                plans.len(),
                self.max_parallel,
                self.batch_timeout.as_secs_f64()
            ),
        );

        let installer = match self.installer() {
            Ok(installer) => Arc::new(installer),
            Err(err) => return self.abandon(plans, err),
        };

        let now = Instant::now();
        let deadline = now
            .checked_add(self.batch_timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let permits = Arc::new(Semaphore::new(self.max_parallel.max(1)));
        let mut tasks = JoinSet::new();

        for (index, (descriptor, plan)) in self.descriptors.iter().zip(&plans).enumerate() {
            self.logger
                .debug("DECIDE", format!("{} → {}", plan.id, plan.decision));
            let descriptor = Arc::clone(descriptor);
            let decision = plan.decision.clone();
            let installer = Arc::clone(&installer);
            let permits = Arc::clone(&permits);
            let cancel = self.cancel.clone();
            let root = self.download_root.clone();

            tasks.spawn(async move {
                let work = async move {
                    match permits.acquire_owned().await {
                        Ok(_permit) => installer
                            .execute(&*descriptor, &decision, &root)
                            .await
                            .map_err(BatchError::from),
                        Err(_) => Err(BatchError::TaskFailed {
                            reason: "worker pool closed".into(),
                        }),
                    }
                };
                let guarded = AssertUnwindSafe(work).catch_unwind();
                let end = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => TaskEnd::Cancelled,
                    result = timeout_at(deadline, guarded) => match result {
                        Ok(Ok(result)) => TaskEnd::Finished(result),
                        Ok(Err(payload)) => TaskEnd::Finished(Err(BatchError::TaskFailed {
                            reason: panic_reason(payload.as_ref()),
                        })),
                        Err(_) => TaskEnd::TimedOut,
                    },
                };
                (index, end)
            });
        }

        let mut outcomes: Vec<Option<FileOutcome>> = plans.iter().map(|_| None).collect();
        let hard_stop = deadline.checked_add(ABORT_GRACE).unwrap_or(deadline);
        let aborted = self.collect(tasks, &plans, &mut outcomes, hard_stop).await;

        let files: Vec<FileReport> = plans
            .into_iter()
            .zip(outcomes)
            .map(|(plan, outcome)| {
                let outcome = match outcome {
                    Some(outcome) => outcome,
                    None if aborted => {
                        self.sink.handle_error(&BatchError::DeadlineExceeded {
                            id: plan.id.clone(),
                        });
                        FileOutcome::TimedOut
                    }
                    // Only a join error leaves a slot empty, and it was reported.
                    None => FileOutcome::Failed("worker task ended without a result".into()),
                };
                FileReport { plan, outcome }
            })
            .collect();

        let state = batch_state(&files);
        match state {
            BatchState::Interrupted => {
                self.logger.warn("INTERRUPT", "Batch interrupted before completion");
                self.sink.handle_error(&BatchError::Interrupted);
            }
            BatchState::TimedOut => {
                self.logger.warn(
                    "DEADLINE",
                    format!(
                        "Batch deadline of {}s elapsed with unfinished files",
                        self.batch_timeout.as_secs_f64()
                    ),
                );
            }
            BatchState::Completed => {}
        }

        let changed = files.iter().any(|file| file.outcome.changed());
        let report = BatchReport {
            state,
            changed,
            files,
        };
        self.logger.info(
            "SUMMARY",
            format!(
                "files={} failures={} changed={changed}",
                report.files.len(),
                report.failures()
            ),
        );
        self.sink.handle_complete(changed);
        report
    }

    fn installer(&self) -> Result<FileInstaller> {
        let installer = match &self.user_agent {
            Some(agent) => FileInstaller::with_user_agent(self.timeouts, agent)?,
            None => FileInstaller::new(self.timeouts)?,
        };
        Ok(match &self.staging_dir {
            Some(dir) => installer.with_staging_dir(dir.clone()),
            None => installer,
        })
    }

    /// Drain the task group, aborting stragglers once `hard_stop` passes.
    /// Returns true if any task had to be aborted.
    async fn collect(
        &self,
        mut tasks: JoinSet<(usize, TaskEnd)>,
        plans: &[FilePlan],
        outcomes: &mut [Option<FileOutcome>],
        hard_stop: Instant,
    ) -> bool {
        loop {
            match timeout_at(hard_stop, tasks.join_next()).await {
                Ok(Some(joined)) => self.record(joined, plans, outcomes),
                Ok(None) => return false,
                Err(_) => {
                    self.logger.warn(
                        "ABORT",
                        format!("{} tasks outlived the batch deadline; aborting", tasks.len()),
                    );
                    tasks.abort_all();
                    while let Some(joined) = tasks.join_next().await {
                        self.record(joined, plans, outcomes);
                    }
                    return true;
                }
            }
        }
    }

    fn record(
        &self,
        joined: std::result::Result<(usize, TaskEnd), JoinError>,
        plans: &[FilePlan],
        outcomes: &mut [Option<FileOutcome>],
    ) {
        match joined {
            Ok((index, end)) => outcomes[index] = Some(self.settle(&plans[index], end)),
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                let error = BatchError::TaskFailed {
                    reason: err.to_string(),
                };
                self.logger.error("TASK", error.to_string());
                self.sink.handle_error(&error);
            }
        }
    }

    /// Report one task's end to the sink and convert it to an outcome.
    fn settle(&self, plan: &FilePlan, end: TaskEnd) -> FileOutcome {
        match end {
            TaskEnd::Finished(Ok(changed)) => {
                if changed {
                    match &plan.decision {
                        UpdateDecision::Install { version } => {
                            self.sink.file_update(&plan.id, version)
                        }
                        UpdateDecision::Delete => self.sink.file_removed(&plan.id),
                        UpdateDecision::Skip => {}
                    }
                }
                FileOutcome::Changed(changed)
            }
            TaskEnd::Finished(Err(err)) => {
                self.sink.handle_error(&err);
                FileOutcome::Failed(err.to_string())
            }
            TaskEnd::TimedOut => {
                self.sink.handle_error(&BatchError::DeadlineExceeded {
                    id: plan.id.clone(),
                });
                FileOutcome::TimedOut
            }
            TaskEnd::Cancelled => {
                self.sink.handle_error(&BatchError::Cancelled {
                    id: plan.id.clone(),
                });
                FileOutcome::Cancelled
            }
        }
    }

    /// Report a batch that could not start any transfers.
    fn abandon(&self, plans: Vec<FilePlan>, err: UpdaterError) -> BatchReport {
        let reason = err.to_string();
        self.logger.error("BATCH", &reason);
        self.sink.handle_error(&BatchError::TaskFailed {
            reason: reason.clone(),
        });
        let files = plans
            .into_iter()
            .map(|plan| FileReport {
                plan,
                outcome: FileOutcome::Failed(reason.clone()),
            })
            .collect();
        self.sink.handle_complete(false);
        BatchReport {
            state: BatchState::Completed,
            changed: false,
            files,
        }
    }
}

fn batch_state(files: &[FileReport]) -> BatchState {
    if files
        .iter()
        .any(|file| file.outcome == FileOutcome::Cancelled)
    {
        BatchState::Interrupted
    } else if files.iter().any(|file| file.outcome == FileOutcome::TimedOut) {
        BatchState::TimedOut
    } else {
        BatchState::Completed
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("worker panicked: {message}")
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
