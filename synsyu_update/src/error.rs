/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Syu-Update error types: fatal construction
    and configuration failures, per-file install failures, and
    the batch-level errors delivered to status sinks.

  Security / Safety Notes:
    Error contexts carry file identities and local paths only;
    remote URLs are reported without credentials.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Fatal errors propagate to the binary entry point; install
    and batch errors are routed through status sinks and never
    abort a running batch.

  Revision History:
    2024-11-04 COD  Established shared error definitions.
    2025-11-12 COD  Split task-level install and batch errors.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Syu-Update operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;

/// Fatal errors. These abort an operation before any batch starts.
#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("Invalid input: {0}")]
    InputValidation(String),
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
}

impl UpdaterError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            UpdaterError::InputValidation(_) => ExitCode::from(20),
            UpdaterError::Config(_) => ExitCode::from(20),
            UpdaterError::Network(_) => ExitCode::from(30),
            UpdaterError::Serialization(_) => ExitCode::from(31),
            UpdaterError::Filesystem(_) => ExitCode::from(40),
        }
    }
}

/// Failure of a single file's install or delete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("Failed to fetch {id}: {reason}")]
    FetchFailed { id: String, reason: String },
    #[error("Could not delete {id}: {reason}")]
    DeleteFailed { id: String, reason: String },
    #[error("Could not move temp download into place for {id}: {reason}")]
    MoveFailed { id: String, reason: String },
}

impl InstallError {
    /// Identity (`name.ext`) of the file that failed.
    pub fn id(&self) -> &str {
        match self {
            InstallError::FetchFailed { id, .. }
            | InstallError::DeleteFailed { id, .. }
            | InstallError::MoveFailed { id, .. } => id,
        }
    }
}

/// Errors reported to a [`crate::status::StatusSink`] during a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error("{id} did not finish before the batch deadline")]
    DeadlineExceeded { id: String },
    #[error("{id} was cancelled by a batch interruption")]
    Cancelled { id: String },
    #[error("Batch interrupted before completion")]
    Interrupted,
    #[error("Update task failed: {reason}")]
    TaskFailed { reason: String },
}
