/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Self-update engine for Syn-Syu assets. Decides which files
    are stale, downloads replacements concurrently, and swaps
    them into place or removes files that should not exist.

  Security / Safety Notes:
    Operates within user privileges. Performs HTTP(S) GET
    requests and filesystem writes beneath the install root.

  Dependencies:
    tokio, reqwest, tempfile, tokio-util; see module headers.

  Operational Scope:
    Embedded by the Syn-Syu-Update binary and by callers that
    refresh their own files on demand.

  Revision History:
    2025-11-12 COD  Established updater library surface.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling
    - Partial-failure tolerance with full error visibility
============================================================*/

pub mod batch;
pub mod config;
pub mod decision;
pub mod descriptor;
pub mod error;
pub mod installer;
pub mod logger;
pub mod status;
pub mod version;

pub use batch::{
    BatchCoordinator, BatchReport, BatchState, FileOutcome, FilePlan, FileReport,
    DEFAULT_BATCH_TIMEOUT,
};
pub use decision::{decide, UpdateDecision};
pub use descriptor::{FileDescriptor, RemoteFile};
pub use error::{BatchError, InstallError, Result, UpdaterError};
pub use installer::{FileInstaller, FileTimeouts, DEFAULT_FILE_TIMEOUT};
pub use status::{ChannelSink, LogSink, NullStatusSink, StatusSink, UpdateEvent};
pub use version::{VersionOracle, VersionTable};
