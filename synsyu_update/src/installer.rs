/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::installer
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Apply one update decision to the filesystem: download the
    newest file to a private temp file and move it into place,
    or remove a file that should no longer exist.

  Security / Safety Notes:
    Performs HTTP(S) GET requests only. Downloads are staged in
    temp files and never written to the destination path directly.
    Replacements keep the permissions of the file they replace.

  Dependencies:
    reqwest for HTTP, tempfile for staging, tokio::fs for I/O.

  Operational Scope:
    Executed once per descriptor inside a batch worker task.

  Revision History:
    2025-11-12 COD  Implemented staged download and replace.
    2025-11-19 COD  Preserve file modes; rename off the async workers.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Staged writes with atomic final rename
    - Temp files removed on every failure path
    - Configurable connect and read timeouts
============================================================*/

use std::fs::{Metadata, Permissions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::decision::UpdateDecision;
use crate::descriptor::FileDescriptor;
use crate::error::{InstallError, Result, UpdaterError};

/// Default connect and read timeout for a single file.
pub const DEFAULT_FILE_TIMEOUT: Duration = Duration::from_millis(3000);

const USER_AGENT: &str = concat!("Syn-Syu-Update/", env!("CARGO_PKG_VERSION"), " (linux)");

/// Per-connection timeouts for one file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimeouts {
    /// Bound on establishing the connection.
    pub connect: Duration,
    /// Bound on each body chunk. Waiting for the response headers is
    /// bounded by `connect + read`, since the request covers both.
    pub read: Duration,
}

impl Default for FileTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_FILE_TIMEOUT,
            read: DEFAULT_FILE_TIMEOUT,
        }
    }
}

/// Executes update decisions against an install root.
#[derive(Clone)]
pub struct FileInstaller {
    client: reqwest::Client,
    connect_timeout: Duration,
    read_timeout: Duration,
    staging_dir: Option<PathBuf>,
}

impl FileInstaller {
    /// Construct an installer with the given transfer timeouts.
    pub fn new(timeouts: FileTimeouts) -> Result<Self> {
        Self::with_user_agent(timeouts, USER_AGENT)
    }

    /// Construct an installer that identifies itself as `user_agent`.
    pub fn with_user_agent(timeouts: FileTimeouts, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .user_agent(user_agent)
            .build()
            .map_err(|err| UpdaterError::Network(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            connect_timeout: timeouts.connect,
            read_timeout: timeouts.read,
            staging_dir: None,
        })
    }

    /// Stage downloads in `dir` instead of beside their destination.
    ///
    /// The final move is only atomic when `dir` shares a filesystem with
    /// the install root.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Apply `decision` to `descriptor` beneath `root`.
    ///
    /// Returns whether the filesystem changed.
    pub async fn execute(
        &self,
        descriptor: &dyn FileDescriptor,
        decision: &UpdateDecision,
        root: &Path,
    ) -> std::result::Result<bool, InstallError> {
        match decision {
            UpdateDecision::Skip => Ok(false),
            UpdateDecision::Delete => {
                let destination = descriptor.locate(root);
                remove_installed(&descriptor.name_ext(), &destination).await
            }
            UpdateDecision::Install { .. } => {
                let destination = descriptor.locate(root);
                self.install(descriptor, &destination).await
            }
        }
    }

    async fn install(
        &self,
        descriptor: &dyn FileDescriptor,
        destination: &Path,
    ) -> std::result::Result<bool, InstallError> {
        let id = descriptor.name_ext();
        let staged = self.fetch_to_temp(descriptor, &id, destination).await?;
        let move_failed = |reason: String| InstallError::MoveFailed {
            id: id.clone(),
            reason,
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| move_failed(format!("cannot create {}: {err}", parent.display())))?;
        }

        if let Some(existing) = installed_metadata(&id, destination).await? {
            // The replacement inherits the mode of the file it replaces.
            tokio::fs::set_permissions(&*staged, existing.permissions())
                .await
                .map_err(|err| {
                    move_failed(format!("cannot copy permissions of {}: {err}", destination.display()))
                })?;
            tokio::fs::remove_file(destination)
                .await
                .map_err(|err| InstallError::DeleteFailed {
                    id: id.clone(),
                    reason: format!("{}: {err}", destination.display()),
                })?;
        }

        // On failure the returned error owns the temp path and removes it on drop.
        let target = destination.to_path_buf();
        tokio::task::spawn_blocking(move || staged.persist(&target))
            .await
            .map_err(|err| move_failed(format!("rename task failed: {err}")))?
            .map_err(|err| move_failed(format!("{}: {}", destination.display(), err.error)))?;
        Ok(true)
    }

    async fn fetch_to_temp(
        &self,
        descriptor: &dyn FileDescriptor,
        id: &str,
        destination: &Path,
    ) -> std::result::Result<TempPath, InstallError> {
        let fetch_failed = |reason: String| InstallError::FetchFailed {
            id: id.to_string(),
            reason,
        };
        let url = descriptor.url();
        let read_ms = self.read_timeout.as_millis();
        let send_timeout = self.connect_timeout.saturating_add(self.read_timeout);

        let mut response = timeout(send_timeout, self.client.get(url.clone()).send())
            .await
            .map_err(|_| {
                let send_ms = send_timeout.as_millis();
                fetch_failed(format!("no response from {url} within {send_ms} ms"))
            })?
            .map_err(|err| fetch_failed(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("{url} responded with {status}")));
        }

        let staging = self.staging_root(destination);
        tokio::fs::create_dir_all(&staging).await.map_err(|err| {
            fetch_failed(format!("cannot create staging directory {}: {err}", staging.display()))
        })?;
        let prefix = format!(".{}-", descriptor.name());
        let suffix = format!(".{}.part", descriptor.ext());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(&suffix);
        if let Some(mode) = fresh_file_permissions() {
            builder.permissions(mode);
        }
        let temp = builder
            .tempfile_in(&staging)
            .map_err(|err| {
                fetch_failed(format!("cannot create temp file in {}: {err}", staging.display()))
            })?;
        let (file, staged) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        loop {
            let chunk = timeout(self.read_timeout, response.chunk())
                .await
                .map_err(|_| fetch_failed(format!("read from {url} stalled for {read_ms} ms")))?
                .map_err(|err| fetch_failed(format!("read from {url} failed: {err}")))?;
            let Some(bytes) = chunk else {
                break;
            };
            file.write_all(&bytes)
                .await
                .map_err(|err| fetch_failed(format!("write to temp file failed: {err}")))?;
        }
        file.flush()
            .await
            .map_err(|err| fetch_failed(format!("flush of temp file failed: {err}")))?;
        file.sync_all()
            .await
            .map_err(|err| fetch_failed(format!("sync of temp file failed: {err}")))?;

        Ok(staged)
    }

    fn staging_root(&self, destination: &Path) -> PathBuf {
        self.staging_dir
            .clone()
            .or_else(|| destination.parent().map(Path::to_path_buf))
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Mode for a file installed where none existed: `0o666`, narrowed by the
/// process umask when the temp file is opened.
#[cfg(unix)]
fn fresh_file_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn fresh_file_permissions() -> Option<Permissions> {
    None
}

/// Metadata of the installed file, `None` when nothing is installed.
async fn installed_metadata(
    id: &str,
    destination: &Path,
) -> std::result::Result<Option<Metadata>, InstallError> {
    match tokio::fs::metadata(destination).await {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(InstallError::DeleteFailed {
            id: id.to_string(),
            reason: format!("cannot inspect {}: {err}", destination.display()),
        }),
    }
}

/// Remove an installed file. A missing file counts as a failed delete.
async fn remove_installed(id: &str, destination: &Path) -> std::result::Result<bool, InstallError> {
    if installed_metadata(id, destination).await?.is_none() {
        return Err(InstallError::DeleteFailed {
            id: id.to_string(),
            reason: format!("{} does not exist", destination.display()),
        });
    }
    tokio::fs::remove_file(destination)
        .await
        .map_err(|err| InstallError::DeleteFailed {
            id: id.to_string(),
            reason: format!("{}: {err}", destination.display()),
        })?;
    Ok(true)
}
