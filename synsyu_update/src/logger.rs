/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Provide structured, append-only logging for Syn-Syu-Update
    batch runs, shared between the coordinator and the CLI.

  Security / Safety Notes:
    Entries carry file identities and local paths only.

  Dependencies:
    std::fs::File, std::sync::Mutex, sha2 for integrity hashing.

  Operational Scope:
    Used by runtime components to emit RFC-3339 UTC stamped
    log entries and produce session hash digests.

  Revision History:
    2024-11-04 COD  Established logging module for Syn-Syu-Core.
    2025-11-12 COD  Adopted by Syn-Syu-Update; session naming.
    2025-11-19 COD  Streamed digests; single write-failure notice.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Log sink failures never interrupt a batch
============================================================*/

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, UpdaterError};

/// Structured log level for Syn-Syu-Update events.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Warnings and errors always reach the operator's terminal.
    fn is_urgent(self) -> bool {
        matches!(self, LogLevel::Warn | LogLevel::Error)
    }
}

/// Session log file plus a latch so a broken disk is reported once.
struct SessionFile {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    broken: AtomicBool,
}

impl SessionFile {
    fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                UpdaterError::Filesystem(format!(
                    "Failed to create log directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| {
                UpdaterError::Filesystem(format!("Failed to open log file {}: {err}", path.display()))
            })?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            broken: AtomicBool::new(false),
        })
    }

    fn append(&self, line: &str) {
        let written = match self.writer.lock() {
            Ok(mut writer) => writeln!(writer, "{line}").and_then(|()| writer.flush()),
            Err(_) => Err(io::Error::other("log writer poisoned")),
        };
        if let Err(err) = written {
            if !self.broken.swap(true, Ordering::Relaxed) {
                eprintln!(
                    "{}",
                    format_entry(
                        LogLevel::Error,
                        "LOGGER",
                        &format!("Writes to {} failed: {err}", self.path.display())
                    )
                );
            }
        }
    }
}

/// Shared logger for a batch run: stderr always, a session file optionally.
pub struct Logger {
    file: Option<SessionFile>,
    verbose: bool,
}

impl Logger {
    /// Build a logger that writes to stderr and optionally to a file.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let file = path.map(SessionFile::open).transpose()?;
        Ok(Self { file, verbose })
    }

    /// Logger with no backing file. Only warnings and errors reach stderr.
    pub fn stderr() -> Self {
        Self {
            file: None,
            verbose: false,
        }
    }

    /// Session log path inside `dir`, stamped with the current UTC time.
    pub fn session_path(dir: &Path) -> PathBuf {
        let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
        dir.join(format!("update_{stamp}.log"))
    }

    /// Emit a log entry with the given level, code, and message.
    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        let line = format_entry(level, code, message.as_ref());
        if self.verbose || level.is_urgent() {
            eprintln!("{line}");
        }
        if let Some(file) = &self.file {
            file.append(&line);
        }
    }

    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    /// Return the path backing this logger, if any.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path.as_path())
    }

    /// Write `<log>.hash` holding the SHA-256 of the session log, in
    /// `sha256sum` format. Returns the digest path when a log exists.
    pub fn finalize(&self) -> Result<Option<PathBuf>> {
        let Some(path) = self.path() else {
            return Ok(None);
        };
        let hash_path = hash_path_for(path);
        let hashing_failed = |err: io::Error| {
            UpdaterError::Filesystem(format!("Failed to hash log {}: {err}", path.display()))
        };

        let mut source = File::open(path).map_err(hashing_failed)?;
        let mut hasher = Sha256::new();
        io::copy(&mut source, &mut hasher).map_err(hashing_failed)?;
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        std::fs::write(&hash_path, format!("{:x}  {name}\n", hasher.finalize())).map_err(
            |err| {
                UpdaterError::Filesystem(format!(
                    "Failed to write hash file {}: {err}",
                    hash_path.display()
                ))
            },
        )?;
        Ok(Some(hash_path))
    }
}

fn format_entry(level: LogLevel, code: &str, message: &str) -> String {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    format!("{timestamp} [{}] [{code}] {message}", level.as_str())
}

fn hash_path_for(path: &Path) -> PathBuf {
    let mut hash_os = path.as_os_str().to_os_string();
    hash_os.push(".hash");
    PathBuf::from(hash_os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_appended_with_level_and_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("update.log");
        let logger = Logger::new(Some(path.clone()), false).unwrap();
        logger.info("INIT", "batch starting");
        logger.debug("DECIDE", "app.exe -> install 1.2");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] [INIT] batch starting"));
        assert!(lines[1].contains("[DEBUG] [DECIDE]"));
    }

    #[test]
    fn finalize_writes_digest_beside_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.log");
        let logger = Logger::new(Some(path.clone()), false).unwrap();
        logger.info("COMPLETE", "done");
        let hash_path = logger.finalize().unwrap().unwrap();

        assert_eq!(hash_path, dir.path().join("update.log.hash"));
        let digest = std::fs::read_to_string(&hash_path).unwrap();
        let (hex, name) = digest.trim().split_once("  ").unwrap();
        assert_eq!(hex.len(), 64);
        assert_eq!(name, "update.log");
    }

    #[test]
    fn stderr_logger_has_no_path() {
        let logger = Logger::stderr();
        assert!(logger.path().is_none());
        assert_eq!(logger.finalize().unwrap(), None);
    }

    #[test]
    fn entry_carries_utc_stamp_level_and_code() {
        let line = format_entry(LogLevel::Warn, "DEADLINE", "slow.bin unfinished");
        let (stamp, rest) = line.split_once(' ').unwrap();
        assert!(stamp.ends_with('Z'), "{stamp}");
        assert_eq!(rest, "[WARN] [DEADLINE] slow.bin unfinished");
    }

    #[test]
    fn session_path_lives_in_directory() {
        let path = Logger::session_path(Path::new("/var/log/syn"));
        assert_eq!(path.parent(), Some(Path::new("/var/log/syn")));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("update_") && name.ends_with(".log"));
    }
}
