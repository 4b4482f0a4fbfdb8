/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::version
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Provide current/newest version information for updatable
    files, keyed by their `name.ext` identity.

  Security / Safety Notes:
    Pure in-memory lookups; no I/O performed in this module.

  Dependencies:
    None beyond std.

  Operational Scope:
    Queried by the batch coordinator once per file per batch.

  Revision History:
    2025-11-12 COD  Introduced VersionOracle and VersionTable.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Versions are opaque strings compared by value
============================================================*/

use std::collections::HashMap;

/// Source of truth for installed and available versions.
///
/// Versions are opaque strings; a checksum works as well as a semver.
/// Implementations are queried from the coordinator while workers run and
/// must be safe to share across threads.
pub trait VersionOracle: Send + Sync {
    /// Installed version, or `None` if the file is not installed.
    fn current_version(&self, id: &str) -> Option<String>;

    /// Newest available version, or `None` if the file should not exist.
    fn newest_version(&self, id: &str) -> Option<String>;
}

/// In-memory [`VersionOracle`] populated before a batch runs.
#[derive(Debug, Clone, Default)]
pub struct VersionTable {
    current: HashMap<String, String>,
    newest: HashMap<String, String>,
}

impl VersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the installed version of `id`.
    pub fn add_current_version(&mut self, id: impl Into<String>, version: impl Into<String>) {
        self.current.insert(id.into(), version.into());
    }

    /// Record the newest available version of `id`.
    pub fn add_newest_version(&mut self, id: impl Into<String>, version: impl Into<String>) {
        self.newest.insert(id.into(), version.into());
    }
}

impl VersionOracle for VersionTable {
    fn current_version(&self, id: &str) -> Option<String> {
        self.current.get(id).cloned()
    }

    fn newest_version(&self, id: &str) -> Option<String> {
        self.newest.get(id).cloned()
    }
}
