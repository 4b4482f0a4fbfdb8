/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::decision
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Classify one file as skip, install, or delete from its
    current and newest version strings.

  Security / Safety Notes:
    Pure function; never touches the filesystem or network.

  Dependencies:
    serde for report serialization.

  Operational Scope:
    Evaluated by the batch coordinator for every descriptor.

  Revision History:
    2025-11-12 COD  Authored update decision logic.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Total, deterministic classification
============================================================*/

use std::fmt;

use serde::Serialize;

/// What a batch should do with one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum UpdateDecision {
    /// Installed version already matches the newest.
    Skip,
    /// Download `version` and replace whatever is installed.
    Install { version: String },
    /// The file should no longer exist.
    Delete,
}

impl fmt::Display for UpdateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateDecision::Skip => f.write_str("skip"),
            UpdateDecision::Install { version } => write!(f, "install {version}"),
            UpdateDecision::Delete => f.write_str("delete"),
        }
    }
}

/// Classify a file from its installed and newest versions.
///
/// Equal versions (both absent included) skip; an absent newest version
/// deletes; anything else installs the newest.
pub fn decide(current: Option<&str>, newest: Option<&str>) -> UpdateDecision {
    if current == newest {
        return UpdateDecision::Skip;
    }
    match newest {
        None => UpdateDecision::Delete,
        Some(version) => UpdateDecision::Install {
            version: version.to_string(),
        },
    }
}
