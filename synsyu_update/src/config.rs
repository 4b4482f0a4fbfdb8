/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load Syn-Syu-Update configuration: install locations,
    transfer timeouts, and the list of managed files with their
    current and newest versions.

  Security / Safety Notes:
    Reads operator-controlled TOML only; no secrets expected.

  Dependencies:
    serde + toml for parsing, dirs for XDG locations.

  Operational Scope:
    Consumed by the binary entry point to build descriptors,
    the version table, and the batch coordinator.

  Revision History:
    2025-11-12 COD  Authored updater configuration loader.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Sensible defaults with explicit overrides
    - Errors name the offending file and field
============================================================*/

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::descriptor::{combine_name_ext, FileDescriptor, RemoteFile};
use crate::error::{Result, UpdaterError};
use crate::version::VersionTable;

const APP_DIR: &str = "syn-syu";
const CONFIG_FILE: &str = "updater.toml";

/// Top-level updater configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterConfig {
    pub updater: UpdaterSection,
    pub files: Vec<FileEntry>,
}

/// `[updater]` settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterSection {
    pub download_root: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub batch_timeout_secs: u64,
    /// Zero selects the available hardware parallelism.
    pub max_parallel: usize,
    pub user_agent: Option<String>,
}

impl Default for UpdaterSection {
    fn default() -> Self {
        Self {
            download_root: None,
            staging_dir: None,
            log_dir: None,
            connect_timeout_ms: 3000,
            read_timeout_ms: 3000,
            batch_timeout_secs: 600,
            max_parallel: 0,
            user_agent: None,
        }
    }
}

/// One `[[files]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub name: String,
    pub ext: String,
    pub url: String,
    #[serde(default)]
    pub subdir: Option<PathBuf>,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub newest: Option<String>,
}

impl UpdaterConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load and parse the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            UpdaterError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|err| UpdaterError::Config(format!("{}: {err}", path.display())))
    }

    /// Parse a TOML document.
    pub fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Directory files are installed beneath.
    pub fn download_root(&self) -> PathBuf {
        self.updater
            .download_root
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| data_dir().join("assets"))
    }

    pub fn staging_dir(&self) -> Option<PathBuf> {
        self.updater.staging_dir.as_deref().map(expand_home)
    }

    /// Directory session logs are written to.
    pub fn log_dir(&self) -> PathBuf {
        self.updater
            .log_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| {
                dirs::state_dir()
                    .map(|dir| dir.join(APP_DIR))
                    .unwrap_or_else(data_dir)
                    .join("logs")
            })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.updater.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.updater.read_timeout_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.updater.batch_timeout_secs)
    }

    /// Build validated descriptors for every `[[files]]` entry.
    pub fn descriptors(&self) -> Result<Vec<Arc<dyn FileDescriptor>>> {
        self.files
            .iter()
            .map(|entry| {
                let file = RemoteFile::new(entry.name.as_str(), entry.ext.as_str(), &entry.url)?;
                let file = match &entry.subdir {
                    Some(subdir) => file.with_subdir(subdir.clone())?,
                    None => file,
                };
                Ok(Arc::new(file) as Arc<dyn FileDescriptor>)
            })
            .collect()
    }

    /// Version table holding every recorded current and newest version.
    pub fn version_table(&self) -> VersionTable {
        let mut table = VersionTable::new();
        for entry in &self.files {
            let id = combine_name_ext(&entry.name, &entry.ext);
            if let Some(current) = &entry.current {
                table.add_current_version(id.clone(), current.clone());
            }
            if let Some(newest) = &entry.newest {
                table.add_newest_version(id, newest.clone());
            }
        }
        table
    }
}

/// Default configuration file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionOracle;

    const SAMPLE: &str = r#"
[updater]
download_root = "/opt/syn/assets"
connect_timeout_ms = 1500
batch_timeout_secs = 30
max_parallel = 4

[[files]]
name = "app"
ext = "exe"
url = "https://updates.example.com/app.exe"
current = "1.0"
newest = "1.2"

[[files]]
name = "legacy"
ext = "dll"
url = "https://updates.example.com/legacy.dll"
subdir = "lib"
current = "0.9"
"#;

    #[test]
    fn parses_sections_and_defaults() {
        let config = UpdaterConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.download_root(), PathBuf::from("/opt/syn/assets"));
        assert_eq!(config.connect_timeout(), Duration::from_millis(1500));
        assert_eq!(config.read_timeout(), Duration::from_millis(3000));
        assert_eq!(config.batch_timeout(), Duration::from_secs(30));
        assert_eq!(config.updater.max_parallel, 4);
        assert_eq!(config.files.len(), 2);
    }

    #[test]
    fn builds_descriptors_and_versions() {
        let config = UpdaterConfig::parse(SAMPLE).unwrap();
        let descriptors = config.descriptors().unwrap();
        assert_eq!(descriptors[0].name_ext(), "app.exe");
        assert_eq!(
            descriptors[1].locate(Path::new("/root")),
            PathBuf::from("/root/lib/legacy.dll")
        );

        let table = config.version_table();
        assert_eq!(table.newest_version("app.exe").as_deref(), Some("1.2"));
        assert_eq!(table.current_version("legacy.dll").as_deref(), Some("0.9"));
        assert_eq!(table.newest_version("legacy.dll"), None);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = UpdaterConfig::parse("").unwrap();
        assert!(config.files.is_empty());
        assert_eq!(config.batch_timeout(), Duration::from_secs(600));
        assert_eq!(config.updater.connect_timeout_ms, 3000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(UpdaterConfig::parse("[updater]\nretries = 3\n").is_err());
    }

    #[test]
    fn invalid_entry_fails_descriptor_validation() {
        let config =
            UpdaterConfig::parse("[[files]]\nname = \"\"\next = \"exe\"\nurl = \"https://a/b\"\n")
                .unwrap();
        assert!(matches!(
            config.descriptors(),
            Err(UpdaterError::InputValidation(_))
        ));
    }

    #[test]
    fn missing_explicit_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = UpdaterConfig::load_from_optional_path(Some(&dir.path().join("nope.toml")))
            .unwrap_err();
        assert!(matches!(err, UpdaterError::Config(_)));
    }

    #[test]
    fn home_prefix_is_expanded() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/assets")), home.join("assets"));
        }
        assert_eq!(expand_home(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
