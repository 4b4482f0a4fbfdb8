/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_update::descriptor
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Describe updatable files: logical name, extension, remote
    source URL, and where the file lands under an install root.

  Security / Safety Notes:
    Pure data container; no I/O performed in this module.
    Names are validated so a descriptor cannot escape its root
    through path separators.

  Dependencies:
    reqwest::Url for validated remote locations.

  Operational Scope:
    Supplied to the batch coordinator; the identity key drives
    version lookups and status reporting.

  Revision History:
    2025-11-12 COD  Introduced FileDescriptor contract.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Validation at construction, never at use
============================================================*/

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Url;

use crate::error::{Result, UpdaterError};

/// Identity and location of one updatable file.
///
/// Implementations are shared across worker tasks and must be immutable.
pub trait FileDescriptor: Send + Sync {
    /// File name without extension.
    fn name(&self) -> &str;

    /// File extension without the leading period.
    fn ext(&self) -> &str;

    /// Remote location the newest version is downloaded from.
    fn url(&self) -> &Url;

    /// Final on-disk path of the file beneath `root`.
    fn locate(&self, root: &Path) -> PathBuf;

    /// Identity key for version lookups: `name.ext`.
    fn name_ext(&self) -> String {
        combine_name_ext(self.name(), self.ext())
    }
}

/// Join a file name and extension with a period.
pub fn combine_name_ext(name: &str, ext: &str) -> String {
    format!("{name}.{ext}")
}

/// Default [`FileDescriptor`] holding every value it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    name: String,
    ext: String,
    url: Url,
    subdir: Option<PathBuf>,
}

impl RemoteFile {
    /// Build a descriptor, rejecting empty fields and unparsable URLs.
    pub fn new(name: impl Into<String>, ext: impl Into<String>, url: &str) -> Result<Self> {
        let name = name.into();
        let ext = ext.into();
        validate_component("name", &name)?;
        validate_component("extension", &ext)?;
        if url.trim().is_empty() {
            return Err(UpdaterError::InputValidation(format!(
                "{}: url cannot be empty",
                combine_name_ext(&name, &ext)
            )));
        }
        let url = Url::parse(url).map_err(|err| {
            UpdaterError::InputValidation(format!(
                "{}: invalid url `{url}`: {err}",
                combine_name_ext(&name, &ext)
            ))
        })?;
        Ok(Self::from_url(name, ext, url))
    }

    fn from_url(name: String, ext: String, url: Url) -> Self {
        Self {
            name,
            ext,
            url,
            subdir: None,
        }
    }

    /// Place the file in a relative subdirectory of the install root.
    pub fn with_subdir(mut self, subdir: impl Into<PathBuf>) -> Result<Self> {
        let subdir = subdir.into();
        if subdir.is_absolute()
            || subdir
                .components()
                .any(|component| matches!(component, std::path::Component::ParentDir))
        {
            return Err(UpdaterError::InputValidation(format!(
                "{}: subdirectory {} must be relative to the install root",
                self.name_ext(),
                subdir.display()
            )));
        }
        self.subdir = Some(subdir);
        Ok(self)
    }
}

impl FileDescriptor for RemoteFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn ext(&self) -> &str {
        &self.ext
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn locate(&self, root: &Path) -> PathBuf {
        match &self.subdir {
            Some(subdir) => root.join(subdir).join(self.name_ext()),
            None => root.join(self.name_ext()),
        }
    }
}

impl fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.name_ext(), self.url)
    }
}

fn validate_component(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(UpdaterError::InputValidation(format!(
            "file {field} cannot be empty"
        )));
    }
    if value.contains(['/', '\\']) {
        return Err(UpdaterError::InputValidation(format!(
            "file {field} `{value}` cannot contain path separators"
        )));
    }
    Ok(())
}
