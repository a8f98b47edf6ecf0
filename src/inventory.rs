// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Locally installed versions
//!
//! There is no manifest: the install directory itself is the inventory.
//! Callers go through the [`Inventory`] trait so the backing store can
//! change without touching them.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::family::FamilySpec;
use crate::platform::Os;
use crate::version::VersionRef;

/// One installed executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledEntry {
    pub version: VersionRef,
    pub path: PathBuf,
}

/// Source of truth for what is installed
pub trait Inventory {
    /// List every installed version of `family`
    ///
    /// # Errors
    /// Fails when the store cannot be read or holds an entry that is not a
    /// valid version.
    fn scan(&self, family: &FamilySpec) -> Result<Vec<InstalledEntry>>;
}

/// Inventory backed by the install directory
#[derive(Debug, Clone)]
pub struct DirInventory {
    bin_dir: PathBuf,
    os: Os,
}

impl DirInventory {
    #[must_use]
    pub fn new(bin_dir: impl Into<PathBuf>, os: Os) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            os,
        }
    }

    #[must_use]
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }
}

impl Inventory for DirInventory {
    fn scan(&self, family: &FamilySpec) -> Result<Vec<InstalledEntry>> {
        debug!(family = family.name, dir = %self.bin_dir.display(), "scanning installed versions");

        if !self.bin_dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = family.file_prefix();
        let suffix = self.os.exe_suffix();
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.bin_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            if entry.file_type()?.is_dir() {
                continue;
            }

            let raw_version = if suffix.is_empty() {
                rest
            } else {
                rest.strip_suffix(suffix).unwrap_or(rest)
            };

            // A stray file here means the directory is not what we think it is
            let version = VersionRef::parse(raw_version).map_err(|e| match e {
                Error::VersionParse { reason, .. } => Error::VersionParse {
                    input: name.to_string(),
                    reason: format!("unexpected file in {}: {reason}", self.bin_dir.display()),
                },
                other => other,
            })?;

            entries.push(InstalledEntry {
                version,
                path: entry.path(),
            });
        }

        debug!(family = family.name, count = entries.len(), "found local versions");
        Ok(entries)
    }
}
