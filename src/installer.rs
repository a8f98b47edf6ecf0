// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Downloading and placing a release's executable
//!
//! The only write to the install directory is the final, no-clobber
//! rename of a fully written temporary file: a failed download or
//! extraction never leaves anything behind at the destination.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

use crate::archive;
use crate::error::{Error, Result};
use crate::family::FamilySpec;
use crate::http::RetryingClient;
use crate::platform::Platform;

/// Something that can make a version of a family available on disk
pub trait Provision {
    /// Install `version` of `family` and return the executable's path
    ///
    /// # Errors
    /// Fails when the version cannot be downloaded or placed
    fn install(&self, family: &FamilySpec, version: &str) -> Result<PathBuf>;
}

/// Downloads release artifacts into the install directory
pub struct Installer {
    client: RetryingClient,
    platform: Platform,
    bin_dir: PathBuf,
}

impl Installer {
    #[must_use]
    pub fn new(client: RetryingClient, platform: Platform, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            platform,
            bin_dir: bin_dir.into(),
        }
    }

    #[must_use]
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Install `version` of `family` using an explicit URL template
    ///
    /// The destination must not exist yet; callers normally check first and
    /// report "already installed" themselves.
    ///
    /// # Errors
    /// - `Error::BinaryNotFound` / `Error::DownloadUnhandled` for bad downloads
    /// - `Error::MissingFromArchive` when a bundle lacks the executable
    /// - `Error::AlreadyInstalled` when the destination appeared meanwhile
    /// - I/O, zip and transport errors as they occur
    pub fn install_from(&self, family: &FamilySpec, version: &str, template: &str) -> Result<PathBuf> {
        let url = family.download_url(template, version, &self.platform);
        info!(family = family.name, version, "downloading binary");
        debug!(url = %url, "downloading binary");

        let body = self.download(&url)?;
        let payload = match family.inner_path(&self.platform) {
            Some(inner) => self.extract(family, &body, &inner)?,
            None => body,
        };

        let path = self.place(family, version, &payload)?;
        info!(path = %path.display(), "binary saved");
        Ok(path)
    }

    /// Fetch an artifact, classifying unsuccessful responses
    ///
    /// # Errors
    /// `Error::BinaryNotFound` on 404, `Error::DownloadUnhandled` on any other
    /// non-200 status, `Error::Transport` when the request itself fails
    pub fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url)?;
        match response.status {
            200 => Ok(response.body),
            404 => Err(Error::BinaryNotFound {
                url: url.to_string(),
            }),
            status => Err(Error::DownloadUnhandled {
                url: url.to_string(),
                status,
                body: response.text(),
            }),
        }
    }

    /// Unpack a bundle in a scratch directory and read the executable out
    fn extract(&self, family: &FamilySpec, bundle: &[u8], inner: &Path) -> Result<Vec<u8>> {
        let kind = family
            .archive_kind(self.platform.os)
            .ok_or_else(|| Error::UnsupportedArchive(format!("{} ships no bundle", family.name)))?;

        // Removed on drop, whatever happens below
        let scratch: TempDir = tempfile::Builder::new()
            .prefix(&format!("{}-", family.name))
            .tempdir()?;
        debug!(path = %scratch.path().display(), "created temp dir");

        let archive_path = scratch
            .path()
            .join(format!("{}{}", family.name, kind.extension()));
        fs::write(&archive_path, bundle)?;

        let extracted = scratch.path().join("extracted");
        fs::create_dir_all(&extracted)?;
        archive::unpack(&archive_path, kind, &extracted)?;

        let executable = extracted.join(inner);
        match fs::read(&executable) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::MissingFromArchive(inner.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the executable to its final location without clobbering
    fn place(&self, family: &FamilySpec, version: &str, payload: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.bin_dir)?;
        let destination = family.install_path(&self.bin_dir, version, self.platform.os);
        if destination.exists() {
            return Err(Error::AlreadyInstalled {
                version: version.to_string(),
                path: destination,
            });
        }

        let mut staged = NamedTempFile::new_in(&self.bin_dir)?;
        staged.write_all(payload)?;
        staged.flush()?;
        set_executable(staged.path())?;

        match staged.persist_noclobber(&destination) {
            Ok(_) => Ok(destination),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Err(Error::AlreadyInstalled {
                version: version.to_string(),
                path: destination,
            }),
            Err(e) => Err(e.error.into()),
        }
    }
}

impl Provision for Installer {
    fn install(&self, family: &FamilySpec, version: &str) -> Result<PathBuf> {
        self.install_from(family, version, family.download_template)
    }
}

/// Owner read/write/execute, group read/execute
#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o750))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
