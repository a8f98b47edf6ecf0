// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Run-time version resolution and hand-off to the real binary
//!
//! Resolution order for a family:
//! 1. a local pin (`.<family>_version`) in the working directory
//! 2. the global pin (`<bin_dir>/.<family>-version`), created as `auto`
//!    when missing
//! 3. for an `auto` pin, the version a live cluster reports, installed on
//!    demand

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::family::{FamilySpec, KUBECTL};
use crate::installer::Provision;
use crate::inventory::Inventory;
use crate::platform::Os;
use crate::version::{VersionRef, extract_version_number, normalize_input};

/// Pin value asking for the version to be derived from context
pub const AUTO: &str = "auto";

/// Where the effective pin came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinSource {
    Local(PathBuf),
    Global(PathBuf),
}

impl PinSource {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Local(path) | Self::Global(path) => path,
        }
    }
}

/// A pin value together with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    pub value: String,
    pub source: PinSource,
}

impl Pin {
    #[must_use]
    pub fn is_auto(&self) -> bool {
        self.value == AUTO
    }
}

/// Outcome of resolution: a concrete version and where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub version: String,
    pub path: PathBuf,
}

/// Read a pin file, trimmed
///
/// # Errors
/// Returns an I/O error when unreadable, `Error::VersionParse` when empty
pub fn read_pin(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)?;
    let value = raw.trim();
    if value.is_empty() {
        return Err(Error::VersionParse {
            input: String::new(),
            reason: format!("empty pin file {}", path.display()),
        });
    }
    Ok(value.to_string())
}

/// Write a pin file, creating its directory
///
/// # Errors
/// Returns an I/O error when the file cannot be written
pub fn write_pin(path: &Path, value: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{}\n", value.trim()))?;
    Ok(())
}

/// Source of the version a cluster runs, for `auto` pins
pub trait ClusterVersion {
    /// Server version as `major.minor.patch`
    ///
    /// # Errors
    /// Fails when no cluster can be reached
    fn server_version(&self) -> Result<String>;
}

/// Replaces or spawns the resolved binary
pub trait Executor {
    /// Run `program` with `args` and exactly `env`, returning its exit code
    ///
    /// # Errors
    /// Fails when the program cannot be started
    fn execute(&self, program: &Path, args: &[OsString], env: &[(OsString, OsString)]) -> Result<i32>;
}

/// Executes the real process: `exec` on Unix, spawn-and-wait elsewhere
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    #[cfg(unix)]
    fn execute(&self, program: &Path, args: &[OsString], env: &[(OsString, OsString)]) -> Result<i32> {
        use std::os::unix::process::CommandExt;

        // Only returns on failure; stdio is inherited
        let err = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k, v)))
            .exec();
        Err(err.into())
    }

    #[cfg(not(unix))]
    fn execute(&self, program: &Path, args: &[OsString], env: &[(OsString, OsString)]) -> Result<i32> {
        let status = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k, v)))
            .status()?;
        Ok(status.code().unwrap_or(1))
    }
}

/// Asks the cluster for its version using the newest installed kubectl
pub struct KubectlProbe<I> {
    inventory: I,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KubectlVersionOutput {
    server_version: Option<ServerVersionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerVersionInfo {
    git_version: String,
}

impl<I: Inventory> KubectlProbe<I> {
    pub fn new(inventory: I) -> Self {
        Self { inventory }
    }
}

impl<I: Inventory> ClusterVersion for KubectlProbe<I> {
    fn server_version(&self) -> Result<String> {
        let newest = self
            .inventory
            .scan(&KUBECTL)?
            .into_iter()
            .max_by(|a, b| a.version.cmp(&b.version))
            .ok_or_else(|| {
                Error::ClusterVersion(
                    "no kubectl is installed to query the cluster with; run 'kbenv install <VERSION>' first"
                        .to_string(),
                )
            })?;

        debug!(path = %newest.path.display(), "querying server version");
        let output = Command::new(&newest.path)
            .args(["version", "--output=json"])
            .output()
            .map_err(|e| Error::ClusterVersion(format!("failed to run {}: {e}", newest.path.display())))?;

        // kubectl exits non-zero without a cluster but still prints JSON
        let parsed: KubectlVersionOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
            Error::ClusterVersion(format!(
                "unexpected output from kubectl ({e}): {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        })?;

        let git_version = parsed.server_version.map(|s| s.git_version).ok_or_else(|| {
            Error::ClusterVersion(String::from_utf8_lossy(&output.stderr).trim().to_string())
        })?;

        parse_server_version(&git_version)
    }
}

/// Reduce a server `gitVersion` such as `v1.29.4-eks-036c24b` to `1.29.4`
///
/// # Errors
/// Returns `Error::ClusterVersion` when no version can be read
pub fn parse_server_version(git_version: &str) -> Result<String> {
    let number = extract_version_number(git_version);
    VersionRef::parse(number)
        .map(|v| v.to_string())
        .map_err(|e| Error::ClusterVersion(format!("'{git_version}': {e}")))
}

/// Decides which installed version of a family to run
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    family: &'a FamilySpec,
    bin_dir: PathBuf,
    os: Os,
    cwd: PathBuf,
}

impl<'a> Resolver<'a> {
    pub fn new(family: &'a FamilySpec, bin_dir: impl Into<PathBuf>, os: Os, cwd: impl Into<PathBuf>) -> Self {
        Self {
            family,
            bin_dir: bin_dir.into(),
            os,
            cwd: cwd.into(),
        }
    }

    #[must_use]
    pub fn family(&self) -> &FamilySpec {
        self.family
    }

    /// The effective pin: local if present, else global (created as `auto`)
    ///
    /// # Errors
    /// Returns I/O errors from reading or creating pin files
    pub fn pin(&self) -> Result<Pin> {
        let local = self.family.local_pin_path(&self.cwd);
        if local.is_file() {
            debug!(path = %local.display(), "using local pin");
            return Ok(Pin {
                value: read_pin(&local)?,
                source: PinSource::Local(local),
            });
        }

        let global = self.family.global_pin_path(&self.bin_dir);
        if !global.exists() {
            info!(path = %global.display(), "creating default pin");
            write_pin(&global, AUTO)?;
        }
        Ok(Pin {
            value: read_pin(&global)?,
            source: PinSource::Global(global),
        })
    }

    /// Install location of `version`
    #[must_use]
    pub fn path_for(&self, version: &str) -> PathBuf {
        self.family.install_path(&self.bin_dir, version, self.os)
    }

    /// Resolve the pin to a concrete version, installing it for `auto`
    ///
    /// # Errors
    /// - `Error::AutoUnsupported` for an `auto` pin on a family without a
    ///   cluster-derived version
    /// - cluster and installation errors from the `auto` path
    pub fn resolve(&self, cluster: &dyn ClusterVersion, provisioner: &dyn Provision) -> Result<Resolution> {
        let pin = self.pin()?;
        if !pin.is_auto() {
            let version = normalize_input(&pin.value).to_string();
            return Ok(Resolution {
                path: self.path_for(&version),
                version,
            });
        }

        if !self.family.auto_version {
            return Err(Error::AutoUnsupported(self.family.name.to_string()));
        }

        let version = cluster.server_version()?;
        let path = self.path_for(&version);
        debug!(version = %version, "cluster version resolved");
        if !path.exists() {
            info!(family = self.family.name, version = %version, "installing version used by the cluster");
            match provisioner.install(self.family, &version) {
                Ok(_) | Err(Error::AlreadyInstalled { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(Resolution { version, path })
    }
}

/// Resolves a family's version and runs it with the caller's arguments
pub struct Wrapper<'a> {
    pub resolver: Resolver<'a>,
    pub cluster: &'a dyn ClusterVersion,
    pub provisioner: &'a dyn Provision,
    pub executor: &'a dyn Executor,
}

impl Wrapper<'_> {
    /// Resolve and execute, returning the child's exit code
    ///
    /// # Errors
    /// `Error::NotInstalled` when the resolved binary does not exist, plus
    /// any resolution or execution error
    pub fn run(&self, args: &[OsString], env: &[(OsString, OsString)]) -> Result<i32> {
        let resolution = self.resolver.resolve(self.cluster, self.provisioner)?;
        match fs::metadata(&resolution.path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(Error::NotInstalled {
                    version: resolution.version,
                    path: resolution.path,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotInstalled {
                    version: resolution.version,
                    path: resolution.path,
                });
            }
            Err(e) => return Err(e.into()),
        }

        debug!(path = %resolution.path.display(), "executing");
        self.executor.execute(&resolution.path, args, env)
    }
}
