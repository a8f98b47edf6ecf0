// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Platform detection for client binaries
//!
//! Upstream artifacts are published per operating system and CPU
//! architecture using the Go naming convention (`linux`, `darwin`,
//! `windows` / `amd64`, `arm64`, `arm`). This module maps the Rust
//! runtime identifiers onto those names and rejects anything else.

use std::fmt;

use crate::error::{Error, Result};

/// Operating systems that upstream projects publish clients for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Darwin,
    Windows,
}

impl Os {
    /// Name used in download URLs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
        }
    }

    /// Suffix carried by executables on this OS
    #[must_use]
    pub fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux | Self::Darwin => "",
        }
    }

    /// Parse a Rust (`std::env::consts::OS`) or Go style OS name
    ///
    /// # Errors
    /// Returns `Error::UnsupportedOs` carrying the offending value
    pub fn parse(os: &str) -> Result<Self> {
        match os {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" => Ok(Self::Darwin),
            "windows" => Ok(Self::Windows),
            other => Err(Error::UnsupportedOs(other.to_string())),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architectures that upstream projects publish clients for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
    Arm,
}

impl Arch {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::Arm => "arm",
        }
    }

    /// Parse a Rust (`std::env::consts::ARCH`) or Go style architecture name
    ///
    /// # Errors
    /// Returns `Error::UnsupportedArch` carrying the offending value
    pub fn parse(arch: &str) -> Result<Self> {
        match arch {
            "x86_64" | "amd64" => Ok(Self::Amd64),
            "aarch64" | "arm64" => Ok(Self::Arm64),
            "arm" => Ok(Self::Arm),
            other => Err(Error::UnsupportedArch(other.to_string())),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target platform of an installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    #[must_use]
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detect the platform this process runs on
    ///
    /// Unlike a best-effort guess, an unknown OS or architecture is an error:
    /// there is no artifact that could be downloaded for it.
    ///
    /// # Errors
    /// Returns `Error::UnsupportedOs` or `Error::UnsupportedArch`
    pub fn detect() -> Result<Self> {
        Self::from_names(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Build a platform from OS and architecture names
    ///
    /// # Errors
    /// Returns `Error::UnsupportedOs` or `Error::UnsupportedArch`
    pub fn from_names(os: &str, arch: &str) -> Result<Self> {
        Ok(Self {
            os: Os::parse(os)?,
            arch: Arch::parse(arch)?,
        })
    }

    /// Executable suffix for this platform (`.exe` on Windows)
    #[must_use]
    pub fn exe_suffix(&self) -> &'static str {
        self.os.exe_suffix()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
