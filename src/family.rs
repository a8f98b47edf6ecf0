// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Binary families and their packaging quirks
//!
//! Every upstream project names and packages its clients differently. All of
//! those differences live in the [`FAMILIES`] table; adding a new client
//! means adding one entry here.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::platform::{Os, Platform};

/// How an upstream release ships its executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
    /// A bare executable, `.exe` appended on Windows
    Raw,
    /// A `.zip` on Windows or `.tar.gz` elsewhere, holding the executable at
    /// `inner_path` (a template with `{os}` and `{arch}` slots, without the
    /// `.exe` suffix)
    Bundle { inner_path: &'static str },
}

/// Container format of a downloaded bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Archive format a bundle uses on the given OS
    #[must_use]
    pub fn for_os(os: Os) -> Self {
        match os {
            Os::Windows => Self::Zip,
            Os::Linux | Os::Darwin => Self::TarGz,
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::TarGz => ".tar.gz",
        }
    }
}

/// Declarative description of one managed binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySpec {
    /// Executable name, also the wrapper command name (e.g. "kubectl")
    pub name: &'static str,
    /// Name of the manager command for this family (e.g. "kbenv")
    pub manager: &'static str,
    /// Download URL with `{version}`, `{os}` and `{arch}` slots, without
    /// the archive or executable extension
    pub download_template: &'static str,
    /// Paginated release index; the page number is appended
    pub releases_endpoint: &'static str,
    /// Family-specific names for operating systems
    pub os_aliases: &'static [(Os, &'static str)],
    pub packaging: Packaging,
    /// Whether `auto` can derive the version from a live cluster
    pub auto_version: bool,
}

pub const KUBECTL: FamilySpec = FamilySpec {
    name: "kubectl",
    manager: "kbenv",
    download_template: "https://dl.k8s.io/release/v{version}/bin/{os}/{arch}/kubectl",
    releases_endpoint: "https://api.github.com/repos/kubernetes/kubernetes/releases?page=",
    os_aliases: &[],
    packaging: Packaging::Raw,
    auto_version: true,
};

pub const HELM: FamilySpec = FamilySpec {
    name: "helm",
    manager: "helmenv",
    download_template: "https://get.helm.sh/helm-v{version}-{os}-{arch}",
    releases_endpoint: "https://api.github.com/repos/helm/helm/releases?page=",
    os_aliases: &[],
    packaging: Packaging::Bundle {
        inner_path: "{os}-{arch}/helm",
    },
    auto_version: false,
};

/// OKD ships a single client archive per OS and labels macOS as `mac`
pub const OC: FamilySpec = FamilySpec {
    name: "oc",
    manager: "ocenv",
    download_template: "https://github.com/openshift/okd/releases/download/{version}/openshift-client-{os}-{version}",
    releases_endpoint: "https://api.github.com/repos/openshift/okd/releases?page=",
    os_aliases: &[(Os::Darwin, "mac")],
    packaging: Packaging::Bundle { inner_path: "oc" },
    auto_version: false,
};

/// Every family kbm knows how to manage
pub const FAMILIES: [FamilySpec; 3] = [KUBECTL, HELM, OC];

impl FamilySpec {
    /// Look a family up by its executable name
    ///
    /// # Errors
    /// Returns `Error::UnknownFamily` for names not in [`FAMILIES`]
    pub fn by_name(name: &str) -> Result<&'static FamilySpec> {
        FAMILIES
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::UnknownFamily(name.to_string()))
    }

    /// Look a family up by its manager command name (e.g. "helmenv")
    #[must_use]
    pub fn by_manager(manager: &str) -> Option<&'static FamilySpec> {
        FAMILIES.iter().find(|f| f.manager == manager)
    }

    /// OS name as this family spells it in URLs
    #[must_use]
    pub fn os_name(&self, os: Os) -> &'static str {
        self.os_aliases
            .iter()
            .find(|(aliased, _)| *aliased == os)
            .map_or_else(|| os.as_str(), |(_, alias)| *alias)
    }

    /// Archive format of the download on `os`, `None` for bare executables
    #[must_use]
    pub fn archive_kind(&self, os: Os) -> Option<ArchiveKind> {
        match self.packaging {
            Packaging::Raw => None,
            Packaging::Bundle { .. } => Some(ArchiveKind::for_os(os)),
        }
    }

    /// Extension appended to the download URL on `os`
    #[must_use]
    pub fn download_extension(&self, os: Os) -> &'static str {
        match self.archive_kind(os) {
            Some(kind) => kind.extension(),
            None => os.exe_suffix(),
        }
    }

    /// Build the download URL for a version on a platform
    ///
    /// # Examples
    /// ```
    /// use kbm::family::HELM;
    /// use kbm::Platform;
    ///
    /// let platform = Platform::from_names("linux", "x86_64").unwrap();
    /// assert_eq!(
    ///     HELM.download_url(HELM.download_template, "3.14.0", &platform),
    ///     "https://get.helm.sh/helm-v3.14.0-linux-amd64.tar.gz"
    /// );
    /// ```
    #[must_use]
    pub fn download_url(&self, template: &str, version: &str, platform: &Platform) -> String {
        let mut url = fill_template(template, version, self.os_name(platform.os), platform);
        url.push_str(self.download_extension(platform.os));
        url
    }

    /// Location of the executable inside an extracted bundle
    ///
    /// Returns `None` for families shipping a bare executable.
    #[must_use]
    pub fn inner_path(&self, platform: &Platform) -> Option<PathBuf> {
        match self.packaging {
            Packaging::Raw => None,
            Packaging::Bundle { inner_path } => {
                let mut path = fill_template(inner_path, "", platform.os.as_str(), platform);
                path.push_str(platform.exe_suffix());
                Some(PathBuf::from(path))
            }
        }
    }

    /// File name of an installed version (`<family>-v<version>[.exe]`)
    #[must_use]
    pub fn binary_file_name(&self, version: &str, os: Os) -> String {
        format!("{}-v{version}{}", self.name, os.exe_suffix())
    }

    /// Deterministic install location of a version
    #[must_use]
    pub fn install_path(&self, bin_dir: &Path, version: &str, os: Os) -> PathBuf {
        bin_dir.join(self.binary_file_name(version, os))
    }

    /// Prefix shared by every installed file of this family
    #[must_use]
    pub fn file_prefix(&self) -> String {
        format!("{}-v", self.name)
    }

    /// Global pin file (`<bin_dir>/.<family>-version`)
    #[must_use]
    pub fn global_pin_path(&self, bin_dir: &Path) -> PathBuf {
        bin_dir.join(format!(".{}-version", self.name))
    }

    /// Directory-local pin file (`<dir>/.<family>_version`)
    #[must_use]
    pub fn local_pin_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!(".{}_version", self.name))
    }
}

fn fill_template(template: &str, version: &str, os: &str, platform: &Platform) -> String {
    template
        .replace("{version}", version)
        .replace("{os}", os)
        .replace("{arch}", platform.arch.as_str())
}
