// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Version parsing, ordering and the listing policy
//!
//! Release tags are only loosely semantic: they carry a `v` prefix, or omit
//! the patch component. `VersionRef` accepts those forms, normalizes them
//! into a `semver::Version` and keeps the original text for display.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::Version;

use crate::error::{Error, Result};

/// Number of entries kept when not listing every version
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Substrings marking a release as a pre-release when filtering listings
const PRERELEASE_MARKERS: [&str; 3] = ["alpha", "beta", "rc"];

/// A parsed semantic version together with the text it was parsed from
#[derive(Debug, Clone)]
pub struct VersionRef {
    version: Version,
    original: String,
}

impl VersionRef {
    /// Parse a release tag or version string
    ///
    /// Accepts an optional leading `v` and fills in missing minor and patch
    /// components with zero, so `v1.30`, `1.30.0` and `v1.30.0` are equal.
    ///
    /// # Errors
    /// Returns `Error::VersionParse` when the input is not a version
    ///
    /// # Examples
    /// ```
    /// use kbm::VersionRef;
    /// let v = VersionRef::parse("v1.30").unwrap();
    /// assert_eq!(v.to_string(), "1.30.0");
    /// assert_eq!(v.original(), "v1.30");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let unprefixed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let split_at = unprefixed.find(['-', '+']).unwrap_or(unprefixed.len());
        let (core, suffix) = unprefixed.split_at(split_at);

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty()
            || parts.len() > 3
            || parts
                .iter()
                .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(Error::VersionParse {
                input: input.to_string(),
                reason: "expected MAJOR[.MINOR[.PATCH]] with an optional pre-release or build suffix"
                    .to_string(),
            });
        }

        let mut numbers = Vec::with_capacity(3);
        for part in &parts {
            let number = part.parse::<u64>().map_err(|e| Error::VersionParse {
                input: input.to_string(),
                reason: e.to_string(),
            })?;
            numbers.push(number);
        }
        numbers.resize(3, 0);

        let normalized = format!("{}.{}.{}{suffix}", numbers[0], numbers[1], numbers[2]);
        let version = Version::parse(&normalized).map_err(|e| Error::VersionParse {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            version,
            original: trimmed.to_string(),
        })
    }

    /// The normalized semantic version
    #[must_use]
    pub fn semver(&self) -> &Version {
        &self.version
    }

    /// The text this version was parsed from
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Whether the tag as published looks like a pre-release
    ///
    /// This is a substring match of the original tag on `alpha`, `beta` and
    /// `rc`, not a parse of the semver pre-release field: OKD tags such as
    /// `4.15.0-0.okd-2024-03-10-010116` are technically pre-releases but
    /// are the normal way that project ships.
    #[must_use]
    pub fn looks_like_prerelease(&self) -> bool {
        PRERELEASE_MARKERS
            .iter()
            .any(|m| self.original.contains(m))
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.version.fmt(f)
    }
}

impl FromStr for VersionRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for VersionRef {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for VersionRef {}

impl Hash for VersionRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
    }
}

impl PartialOrd for VersionRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

/// Order versions most recent first and trim them for display or selection
///
/// Pre-releases are skipped unless `include_all_releases` is set; skipped
/// entries do not count towards the limit. Unless `include_all_versions` is
/// set, at most [`DEFAULT_LIST_LIMIT`] entries are returned.
///
/// # Examples
/// ```
/// use kbm::{VersionRef, apply_policy};
/// let versions = ["1.29.0", "1.31.0-rc.1", "1.30.2"]
///     .iter()
///     .map(|v| VersionRef::parse(v).unwrap())
///     .collect();
/// let listed: Vec<String> = apply_policy(versions, false, false)
///     .iter()
///     .map(ToString::to_string)
///     .collect();
/// assert_eq!(listed, ["1.30.2", "1.29.0"]);
/// ```
#[must_use]
pub fn apply_policy(
    mut versions: Vec<VersionRef>,
    include_all_releases: bool,
    include_all_versions: bool,
) -> Vec<VersionRef> {
    versions.sort_by(|a, b| b.cmp(a));

    let limit = if include_all_versions {
        usize::MAX
    } else {
        DEFAULT_LIST_LIMIT
    };

    versions
        .into_iter()
        .filter(|v| include_all_releases || !v.looks_like_prerelease())
        .take(limit)
        .collect()
}

/// Extract the leading `major.minor.patch` digits from a version string
///
/// Useful for server-reported versions such as `v1.29.4-eks-036c24b`.
///
/// # Examples
/// ```
/// use kbm::version::extract_version_number;
/// assert_eq!(extract_version_number("v1.29.4-eks-036c24b"), "1.29.4");
/// assert_eq!(extract_version_number("1.30.0+k3s1"), "1.30.0");
/// ```
#[must_use]
pub fn extract_version_number(version_output: &str) -> &str {
    let trimmed = version_output.trim();
    let unprefixed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    unprefixed
        .split(|c: char| !c.is_ascii_digit() && c != '.')
        .next()
        .unwrap_or(unprefixed)
}

/// Normalize a user supplied version for file names and URLs
///
/// Surrounding whitespace and a leading `v` are dropped, so `v1.30.0` and
/// `1.30.0` install to the same place.
#[must_use]
pub fn normalize_input(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed.strip_prefix('v').unwrap_or(trimmed)
}
