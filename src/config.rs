// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Settings read from the environment

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};
use crate::http::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, RetryPolicy, RetryingClient};

pub const BIN_DIR_ENV: &str = "KBM_BIN_DIR";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const RETRIES_ENV: &str = "KBM_HTTP_RETRIES";
pub const TIMEOUT_ENV: &str = "KBM_HTTP_TIMEOUT";

/// Install directory below the home directory
pub const DEFAULT_BIN_DIR: &str = ".bin";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bin_dir: PathBuf,
    pub token: Option<String>,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl Settings {
    /// Read settings from the process environment
    ///
    /// # Errors
    /// Returns `Error::HomeNotFound` when no home directory can be found
    /// and `KBM_BIN_DIR` is not set
    pub fn from_env() -> Result<Self> {
        let lookup = |key: &str| env::var(key).ok();
        match lookup(BIN_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            Some(_) => Ok(Self::from_lookup(Path::new(""), lookup)),
            None => {
                let home = home::home_dir().ok_or(Error::HomeNotFound)?;
                Ok(Self::from_lookup(&home, lookup))
            }
        }
    }

    /// Build settings from a home directory and a variable lookup
    pub fn from_lookup(home: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let bin_dir = lookup(BIN_DIR_ENV)
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| home.join(DEFAULT_BIN_DIR), PathBuf::from);

        let token = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty());

        let max_retries = parse_or_default(RETRIES_ENV, lookup(RETRIES_ENV), DEFAULT_MAX_RETRIES);
        let timeout = lookup(TIMEOUT_ENV).map_or(DEFAULT_TIMEOUT, |raw| {
            Duration::from_secs(parse_or_default(TIMEOUT_ENV, Some(raw), DEFAULT_TIMEOUT.as_secs()))
        });

        Self {
            bin_dir,
            token,
            max_retries,
            timeout,
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        }
    }

    /// Client for the release index, authenticated when a token is set
    #[must_use]
    pub fn catalog_client(&self) -> RetryingClient {
        RetryingClient::with_defaults(self.token.clone(), self.timeout, self.retry_policy())
    }

    /// Client for artifact downloads; never carries the token
    #[must_use]
    pub fn download_client(&self) -> RetryingClient {
        RetryingClient::with_defaults(None, self.timeout, self.retry_policy())
    }
}

fn parse_or_default<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = key, value = %raw, default = %default, "ignoring invalid value");
            default
        }),
    }
}
