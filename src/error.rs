// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Error type shared by every kbm operation

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::http::TransportError;

/// Everything that can go wrong while discovering, installing or running a binary
#[derive(Debug, Error)]
pub enum Error {
    #[error("The OS '{0}' is not supported.")]
    UnsupportedOs(String),

    #[error("The arch '{0}' is not supported.")]
    UnsupportedArch(String),

    #[error("The binary was not found. The url may be wrong or the version may not exist.\nurl: {url}")]
    BinaryNotFound { url: String },

    #[error("There was an unhandled error downloading the binary (status {status}).\nurl: {url}\nbody: {body}")]
    DownloadUnhandled {
        url: String,
        status: u16,
        body: String,
    },

    #[error(
        "The request to GitHub's API failed with 403 Forbidden ({url}).\n\
         You may still install the version you want if you know it: install X.Y.Z"
    )]
    Forbidden { url: String },

    #[error("Unexpected response from {url} (status {status}): {body}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed version '{input}': {reason}")]
    VersionParse { input: String, reason: String },

    #[error("Could not read the last page from the Link header '{0}'")]
    Pagination(String),

    #[error("'{0}' was not found inside the downloaded archive")]
    MissingFromArchive(PathBuf),

    #[error("Unsupported archive: {0}")]
    UnsupportedArchive(String),

    #[error("The version {version} is already installed at {}", path.display())]
    AlreadyInstalled { version: String, path: PathBuf },

    #[error("The version {version} is not installed (expected {})", path.display())]
    NotInstalled { version: String, path: PathBuf },

    #[error("'auto' is not supported for {0}; pin a concrete version with 'use <VERSION>'")]
    AutoUnsupported(String),

    #[error("Could not determine the cluster version: {0}")]
    ClusterVersion(String),

    #[error("Could not determine the home directory")]
    HomeNotFound,

    #[error("Unknown binary family '{0}'")]
    UnknownFamily(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Malformed JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Unsupported platforms end the program cleanly instead of failing it
    #[must_use]
    pub fn is_unsupported_platform(&self) -> bool {
        matches!(self, Self::UnsupportedOs(_) | Self::UnsupportedArch(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
