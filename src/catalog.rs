// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Remote version discovery from a paginated GitHub releases index

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::http::{HttpResponse, RetryingClient, TransportError};
use crate::version::VersionRef;

/// Pages fetched when the index sends no pagination hint
pub const DEFAULT_PAGE_COUNT: u32 = 2;

/// One release entry of the index; everything but the tag is ignored
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Fetches every version an upstream project has released
pub struct VersionCatalog<'a> {
    client: &'a RetryingClient,
}

impl<'a> VersionCatalog<'a> {
    #[must_use]
    pub fn new(client: &'a RetryingClient) -> Self {
        Self { client }
    }

    /// Fetch and parse every page of `endpoint` (the page number is appended)
    ///
    /// Versions are returned in the order the index lists them. Pages are
    /// fetched one after another and any failure aborts the whole fetch.
    ///
    /// # Errors
    /// - `Error::Forbidden` when the index refuses the request (403),
    ///   including a rate limit that retries could not wait out
    /// - `Error::UnexpectedStatus` for any other non-success status
    /// - `Error::VersionParse` / `Error::Json` for malformed pages
    /// - `Error::Transport` when retries are exhausted
    pub fn fetch_all(&self, endpoint: &str) -> Result<Vec<VersionRef>> {
        let first_url = format!("{endpoint}1");
        debug!(url = %first_url, "fetching first page");

        let first = self.fetch_page(&first_url)?;
        let last_page = match first.header("link") {
            Some(link) => parse_last_page(link)?,
            None => DEFAULT_PAGE_COUNT,
        };
        debug!(last_page, "last page determined");

        let mut versions = parse_page(&first.body)?;
        debug!(page = 1, last_page, count = versions.len(), "processed page");

        for page in 2..=last_page {
            let url = format!("{endpoint}{page}");
            debug!(url = %url, "fetching page");
            let response = self.fetch_page(&url)?;
            let page_versions = parse_page(&response.body)?;
            debug!(page, last_page, count = page_versions.len(), "processed page");
            versions.extend(page_versions);
        }

        info!(count = versions.len(), pages = last_page, "found releases");
        Ok(versions)
    }

    fn fetch_page(&self, url: &str) -> Result<HttpResponse> {
        let response = match self.client.get(url) {
            Ok(response) => response,
            // A rate limit that outlasted every retry
            Err(TransportError::RetriesExhausted { status: 403, .. }) => {
                return Err(Error::Forbidden {
                    url: url.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if response.status == 403 {
            return Err(Error::Forbidden {
                url: url.to_string(),
            });
        }
        if !response.is_success() {
            return Err(Error::UnexpectedStatus {
                url: url.to_string(),
                status: response.status,
                body: response.text(),
            });
        }
        Ok(response)
    }
}

/// Parse one page of the index into versions
///
/// # Errors
/// Returns `Error::Json` for a body that is not a release array, and
/// `Error::VersionParse` for the first tag that is not a version.
pub fn parse_page(body: &[u8]) -> Result<Vec<VersionRef>> {
    let releases: Vec<Release> = serde_json::from_slice(body)?;
    releases
        .iter()
        .map(|release| VersionRef::parse(&release.tag_name))
        .collect()
}

/// Read the last page number from a web `Link` header
///
/// The number following the last `page=` of the final listed link is the
/// page count; an explicit `0` falls back to [`DEFAULT_PAGE_COUNT`].
///
/// # Errors
/// Returns `Error::Pagination` when no page number can be read
///
/// # Examples
/// ```
/// use kbm::catalog::parse_last_page;
/// let link = r#"<https://api.github.com/r?page=2>; rel="next", <https://api.github.com/r?page=34>; rel="last""#;
/// assert_eq!(parse_last_page(link).unwrap(), 34);
/// ```
pub fn parse_last_page(link: &str) -> Result<u32> {
    let last_link = link
        .split(',')
        .map(str::trim)
        .rfind(|entry| !entry.is_empty())
        .ok_or_else(|| Error::Pagination(link.to_string()))?;

    // `per_page=` must not be mistaken for the page parameter
    let start = last_link
        .rmatch_indices("page=")
        .map(|(idx, _)| idx)
        .find(|&idx| idx == 0 || matches!(last_link.as_bytes()[idx - 1], b'?' | b'&'))
        .map(|idx| idx + "page=".len())
        .ok_or_else(|| Error::Pagination(link.to_string()))?;

    let digits: String = last_link[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();

    match digits.parse::<u32>() {
        Ok(0) => Ok(DEFAULT_PAGE_COUNT),
        Ok(page) => Ok(page),
        Err(_) => Err(Error::Pagination(link.to_string())),
    }
}
