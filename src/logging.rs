// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Diagnostic output setup

use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV: &str = "KBM_LOG";

/// Pick the level directive from the command line
///
/// An explicit `--log-level` wins over `--verbose`, which wins over the
/// mode's default.
#[must_use]
pub fn level_directive<'a>(log_level: Option<&'a str>, verbose: bool, default: &'a str) -> &'a str {
    match (log_level, verbose) {
        (Some(level), _) => level,
        (None, true) => "debug",
        (None, false) => default,
    }
}

/// Install the global subscriber writing to stderr
///
/// `KBM_LOG` overrides `level` when set and valid. Calling this twice is
/// harmless; the second call is ignored.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}
