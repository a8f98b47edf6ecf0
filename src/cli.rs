// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
// CLI argument definitions for kbm
//
// Separated from main.rs so that build.rs can include this file
// to generate the man page via clap_mangen.

use clap::{Parser, Subcommand, ValueEnum};

/// Binary families selectable with --family
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FamilyName {
    Kubectl,
    Helm,
    Oc,
}

impl FamilyName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kubectl => "kubectl",
            Self::Helm => "helm",
            Self::Oc => "oc",
        }
    }
}

/// CLI argument parser
#[derive(Parser, Debug)]
#[command(
    name = "kbm",
    version,
    about = "Kubernetes binaries manager: install and switch kubectl, helm and oc versions"
)]
pub struct Cli {
    /// Binary family to manage (implied when invoked as kbenv, helmenv or ocenv)
    #[arg(short, long, value_enum, global = true, default_value_t = FamilyName::Kubectl)]
    pub family: FamilyName,

    /// Make the operation more talkative
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install a version, choosing from the remote list when none is given
    Install {
        #[arg(value_name = "VERSION")]
        version: Option<String>,
    },

    /// Remove an installed version, choosing from the local list when none is given
    Uninstall {
        #[arg(value_name = "VERSION")]
        version: Option<String>,
    },

    /// Pin a version (or "auto") globally, or for the current directory
    Use {
        #[arg(value_name = "VERSION")]
        version: String,

        /// Write the pin to the current directory instead of the global one
        #[arg(short, long)]
        local: bool,
    },

    /// List versions
    List {
        #[command(subcommand)]
        source: ListSource,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ListSource {
    /// Versions published upstream
    Remote {
        #[command(flatten)]
        filter: ListFilter,
    },
    /// Versions installed locally
    Local {
        #[command(flatten)]
        filter: ListFilter,
    },
}

#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct ListFilter {
    /// Include alpha, beta and rc releases
    #[arg(long = "all-releases")]
    pub all_releases: bool,

    /// Do not limit the list to the most recent entries
    #[arg(long = "all-versions")]
    pub all_versions: bool,
}
