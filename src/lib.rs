// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Kubernetes Binaries Manager Library
//!
//! This library manages side-by-side versions of `kubectl`, `helm` and the
//! OKD `oc` client: discovering upstream releases, installing them into a
//! per-user directory, and resolving which version to run for a given
//! working directory.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod family;
pub mod http;
pub mod installer;
pub mod inventory;
pub mod logging;
pub mod picker;
pub mod platform;
pub mod resolver;
pub mod version;

// Commonly used items at the crate root
pub use catalog::VersionCatalog;
pub use config::Settings;
pub use error::{Error, Result};
pub use family::{FAMILIES, FamilySpec};
pub use installer::{Installer, Provision};
pub use inventory::{DirInventory, InstalledEntry, Inventory};
pub use platform::{Arch, Os, Platform};
pub use resolver::{Resolver, Wrapper};
pub use version::{VersionRef, apply_policy};
