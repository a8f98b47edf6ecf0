// GNU Affero General Public License v3.0 or later (see LICENSE or https://www.gnu.org/licenses/agpl.txt)
//! Kubernetes Binaries Manager (kbm) - Main Application
//!
//! One multi-call binary. Invoked (usually through a symlink) as `kubectl`,
//! `helm` or `oc` it resolves the pinned version and runs it; invoked as
//! `kbenv`, `helmenv`, `ocenv` or `kbm` it manages installed versions.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;
use tracing::{debug, warn};

use kbm::catalog::VersionCatalog;
use kbm::logging;
use kbm::picker::{ConsolePicker, Picker, Selection};
use kbm::resolver::{self, AUTO, KubectlProbe, ProcessExecutor, Resolver, Wrapper};
use kbm::version::normalize_input;
use kbm::{
    DirInventory, Error, FamilySpec, Installer, Inventory, Platform, Result, Settings,
    apply_policy,
};

mod cli;
use cli::{Cli, Commands, ListFilter, ListSource};

/// Main application entry point
///
/// Dispatches on the name the binary was invoked under.
fn main() {
    let args: Vec<OsString> = env::args_os().collect();
    let invoked = invoked_name(args.first().map(PathBuf::from).as_deref());

    let code = match FamilySpec::by_name(&invoked) {
        Ok(family) => run_wrapper(family, args.get(1..).unwrap_or_default()),
        Err(_) => run_manager(&invoked, args),
    };
    exit(code);
}

/// File name of argv[0] without directory or `.exe`
fn invoked_name(argv0: Option<&Path>) -> String {
    argv0
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Print an error the way the command line reports it and pick the exit code
fn report(err: &Error) -> i32 {
    if err.is_unsupported_platform() {
        println!("{err}");
        0
    } else {
        eprintln!("{err}");
        1
    }
}

// =============================================================================
// Wrapper mode
// =============================================================================

fn run_wrapper(family: &'static FamilySpec, args: &[OsString]) -> i32 {
    logging::init("warn");
    match wrap(family, args) {
        Ok(code) => code,
        Err(e) => report(&e),
    }
}

fn wrap(family: &'static FamilySpec, args: &[OsString]) -> Result<i32> {
    let settings = Settings::from_env()?;
    let platform = Platform::detect()?;
    let cwd = env::current_dir()?;

    let installer = Installer::new(settings.download_client(), platform, &settings.bin_dir);
    let probe = KubectlProbe::new(DirInventory::new(&settings.bin_dir, platform.os));
    let wrapper = Wrapper {
        resolver: Resolver::new(family, &settings.bin_dir, platform.os, cwd),
        cluster: &probe,
        provisioner: &installer,
        executor: &ProcessExecutor,
    };

    let environment: Vec<(OsString, OsString)> = env::vars_os().collect();
    wrapper.run(args, &environment)
}

// =============================================================================
// Manager mode
// =============================================================================

/// Everything a manager command needs
struct Manager {
    family: &'static FamilySpec,
    settings: Settings,
    platform: Platform,
}

fn run_manager(invoked: &str, args: Vec<OsString>) -> i32 {
    let cli = Cli::parse_from(args);
    logging::init(logging::level_directive(
        cli.log_level.as_deref(),
        cli.verbose,
        "info",
    ));

    let family = match FamilySpec::by_manager(invoked) {
        Some(family) => Ok(family),
        None => FamilySpec::by_name(cli.family.as_str()),
    };

    let result = family.and_then(|family| {
        debug!(family = family.name, "manager started");
        let manager = Manager {
            family,
            settings: Settings::from_env()?,
            platform: Platform::detect()?,
        };
        manager.dispatch(cli.command)
    });

    match result {
        Ok(()) => 0,
        Err(e) => report(&e),
    }
}

impl Manager {
    fn dispatch(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Install { version } => self.cmd_install(version),
            Commands::Uninstall { version } => self.cmd_uninstall(version),
            Commands::Use { version, local } => self.cmd_use(&version, local),
            Commands::List {
                source: ListSource::Remote { filter },
            } => self.cmd_list_remote(filter),
            Commands::List {
                source: ListSource::Local { filter },
            } => self.cmd_list_local(filter),
        }
    }

    fn inventory(&self) -> DirInventory {
        DirInventory::new(&self.settings.bin_dir, self.platform.os)
    }

    fn remote_versions(&self, filter: ListFilter) -> Result<Vec<String>> {
        let client = self.settings.catalog_client();
        let versions = VersionCatalog::new(&client).fetch_all(self.family.releases_endpoint)?;
        Ok(apply_policy(versions, filter.all_releases, filter.all_versions)
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    fn local_versions(&self, filter: ListFilter) -> Result<Vec<String>> {
        let versions = self
            .inventory()
            .scan(self.family)?
            .into_iter()
            .map(|entry| entry.version)
            .collect();
        Ok(apply_policy(versions, filter.all_releases, filter.all_versions)
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    /// Install a version and report where it went
    fn cmd_install(&self, version: Option<String>) -> Result<()> {
        let version = match version {
            Some(v) => normalize_input(&v).to_string(),
            None => {
                let items = self.remote_versions(ListFilter::default())?;
                match ConsolePicker.select(&items, "Install version>")? {
                    Selection::Chosen(v) => v,
                    Selection::NonInteractive => return Ok(()),
                    Selection::Cancelled => {
                        println!("No version selected.");
                        return Ok(());
                    }
                }
            }
        };

        let path = self
            .family
            .install_path(&self.settings.bin_dir, &version, self.platform.os);
        if path.exists() {
            println!("The version {version} is already installed!");
            return Ok(());
        }

        let installer = Installer::new(
            self.settings.download_client(),
            self.platform,
            &self.settings.bin_dir,
        );
        let saved = installer.install_from(self.family, &version, self.family.download_template)?;
        println!("Done! Saved at {}.", saved.display());

        self.check_path_shadowing();
        Ok(())
    }

    /// Remove an installed version
    fn cmd_uninstall(&self, version: Option<String>) -> Result<()> {
        let version = match version {
            Some(v) => normalize_input(&v).to_string(),
            None => {
                let items = self.local_versions(ListFilter {
                    all_releases: true,
                    all_versions: true,
                })?;
                if items.is_empty() {
                    println!("No installed versions found.");
                    return Ok(());
                }
                match ConsolePicker.select(&items, "Uninstall version>")? {
                    Selection::Chosen(v) => v,
                    Selection::NonInteractive => return Ok(()),
                    Selection::Cancelled => {
                        println!("No version selected.");
                        return Ok(());
                    }
                }
            }
        };

        let path = self
            .family
            .install_path(&self.settings.bin_dir, &version, self.platform.os);
        if !path.is_file() {
            println!("The version {version} was already uninstalled! Doing nothing.");
            return Ok(());
        }

        fs::remove_file(&path)?;
        println!("Done! {version} version uninstalled from {}.", path.display());
        Ok(())
    }

    /// Write the global or local pin
    fn cmd_use(&self, version: &str, local: bool) -> Result<()> {
        let value = if version.trim() == AUTO {
            AUTO.to_string()
        } else {
            normalize_input(version).to_string()
        };

        if value == AUTO && !self.family.auto_version {
            return Err(Error::AutoUnsupported(self.family.name.to_string()));
        }

        let pin = if local {
            self.family.local_pin_path(&env::current_dir()?)
        } else {
            self.family.global_pin_path(&self.settings.bin_dir)
        };
        resolver::write_pin(&pin, &value)?;

        if value != AUTO
            && !self
                .family
                .install_path(&self.settings.bin_dir, &value, self.platform.os)
                .exists()
        {
            warn!(
                version = %value,
                "version is not installed yet; run '{} install {value}'",
                self.family.manager
            );
        }

        println!("Done! Using {value} version.");
        self.check_path_shadowing();
        Ok(())
    }

    fn cmd_list_remote(&self, filter: ListFilter) -> Result<()> {
        let items = self.remote_versions(filter)?;
        match ConsolePicker.select(&items, "Select remote version>")? {
            Selection::Chosen(v) => println!("{v}"),
            Selection::NonInteractive => {}
            Selection::Cancelled => {
                for item in &items {
                    println!("{item}");
                }
            }
        }
        Ok(())
    }

    fn cmd_list_local(&self, filter: ListFilter) -> Result<()> {
        for version in self.local_versions(filter)? {
            println!("{version}");
        }
        Ok(())
    }

    /// Warn when the family's command in PATH is not this binary
    fn check_path_shadowing(&self) {
        let Ok(current) = env::current_exe().and_then(fs::canonicalize) else {
            return;
        };

        match which::which(self.family.name) {
            Ok(found) => {
                let resolved = fs::canonicalize(&found).unwrap_or_else(|_| found.clone());
                if resolved != current {
                    warn!(
                        "'{}' in PATH resolves to {}, not to kbm; installed versions will not be used",
                        self.family.name,
                        found.display()
                    );
                }
            }
            Err(_) => warn!(
                "'{}' is not in PATH; link it to {} to use the pinned version",
                self.family.name,
                current.display()
            ),
        }
    }
}
