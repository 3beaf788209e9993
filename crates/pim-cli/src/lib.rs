//! pim - a package installer client
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Resolves a package from the configured sources, picks the installer that
//! fits this machine, verifies it and runs it.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.pim/
//! ├── settings.toml   # Configured sources
//! ├── tmp/            # Downloaded installers by id/version
//! ├── state/packages/ # Portable and zip installs
//! └── logs/           # Installer logs
//! ```

pub mod cmd;
pub mod config;
pub mod ui;

use clap::{Args, Parser, Subcommand};
use pim_core::args::InvocationArgs;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pim")]
#[command(author, version, about = "pim - a package installer client")]
pub struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, global = true, env = "PIM_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install a package
    Install(PackageArgs),
    /// Show a package and the installer that would be used
    Show(PackageArgs),
    /// Search configured sources
    Search(SearchArgs),
    /// Compute SHA256 hash of a file (for manifest authoring)
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print completion values for an argument
    #[command(hide = true)]
    Complete {
        /// Partial word being completed
        #[arg(long, default_value = "")]
        word: String,
        /// Argument being completed, e.g. id or --source
        #[arg(long)]
        arg: String,
        /// Arguments already on the command line
        #[command(flatten)]
        context: PackageArgs,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Arguments shared by the single-package commands.
///
/// Conflicts between `--manifest` and the query arguments are left to the
/// engine's validator so they map to their own exit code.
#[derive(Debug, Clone, Default, Args)]
pub struct PackageArgs {
    /// Free-text query matched against id, name and moniker
    pub query: Option<String>,
    /// Path to a manifest file
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
    /// Filter by package id
    #[arg(long)]
    pub id: Option<String>,
    /// Filter by package name
    #[arg(long)]
    pub name: Option<String>,
    /// Filter by moniker
    #[arg(long)]
    pub moniker: Option<String>,
    /// Package version to use
    #[arg(short, long)]
    pub version: Option<String>,
    /// Release channel
    #[arg(short, long)]
    pub channel: Option<String>,
    /// Restrict to one configured source
    #[arg(short, long)]
    pub source: Option<String>,
    /// Install scope (user or machine)
    #[arg(long)]
    pub scope: Option<String>,
    /// Installer architecture
    #[arg(short, long)]
    pub architecture: Option<String>,
    /// Match exactly, case-sensitive
    #[arg(short, long)]
    pub exact: bool,
    /// Run the installer interactively
    #[arg(short, long)]
    pub interactive: bool,
    /// Run the installer silently
    #[arg(long)]
    pub silent: bool,
    /// Installer locale (BCP 47)
    #[arg(long)]
    pub locale: Option<String>,
    /// Installer log file
    #[arg(short, long)]
    pub log: Option<PathBuf>,
    /// Replace the installer arguments entirely
    #[arg(long = "override")]
    pub override_args: Option<String>,
    /// Install location
    #[arg(long = "location")]
    pub install_location: Option<PathBuf>,
    /// Proceed even if the installer hash does not match
    #[arg(long = "ignore-security-hash")]
    pub hash_override: bool,
    /// Source to resolve dependencies from
    #[arg(long)]
    pub dependency_source: Option<String>,
    /// Accept package agreements without prompting
    #[arg(long)]
    pub accept_package_agreements: bool,
    /// Accept source agreements without prompting
    #[arg(long)]
    pub accept_source_agreements: bool,
    /// Value sent in the custom header of index source requests
    #[arg(long = "header")]
    pub custom_header: Option<String>,
}

impl From<PackageArgs> for InvocationArgs {
    fn from(a: PackageArgs) -> Self {
        Self {
            query: a.query,
            manifest: a.manifest,
            id: a.id,
            name: a.name,
            moniker: a.moniker,
            version: a.version,
            channel: a.channel,
            source: a.source,
            scope: a.scope,
            architecture: a.architecture,
            exact: a.exact,
            interactive: a.interactive,
            silent: a.silent,
            locale: a.locale,
            log: a.log,
            override_args: a.override_args,
            install_location: a.install_location,
            hash_override: a.hash_override,
            dependency_source: a.dependency_source,
            accept_package_agreements: a.accept_package_agreements,
            accept_source_agreements: a.accept_source_agreements,
            custom_header: a.custom_header,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct SearchArgs {
    /// Free-text query matched against id, name and moniker
    pub query: Option<String>,
    /// Filter by package id
    #[arg(long)]
    pub id: Option<String>,
    /// Filter by package name
    #[arg(long)]
    pub name: Option<String>,
    /// Filter by moniker
    #[arg(long)]
    pub moniker: Option<String>,
    /// Restrict to one configured source
    #[arg(short, long)]
    pub source: Option<String>,
    /// Match exactly, case-sensitive
    #[arg(short, long)]
    pub exact: bool,
    /// Value sent in the custom header of index source requests
    #[arg(long = "header")]
    pub custom_header: Option<String>,
}
