//! Host environment collaborator.
//!
//! The engine only ever asks the host pure questions: which architectures it
//! can run, what OS version it is, whether the process is elevated, and where
//! the standard directories are. [`SystemHost`] answers them for the running
//! machine; [`StaticHost`] answers them from fixed values for tests and
//! dry runs.

use std::path::PathBuf;

use pim_schema::{Arch, OsVersion};
use thiserror::Error;

/// A standard location the engine may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathName {
    /// Scratch space for downloads.
    Temp,
    /// Persistent per-user state (portable installs live here).
    LocalState,
    /// Default directory for log files.
    DefaultLog,
    /// Directory holding `settings.toml`.
    StandardSettings,
    /// The user's home directory.
    UserProfile,
}

/// Errors constructing a host environment.
#[derive(Error, Debug)]
pub enum HostError {
    /// Neither `PIM_HOME` nor a home directory is available.
    #[error("Could not determine home directory. Set PIM_HOME to override.")]
    NoHome,
}

/// Pure queries about the machine the engine runs on.
pub trait HostEnvironment: Send + Sync + std::fmt::Debug {
    /// Architectures this host can execute, most preferred first.
    fn applicable_architectures(&self) -> Vec<Arch>;

    /// Current OS version.
    fn os_version(&self) -> OsVersion;

    /// Whether the process runs with administrator privileges.
    fn is_admin(&self) -> bool;

    /// Location of a standard directory.
    fn path_to(&self, path: PathName) -> PathBuf;

    /// Whether `arch` is in the applicable list.
    fn is_applicable(&self, arch: Arch) -> bool {
        arch != Arch::Unknown && self.applicable_architectures().contains(&arch)
    }
}

/// The machine this process is running on.
#[derive(Debug, Clone)]
pub struct SystemHost {
    home: PathBuf,
    native: Arch,
    os_version: OsVersion,
}

impl SystemHost {
    /// Inspect the running machine.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NoHome`] when no home directory can be found.
    pub fn detect() -> Result<Self, HostError> {
        let home = crate::paths::try_pim_home().ok_or(HostError::NoHome)?;
        Ok(Self {
            home,
            native: Arch::native(),
            os_version: detect_os_version(),
        })
    }

    /// Root directory for pim state.
    pub fn home(&self) -> &std::path::Path {
        &self.home
    }
}

impl HostEnvironment for SystemHost {
    fn applicable_architectures(&self) -> Vec<Arch> {
        Arch::applicable_for(self.native)
    }

    fn os_version(&self) -> OsVersion {
        self.os_version
    }

    fn is_admin(&self) -> bool {
        #[cfg(unix)]
        {
            #[allow(unsafe_code)]
            // SAFETY: geteuid has no preconditions and cannot fail.
            let euid = unsafe { libc::geteuid() };
            euid == 0
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    fn path_to(&self, path: PathName) -> PathBuf {
        match path {
            PathName::Temp => self.home.join("tmp"),
            PathName::LocalState => self.home.join("state"),
            PathName::DefaultLog => self.home.join("logs"),
            PathName::StandardSettings => self.home.clone(),
            PathName::UserProfile => dirs::home_dir().unwrap_or_else(|| self.home.clone()),
        }
    }
}

/// `PIM_OS_VERSION` overrides detection; otherwise the kernel release is used.
fn detect_os_version() -> OsVersion {
    if let Ok(v) = std::env::var("PIM_OS_VERSION") {
        if let Ok(parsed) = v.parse() {
            return parsed;
        }
        tracing::warn!("Ignoring unparsable PIM_OS_VERSION '{v}'");
    }

    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

/// A host with fixed answers.
#[derive(Debug, Clone)]
pub struct StaticHost {
    /// Applicable architectures, preference first.
    pub architectures: Vec<Arch>,
    /// Reported OS version.
    pub os_version: OsVersion,
    /// Reported elevation.
    pub admin: bool,
    /// Root under which every standard path is placed.
    pub root: PathBuf,
}

impl StaticHost {
    /// An x64 host rooted at `root`.
    pub fn x64(root: impl Into<PathBuf>) -> Self {
        Self {
            architectures: Arch::applicable_for(Arch::X64),
            os_version: OsVersion::new(10, 0, 22631, 0),
            admin: false,
            root: root.into(),
        }
    }

    /// Same host with a different architecture list.
    pub fn with_architectures(mut self, architectures: Vec<Arch>) -> Self {
        self.architectures = architectures;
        self
    }

    /// Same host reporting a different OS version.
    pub fn with_os_version(mut self, os_version: OsVersion) -> Self {
        self.os_version = os_version;
        self
    }
}

impl HostEnvironment for StaticHost {
    fn applicable_architectures(&self) -> Vec<Arch> {
        self.architectures.clone()
    }

    fn os_version(&self) -> OsVersion {
        self.os_version
    }

    fn is_admin(&self) -> bool {
        self.admin
    }

    fn path_to(&self, path: PathName) -> PathBuf {
        let leaf = match path {
            PathName::Temp => "tmp",
            PathName::LocalState => "state",
            PathName::DefaultLog => "logs",
            PathName::StandardSettings => "settings",
            PathName::UserProfile => "profile",
        };
        self.root.join(leaf)
    }
}
