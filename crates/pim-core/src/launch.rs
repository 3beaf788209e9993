//! Running a verified installer.
//!
//! Executable installers are spawned with the switches for the requested
//! install mode. Archive types are unpacked (zip) or copied (portable) into
//! the install location instead.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use pim_schema::{InstallerRecord, InstallerType, Manifest};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

/// Why an installer did not complete.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The process could not be started.
    #[error("Failed to start installer: {0}")]
    Spawn(io::Error),

    /// The process ended unsuccessfully.
    #[error("Installer exited with code {code}")]
    ExitCode {
        /// Its exit code, or -1 when killed by a signal.
        code: i32,
    },

    /// Cancellation was requested while it ran.
    #[error("Installer was cancelled")]
    Cancelled,

    /// A zip installer could not be read.
    #[error("Archive error: {0}")]
    Extract(#[from] zip::result::ZipError),

    /// Selectable but not runnable here.
    #[error("{0} installers cannot be run on this host")]
    Unsupported(InstallerType),

    /// Placing files failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Whether the installer may show its own UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMode {
    /// No UI.
    #[default]
    Silent,
    /// The installer's own UI.
    Interactive,
}

impl InstallMode {
    /// Interactive wins when both flags are given.
    pub fn from_flags(silent: bool, interactive: bool) -> Self {
        match (silent, interactive) {
            (_, true) => Self::Interactive,
            (_, false) => Self::Silent,
        }
    }
}

/// Everything the launcher needs for one run.
#[derive(Debug)]
pub struct LaunchRequest<'a> {
    /// Package being installed.
    pub manifest: &'a Manifest,
    /// Selected installer.
    pub installer: &'a InstallerRecord,
    /// The downloaded, verified file.
    pub file: &'a Path,
    /// Silent or interactive.
    pub mode: InstallMode,
    /// Substituted for `<LOGPATH>`.
    pub log: &'a Path,
    /// Substituted for `<INSTALLPATH>`; required for archive types.
    pub location: Option<&'a Path>,
    /// Replaces every computed switch.
    pub override_args: Option<&'a str>,
    /// Kills the child process when cancelled.
    pub cancel: &'a CancellationToken,
}

/// What a successful launch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The installer process exited with success.
    Exited,
    /// Files were placed under the install location.
    Placed {
        /// Directory the files went into.
        location: PathBuf,
        /// Number of files written.
        files: usize,
    },
}

/// Runs or places a verified installer.
#[async_trait]
pub trait InstallerLauncher: Send + Sync + std::fmt::Debug {
    /// Install from `req.file`.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when the installer cannot start, fails or is
    /// cancelled.
    async fn launch(&self, req: LaunchRequest<'_>) -> Result<LaunchOutcome, LaunchError>;
}

/// Launches installers as child processes of this one.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl InstallerLauncher for ProcessLauncher {
    async fn launch(&self, req: LaunchRequest<'_>) -> Result<LaunchOutcome, LaunchError> {
        match req.installer.installer_type {
            InstallerType::Zip | InstallerType::Portable => place(&req).await,
            InstallerType::Msix | InstallerType::Msstore => {
                Err(LaunchError::Unsupported(req.installer.installer_type))
            }
            _ => run(&req).await,
        }
    }
}

async fn run(req: &LaunchRequest<'_>) -> Result<LaunchOutcome, LaunchError> {
    let switches = build_arguments(
        req.installer,
        req.mode,
        req.log,
        req.location,
        req.override_args,
    );

    let mut command = match req.installer.installer_type {
        InstallerType::Msi | InstallerType::Wix => {
            let mut cmd = tokio::process::Command::new("msiexec");
            cmd.arg("/i").arg(req.file);
            cmd
        }
        _ => {
            mark_executable(req.file)?;
            tokio::process::Command::new(req.file)
        }
    };
    command.args(&switches).stdin(Stdio::null()).kill_on_drop(true);

    tracing::info!(
        "Running {} installer for {} with {:?}",
        req.installer.installer_type,
        req.manifest.id,
        switches
    );
    let mut child = command.spawn().map_err(LaunchError::Spawn)?;

    let status = tokio::select! {
        biased;
        () = req.cancel.cancelled() => {
            child.kill().await.ok();
            return Err(LaunchError::Cancelled);
        }
        status = child.wait() => status?,
    };

    if status.success() {
        Ok(LaunchOutcome::Exited)
    } else {
        Err(LaunchError::ExitCode {
            code: status.code().unwrap_or(-1),
        })
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

async fn place(req: &LaunchRequest<'_>) -> Result<LaunchOutcome, LaunchError> {
    let location = req
        .location
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no install location"))?
        .to_path_buf();
    let file = req.file.to_path_buf();
    let kind = req.installer.installer_type;
    let dest_name = match req.installer.file_name() {
        "" => req.file.file_name().map_or_else(
            || "installer".to_string(),
            |n| n.to_string_lossy().into_owned(),
        ),
        name => name.to_string(),
    };

    if req.cancel.is_cancelled() {
        return Err(LaunchError::Cancelled);
    }

    let target = location.clone();
    let files = tokio::task::spawn_blocking(move || match kind {
        InstallerType::Zip => extract_zip(&file, &target),
        _ => copy_portable(&file, &target, &dest_name),
    })
    .await
    .map_err(|e| io::Error::other(e.to_string()))??;

    tracing::info!("Placed {files} file(s) in {}", location.display());
    Ok(LaunchOutcome::Placed { location, files })
}

/// Extract a zip archive, returning the number of files written.
///
/// # Errors
///
/// Returns [`LaunchError::Extract`] for a bad archive and
/// [`LaunchError::Io`] when writing fails.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize, LaunchError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    fs::create_dir_all(dest_dir)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive path {}", entry.name());
            continue;
        };
        let path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&path)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;
        }
        written += 1;
    }

    Ok(written)
}

fn copy_portable(file: &Path, dest_dir: &Path, name: &str) -> Result<usize, LaunchError> {
    fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(name);
    fs::copy(file, &dest)?;
    mark_executable(&dest)?;
    Ok(1)
}

fn default_silent(kind: InstallerType) -> Option<&'static str> {
    match kind {
        InstallerType::Msi | InstallerType::Wix => Some("/quiet /norestart"),
        InstallerType::Burn => Some("/quiet /norestart"),
        InstallerType::Inno => Some("/SP- /VERYSILENT /SUPPRESSMSGBOXES /NORESTART"),
        InstallerType::Nullsoft => Some("/S"),
        _ => None,
    }
}

fn default_interactive(kind: InstallerType) -> Option<&'static str> {
    match kind {
        InstallerType::Msi | InstallerType::Wix | InstallerType::Burn => Some("/norestart"),
        InstallerType::Inno => Some("/NORESTART"),
        _ => None,
    }
}

fn default_log(kind: InstallerType) -> Option<&'static str> {
    match kind {
        InstallerType::Msi | InstallerType::Wix => Some("/log \"<LOGPATH>\""),
        InstallerType::Burn => Some("/log \"<LOGPATH>\""),
        InstallerType::Inno => Some("/LOG=\"<LOGPATH>\""),
        _ => None,
    }
}

fn default_location(kind: InstallerType) -> Option<&'static str> {
    match kind {
        InstallerType::Msi | InstallerType::Wix => Some("TARGETDIR=\"<INSTALLPATH>\""),
        InstallerType::Inno => Some("/DIR=\"<INSTALLPATH>\""),
        InstallerType::Nullsoft => Some("/D=<INSTALLPATH>"),
        _ => None,
    }
}

/// Arguments passed to the installer process.
///
/// `override_args` replaces everything. Otherwise the mode switch, the log
/// switch, the location switch (only when a location was given) and the
/// custom switch are joined in that order, with tokens substituted.
pub fn build_arguments(
    installer: &InstallerRecord,
    mode: InstallMode,
    log: &Path,
    location: Option<&Path>,
    override_args: Option<&str>,
) -> Vec<String> {
    if let Some(raw) = override_args {
        return split_args(raw);
    }

    let kind = installer.installer_type;
    let sw = &installer.switches;
    let mode_switch = match mode {
        InstallMode::Silent => sw.silent.as_deref().or(default_silent(kind)),
        InstallMode::Interactive => sw.interactive.as_deref().or(default_interactive(kind)),
    };
    let log_switch = sw.log.as_deref().or(default_log(kind));
    let location_switch = location.and(sw.install_location.as_deref().or(default_location(kind)));

    let joined = [mode_switch, log_switch, location_switch, sw.custom.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    let log = log.display().to_string();
    let location = location.map(|p| p.display().to_string()).unwrap_or_default();
    split_args(
        &joined
            .replace("<LOGPATH>", &log)
            .replace("<INSTALLPATH>", &location),
    )
}

/// Split a command line on whitespace, honoring double quotes.
///
/// Quotes group words and are removed; `KEY="a b"` becomes `KEY=a b`.
pub fn split_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for c in raw.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        args.push(current);
    }
    args
}
