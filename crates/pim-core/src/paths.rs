//! Locations under the pim home directory.

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the pim home directory, or None if the user's home cannot be resolved.
///
/// `PIM_HOME` overrides the default of `~/.pim`.
pub fn try_pim_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("PIM_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".pim"))
}

/// Settings file: ~/.pim/settings.toml
pub fn settings_file(home: &std::path::Path) -> PathBuf {
    home.join("settings.toml")
}

/// Default log path for an installer run: `<log_dir>/install-<id>-<version>-<timestamp>.log`
pub fn installer_log_path(log_dir: &std::path::Path, id: &str, version: &str) -> PathBuf {
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    log_dir.join(format!("install-{id}-{version}-{timestamp}.log"))
}
