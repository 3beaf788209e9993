//! Installer records: one concrete installable artifact within a manifest.

use serde::{Deserialize, Serialize};

use crate::{Arch, OsVersion, Sha256Digest};

/// Install scope of an installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Per-user install.
    User,
    /// Machine-wide install.
    Machine,
    /// Not declared by the manifest.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Scope {
    /// Values a user may pass on the command line.
    pub const VALID: [&'static str; 2] = ["user", "machine"];

    /// Parse a command-line scope value; anything unrecognized is `Unknown`.
    pub fn parse_arg(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "user" => Self::User,
            "machine" => Self::Machine,
            _ => Self::Unknown,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Machine => "machine",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Installer technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallerType {
    /// Generic executable installer.
    Exe,
    /// Windows Installer package.
    Msi,
    /// MSI produced by the `WiX` toolset.
    Wix,
    /// `WiX` bundle bootstrapper.
    Burn,
    /// Inno Setup installer.
    Inno,
    /// Nullsoft (NSIS) installer.
    Nullsoft,
    /// Packaged application.
    Msix,
    /// Store-delivered application.
    Msstore,
    /// Archive unpacked into the install location.
    Zip,
    /// Standalone executable copied into the install location.
    Portable,
}

impl InstallerType {
    /// Whether this technology can perform an install in `scope`.
    ///
    /// Store applications are always per-user; every other type can be
    /// driven in either scope.
    pub fn supports_scope(self, scope: Scope) -> bool {
        match self {
            Self::Msstore => scope != Scope::Machine,
            _ => true,
        }
    }

    /// Whether the artifact is unpacked or copied rather than executed.
    pub fn is_archive(self) -> bool {
        matches!(self, Self::Zip | Self::Portable)
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exe => "exe",
            Self::Msi => "msi",
            Self::Wix => "wix",
            Self::Burn => "burn",
            Self::Inno => "inno",
            Self::Nullsoft => "nullsoft",
            Self::Msix => "msix",
            Self::Msstore => "msstore",
            Self::Zip => "zip",
            Self::Portable => "portable",
        }
    }
}

impl std::fmt::Display for InstallerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Command-line switches passed to an executable installer.
///
/// `<LOGPATH>` and `<INSTALLPATH>` tokens are substituted at launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerSwitches {
    /// Switches for an unattended install.
    #[serde(default)]
    pub silent: Option<String>,
    /// Switches for an install that shows its own UI.
    #[serde(default)]
    pub interactive: Option<String>,
    /// Switch that directs the installer log to `<LOGPATH>`.
    #[serde(default)]
    pub log: Option<String>,
    /// Switch that sets the target directory to `<INSTALLPATH>`.
    #[serde(default)]
    pub install_location: Option<String>,
    /// Always appended.
    #[serde(default)]
    pub custom: Option<String>,
}

/// One installable artifact variant within a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerRecord {
    /// Target architecture.
    pub architecture: Arch,
    /// Install scope; `unknown` when the manifest does not say.
    #[serde(default)]
    pub scope: Scope,
    /// Installer technology.
    #[serde(rename = "type")]
    pub installer_type: InstallerType,
    /// BCP-47 locale of the installer UI, if localized.
    #[serde(default)]
    pub locale: Option<String>,
    /// Oldest host OS version the installer supports.
    #[serde(default)]
    pub minimum_os_version: Option<OsVersion>,
    /// Expected SHA-256 of the downloaded bytes.
    pub sha256: Sha256Digest,
    /// Download location.
    pub url: String,
    /// Installer switches.
    #[serde(default)]
    pub switches: InstallerSwitches,
}

impl InstallerRecord {
    /// Short human description, e.g. `x64/user/msi (en-US)`.
    pub fn describe(&self) -> String {
        match &self.locale {
            Some(locale) => format!(
                "{}/{}/{} ({locale})",
                self.architecture, self.scope, self.installer_type
            ),
            None => format!(
                "{}/{}/{}",
                self.architecture, self.scope, self.installer_type
            ),
        }
    }

    /// File name component of the download URL.
    ///
    /// Empty when the last URL segment is not a plain file name.
    pub fn file_name(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        let name = path.rsplit('/').next().unwrap_or(path);
        if name.starts_with('.') || name.contains(['\\', ':']) {
            ""
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_argument_parsing() {
        assert_eq!(Scope::parse_arg("User"), Scope::User);
        assert_eq!(Scope::parse_arg("machine"), Scope::Machine);
        assert_eq!(Scope::parse_arg("system"), Scope::Unknown);
    }

    #[test]
    fn store_installers_are_user_only() {
        assert!(InstallerType::Msstore.supports_scope(Scope::User));
        assert!(!InstallerType::Msstore.supports_scope(Scope::Machine));
        assert!(InstallerType::Msi.supports_scope(Scope::Machine));
    }

    #[test]
    fn file_name_strips_query() {
        let rec = InstallerRecord {
            architecture: Arch::X64,
            scope: Scope::User,
            installer_type: InstallerType::Exe,
            locale: None,
            minimum_os_version: None,
            sha256: Sha256Digest::from_bytes(&[0; 32]),
            url: "https://example.com/dl/setup.exe?sig=abc".to_string(),
            switches: InstallerSwitches::default(),
        };
        assert_eq!(rec.file_name(), "setup.exe");
        assert_eq!(rec.describe(), "x64/user/exe");

        for url in ["https://example.com/dl/..", "https://example.com/a\\..\\b.exe"] {
            let rec = InstallerRecord {
                url: url.to_string(),
                ..rec.clone()
            };
            assert_eq!(rec.file_name(), "");
        }
    }
}
