//! Package manifest parsing and validation.
//!
//! A manifest is a TOML document: package identity fields at the top level
//! and one `[[installer]]` table per installer record, in preference order.
//!
//! ```toml
//! id = "Contoso.Editor"
//! name = "Contoso Editor"
//! moniker = "editor"
//! version = "2.1.0"
//!
//! [[installer]]
//! architecture = "x64"
//! scope = "user"
//! type = "exe"
//! url = "https://example.com/editor-2.1.0-x64.exe"
//! sha256 = "..."
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{InstallerRecord, PackageId, Version};

/// Errors that can occur when loading or parsing a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// An I/O error occurred while reading a manifest file.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// File being read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML content could not be deserialized into a manifest.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The document parsed but violates a schema rule.
    #[error("Invalid manifest: {0}")]
    Invalid(String),
}

/// Immutable description of one version of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Unique package identifier.
    pub id: PackageId,
    /// Display name.
    pub name: String,
    /// Short alias users may type instead of the identifier.
    #[serde(default)]
    pub moniker: Option<String>,
    /// Package version.
    pub version: Version,
    /// Release channel (e.g. `beta`); absent for the default channel.
    #[serde(default)]
    pub channel: Option<String>,
    /// Publisher name.
    #[serde(default)]
    pub publisher: Option<String>,
    /// One-line description.
    #[serde(default)]
    pub description: Option<String>,
    /// Locale installers are assumed to target when they declare none.
    #[serde(default)]
    pub default_locale: Option<String>,
    /// License or terms the user must accept before install.
    #[serde(default)]
    pub agreements: Vec<String>,
    /// Installer records in manifest order.
    #[serde(rename = "installer", default)]
    pub installers: Vec<InstallerRecord>,
}

impl Manifest {
    /// Load and validate a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`validate`](Self::validate).
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate manifest text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid manifest.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the schema rules serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Invalid`] for an empty identity field, an id
    /// or version that is not a plain path component, a manifest without
    /// installers, or an installer with an empty url or malformed locale.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.id.trim().is_empty() {
            return Err(ManifestError::Invalid("empty field: id".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(ManifestError::Invalid("empty field: name".to_string()));
        }
        if self.version.trim().is_empty() {
            return Err(ManifestError::Invalid("empty field: version".to_string()));
        }
        check_path_segment("id", &self.id)?;
        check_path_segment("version", &self.version)?;
        if self.installers.is_empty() {
            return Err(ManifestError::Invalid(format!(
                "{} declares no installers",
                self.id
            )));
        }
        for (i, installer) in self.installers.iter().enumerate() {
            if installer.url.trim().is_empty() {
                return Err(ManifestError::Invalid(format!("installer {i}: empty url")));
            }
            if let Some(locale) = &installer.locale {
                if !crate::locale::is_well_formed(locale) {
                    return Err(ManifestError::Invalid(format!(
                        "installer {i}: malformed locale '{locale}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Render back to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Ids and versions become directory names under the pim home.
fn check_path_segment(field: &str, value: &str) -> Result<(), ManifestError> {
    let bad = value.starts_with('.')
        || value
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control());
    if bad {
        return Err(ManifestError::Invalid(format!(
            "{field} '{value}' is not usable as a path component"
        )));
    }
    Ok(())
}
