//! User settings: `settings.toml` in the pim home directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pim_core::source::{DirectorySource, IndexSource, Source, SourceSet};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Source '{0}' is configured more than once")]
    DuplicateSource(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A local directory tree of manifest files.
    Directory,
    /// An HTTP(S) URL serving a JSON array of manifests.
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    /// Directory path or URL, depending on `kind`.
    pub location: String,
    /// Terms shown before the source is used; `--accept-source-agreements`
    /// accepts them.
    #[serde(default)]
    pub agreements: Vec<String>,
}

/// Parsed settings. Source order is precedence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,

    /// Directory relative source locations resolve against.
    #[serde(skip)]
    base: PathBuf,
}

impl Settings {
    /// Load settings from `path`. A missing file means no sources.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {}", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut settings = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        settings.check()?;
        Ok(settings)
    }

    fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn check(&self) -> Result<(), ConfigError> {
        for (i, s) in self.sources.iter().enumerate() {
            if self.sources[..i]
                .iter()
                .any(|prev| prev.name.eq_ignore_ascii_case(&s.name))
            {
                return Err(ConfigError::DuplicateSource(s.name.clone()));
            }
        }
        Ok(())
    }

    /// Build the configured sources in order.
    pub fn source_set(&self, client: &reqwest::Client) -> SourceSet {
        let sources = self
            .sources
            .iter()
            .map(|s| -> Arc<dyn Source> {
                match s.kind {
                    SourceKind::Directory => Arc::new(
                        DirectorySource::new(&s.name, self.base.join(&s.location))
                            .with_agreements(s.agreements.clone()),
                    ),
                    SourceKind::Index => Arc::new(
                        IndexSource::new(&s.name, &s.location, client.clone())
                            .with_agreements(s.agreements.clone()),
                    ),
                }
            })
            .collect();
        SourceSet::new(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_has_no_sources() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.toml")).unwrap();
        assert!(settings.sources.is_empty());
        assert!(settings.source_set(&reqwest::Client::new()).is_empty());
    }

    #[test]
    fn sources_keep_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
[[source]]
name = "local"
kind = "directory"
location = "manifests"

[[source]]
name = "community"
kind = "index"
location = "https://example.com/index.json"
agreements = ["Community terms apply"]
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.sources[0].kind, SourceKind::Directory);
        assert_eq!(settings.sources[1].kind, SourceKind::Index);
        let set = settings.source_set(&reqwest::Client::new());
        assert_eq!(set.names(), vec!["local", "community"]);
        let agreements: Vec<usize> = set.iter().map(|s| s.agreements().len()).collect();
        assert_eq!(agreements, vec![0, 1]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[[source]]\nname = \"a\"\nkind = \"directory\"\nlocation = \"x\"\n\n[[source]]\nname = \"A\"\nkind = \"directory\"\nlocation = \"y\"\n",
        )
        .unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::DuplicateSource(name)) if name == "A"
        ));
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[[source]]\nname = \"a\"\nkind = \"ftp\"\nlocation = \"x\"\n")
            .unwrap();
        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse { .. })));
    }
}
