//! Package sources.
//!
//! A source hands out a read-only snapshot of the manifests it knows about;
//! matching a query against them happens in [`crate::search`] so every source
//! gets identical exact/substring semantics.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pim_schema::Manifest;
use thiserror::Error;
use tokio::sync::OnceCell;
use walkdir::WalkDir;

use crate::args::ArgKind;
use crate::validate::ValidationError;

/// Request header that carries the `--header` value to index sources.
pub const CUSTOM_HEADER_NAME: &str = "Pim-Custom-Header";

/// Errors fetching manifests from a source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source cannot be read at all.
    #[error("Source '{source_name}' is unavailable: {message}")]
    Unavailable {
        /// Configured source name.
        source_name: String,
        /// What went wrong.
        message: String,
    },

    /// The index request failed or returned an error status.
    #[error("HTTP error from source '{source_name}': {error}")]
    Http {
        /// Configured source name.
        source_name: String,
        /// Underlying client error.
        error: reqwest::Error,
    },
}

/// A place manifests come from.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Configured name.
    fn name(&self) -> &str;

    /// Terms the user must accept before this source is queried.
    fn agreements(&self) -> &[String] {
        &[]
    }

    /// A fresh copy of this source that sends `header` with its requests, or
    /// `None` when the source makes no requests.
    fn with_custom_header(&self, _header: &str) -> Option<Arc<dyn Source>> {
        None
    }

    /// Every manifest the source offers. Implementations fetch at most once
    /// per instance and hand out the same snapshot afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the source cannot be read.
    async fn manifests(&self) -> Result<Arc<Vec<Manifest>>, SourceError>;
}

/// A directory tree of `*.toml` manifests.
#[derive(Debug)]
pub struct DirectorySource {
    name: String,
    root: PathBuf,
    agreements: Vec<String>,
    snapshot: OnceCell<Arc<Vec<Manifest>>>,
}

impl DirectorySource {
    /// A source scanning `root` recursively.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            agreements: Vec::new(),
            snapshot: OnceCell::new(),
        }
    }

    /// Same source, requiring `agreements` to be accepted.
    #[must_use]
    pub fn with_agreements(mut self, agreements: Vec<String>) -> Self {
        self.agreements = agreements;
        self
    }

    fn scan(name: &str, root: &Path) -> Result<Vec<Manifest>, SourceError> {
        if !root.is_dir() {
            return Err(SourceError::Unavailable {
                source_name: name.to_string(),
                message: format!("{} is not a directory", root.display()),
            });
        }

        let mut manifests = Vec::new();
        let mut paths: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        // Directory iteration order is filesystem-dependent
        paths.sort();

        for path in paths {
            match Manifest::from_file(&path) {
                Ok(m) => manifests.push(m),
                Err(e) => tracing::warn!("Skipping {}: {e}", path.display()),
            }
        }
        tracing::debug!("Source '{name}' loaded {} manifests", manifests.len());
        Ok(manifests)
    }
}

#[async_trait]
impl Source for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn agreements(&self) -> &[String] {
        &self.agreements
    }

    async fn manifests(&self) -> Result<Arc<Vec<Manifest>>, SourceError> {
        self.snapshot
            .get_or_try_init(|| async {
                let name = self.name.clone();
                let root = self.root.clone();
                let manifests = tokio::task::spawn_blocking(move || Self::scan(&name, &root))
                    .await
                    .map_err(|e| SourceError::Unavailable {
                        source_name: self.name.clone(),
                        message: e.to_string(),
                    })??;
                Ok::<_, SourceError>(Arc::new(manifests))
            })
            .await
            .cloned()
    }
}

/// An HTTP endpoint serving a JSON array of manifests.
#[derive(Debug)]
pub struct IndexSource {
    name: String,
    url: String,
    client: reqwest::Client,
    agreements: Vec<String>,
    custom_header: Option<String>,
    snapshot: OnceCell<Arc<Vec<Manifest>>>,
}

impl IndexSource {
    /// A source fetching `url` with `client`.
    pub fn new(name: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
            agreements: Vec::new(),
            custom_header: None,
            snapshot: OnceCell::new(),
        }
    }

    /// Same source, requiring `agreements` to be accepted.
    #[must_use]
    pub fn with_agreements(mut self, agreements: Vec<String>) -> Self {
        self.agreements = agreements;
        self
    }

    async fn fetch(&self) -> Result<Vec<Manifest>, SourceError> {
        let http = |error| SourceError::Http {
            source_name: self.name.clone(),
            error,
        };

        let mut request = self
            .client
            .get(&self.url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT);
        if let Some(header) = &self.custom_header {
            request = request.header(CUSTOM_HEADER_NAME, header.as_str());
        }

        let entries: Vec<serde_json::Value> = request
            .send()
            .await
            .map_err(http)?
            .error_for_status()
            .map_err(http)?
            .json()
            .await
            .map_err(http)?;

        let total = entries.len();
        let mut manifests = Vec::with_capacity(total);
        for (i, entry) in entries.into_iter().enumerate() {
            let parsed = serde_json::from_value::<Manifest>(entry)
                .map_err(|e| e.to_string())
                .and_then(|m| m.validate().map(|()| m).map_err(|e| e.to_string()));
            match parsed {
                Ok(m) => manifests.push(m),
                Err(e) => tracing::warn!("Source '{}' entry {i} skipped: {e}", self.name),
            }
        }
        tracing::debug!(
            "Source '{}' loaded {} of {total} manifests",
            self.name,
            manifests.len()
        );
        Ok(manifests)
    }
}

#[async_trait]
impl Source for IndexSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn agreements(&self) -> &[String] {
        &self.agreements
    }

    fn with_custom_header(&self, header: &str) -> Option<Arc<dyn Source>> {
        Some(Arc::new(Self {
            name: self.name.clone(),
            url: self.url.clone(),
            client: self.client.clone(),
            agreements: self.agreements.clone(),
            custom_header: Some(header.to_string()),
            snapshot: OnceCell::new(),
        }))
    }

    async fn manifests(&self) -> Result<Arc<Vec<Manifest>>, SourceError> {
        self.snapshot
            .get_or_try_init(|| async { self.fetch().await.map(Arc::new) })
            .await
            .cloned()
    }
}

/// Configured sources in precedence order.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceSet {
    /// Sources in precedence order, first wins.
    pub fn new(sources: Vec<Arc<dyn Source>>) -> Self {
        Self { sources }
    }

    /// Sources in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Configured names in precedence order.
    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Whether no source is configured.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Same sources, with `header` sent by every source that makes requests.
    #[must_use]
    pub fn with_custom_header(&self, header: &str) -> Self {
        let sources = self
            .sources
            .iter()
            .map(|s| s.with_custom_header(header).unwrap_or_else(|| Arc::clone(s)))
            .collect();
        Self { sources }
    }

    /// Narrow to the source called `name` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidArgumentValue`] listing the
    /// configured names when none matches.
    pub fn restrict(&self, argument: ArgKind, name: &str) -> Result<Self, ValidationError> {
        self.sources
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
            .map(|s| Self::new(vec![Arc::clone(s)]))
            .ok_or_else(|| ValidationError::invalid_value(argument, name, self.names()))
    }
}
