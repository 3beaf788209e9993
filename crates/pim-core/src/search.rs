//! Manifest resolution: turn a query or manifest path into exactly one manifest.

use std::collections::HashMap;

use pim_schema::{Manifest, ManifestError, PackageId, Version, compare_versions};
use thiserror::Error;

use crate::args::PackageRequest;
use crate::error::exit_code;
use crate::source::{SourceError, SourceSet};

/// Query fields for a source search. Every supplied field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageQuery {
    /// Free text matched against id, name and moniker.
    pub query: Option<String>,
    /// Matched against the package id.
    pub id: Option<String>,
    /// Matched against the package name.
    pub name: Option<String>,
    /// Matched against the moniker.
    pub moniker: Option<String>,
    /// Picks a version once a package is chosen; never filters packages.
    pub version: Option<String>,
    /// Release channel; always a whole-string match.
    pub channel: Option<String>,
    /// Case-sensitive full-string equality instead of case-insensitive substring.
    pub exact: bool,
}

/// How well a package matched. Declared best-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
    /// Every supplied field equals its target, ignoring case.
    Full,
    /// At least one field matched as a substring only.
    Partial,
}

impl PackageQuery {
    fn match_field(&self, wanted: &str, actual: &str) -> Option<MatchKind> {
        if self.exact {
            return (actual == wanted).then_some(MatchKind::Full);
        }
        if actual.eq_ignore_ascii_case(wanted) {
            Some(MatchKind::Full)
        } else if actual.to_lowercase().contains(&wanted.to_lowercase()) {
            Some(MatchKind::Partial)
        } else {
            None
        }
    }

    /// Grade `manifest` against the identity fields and channel. The version
    /// field is applied later, per package.
    pub fn matches(&self, manifest: &Manifest) -> Option<MatchKind> {
        let mut grades = Vec::new();

        if let Some(q) = &self.query {
            let best = [
                Some(manifest.id.as_str()),
                Some(manifest.name.as_str()),
                manifest.moniker.as_deref(),
            ]
            .into_iter()
            .flatten()
            .filter_map(|field| self.match_field(q, field))
            .min()?;
            grades.push(best);
        }
        if let Some(id) = &self.id {
            grades.push(self.match_field(id, manifest.id.as_str())?);
        }
        if let Some(name) = &self.name {
            grades.push(self.match_field(name, &manifest.name)?);
        }
        if let Some(moniker) = &self.moniker {
            grades.push(self.match_field(moniker, manifest.moniker.as_deref()?)?);
        }
        if let Some(channel) = &self.channel {
            let actual = manifest.channel.as_deref()?;
            let same = if self.exact {
                actual == channel
            } else {
                actual.eq_ignore_ascii_case(channel)
            };
            if !same {
                return None;
            }
        }

        Some(grades.into_iter().max().unwrap_or(MatchKind::Partial))
    }

    /// Human description for error messages.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            ("query", &self.query),
            ("id", &self.id),
            ("name", &self.name),
            ("moniker", &self.moniker),
            ("version", &self.version),
            ("channel", &self.channel),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label} '{v}'")))
        .collect();

        if parts.is_empty() {
            "any package".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// One package found by a search, summarized for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Package id.
    pub id: PackageId,
    /// Display name.
    pub name: String,
    /// Newest available version.
    pub version: Version,
    /// Source the package came from.
    pub source: String,
    /// How well it matched.
    pub match_kind: MatchKind,
}

/// A package and every matching version of it from a single source.
#[derive(Debug, Clone)]
pub struct PackageMatch {
    /// Display summary.
    pub candidate: Candidate,
    /// Newest first.
    pub versions: Vec<Manifest>,
}

/// Why a request did not resolve to one manifest.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// Nothing matched.
    #[error("No package found matching {query}")]
    NoMatchFound {
        /// Description of the query.
        query: String,
    },

    /// More than one package matched and none exactly.
    #[error("Multiple packages found matching {query}; refine the query")]
    AmbiguousQuery {
        /// Description of the query.
        query: String,
        /// Every matching package.
        candidates: Vec<Candidate>,
    },

    /// A `--manifest` file could not be loaded.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Every source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl ResolutionError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoMatchFound { .. } => exit_code::NO_MATCH_FOUND,
            Self::AmbiguousQuery { .. } => exit_code::AMBIGUOUS_QUERY,
            Self::Manifest(_) => exit_code::MANIFEST_PARSE,
            Self::Source(_) => exit_code::INFRASTRUCTURE,
        }
    }
}

/// Search every source in order, merging results by package identity.
///
/// A package offered by several sources is taken from the first one that
/// has it. Sources that fail are skipped with a warning unless all of them
/// fail.
///
/// # Errors
///
/// Returns [`ResolutionError::Source`] when every source fails.
pub async fn search(
    sources: &SourceSet,
    query: &PackageQuery,
) -> Result<Vec<PackageMatch>, ResolutionError> {
    let mut results: Vec<PackageMatch> = Vec::new();
    let mut owner: HashMap<String, (usize, String)> = HashMap::new();
    let mut first_error = None;
    let mut any_ok = false;

    for source in sources.iter() {
        let manifests = match source.manifests().await {
            Ok(m) => {
                any_ok = true;
                m
            }
            Err(e) => {
                tracing::warn!("{e}");
                first_error.get_or_insert(e);
                continue;
            }
        };

        for manifest in manifests.iter() {
            let Some(kind) = query.matches(manifest) else {
                continue;
            };
            let key = manifest.id.as_str().to_lowercase();
            match owner.get(&key) {
                Some((idx, from)) if from == source.name() => {
                    let hit = &mut results[*idx];
                    hit.candidate.match_kind = hit.candidate.match_kind.min(kind);
                    hit.versions.push(manifest.clone());
                }
                Some((_, from)) => {
                    tracing::trace!(
                        "{} from '{}' shadowed by '{from}'",
                        manifest.id,
                        source.name()
                    );
                }
                None => {
                    owner.insert(key, (results.len(), source.name().to_string()));
                    results.push(PackageMatch {
                        candidate: Candidate {
                            id: manifest.id.clone(),
                            name: manifest.name.clone(),
                            version: manifest.version.clone(),
                            source: source.name().to_string(),
                            match_kind: kind,
                        },
                        versions: vec![manifest.clone()],
                    });
                }
            }
        }
    }

    if !any_ok {
        if let Some(e) = first_error {
            return Err(e.into());
        }
    }

    for hit in &mut results {
        hit.versions
            .sort_by(|a, b| compare_versions(b.version.as_str(), a.version.as_str()));
        hit.candidate.version = hit.versions[0].version.clone();
    }

    Ok(results)
}

/// Resolve a request to exactly one manifest.
///
/// # Errors
///
/// Returns [`ResolutionError::NoMatchFound`] or
/// [`ResolutionError::AmbiguousQuery`] for queries, and
/// [`ResolutionError::Manifest`] for a manifest file that fails to load.
pub async fn resolve_manifest(
    request: &PackageRequest,
    sources: &SourceSet,
) -> Result<Manifest, ResolutionError> {
    match request {
        PackageRequest::Manifest(path) => {
            let content =
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ManifestError::Io {
                        path: path.display().to_string(),
                        source,
                    })?;
            Ok(Manifest::parse(&content)?)
        }
        PackageRequest::Query(query) => {
            let mut matches = search(sources, query).await?;
            if let Some(version) = &query.version {
                matches.retain(|m| find_version(&m.versions, version).is_some());
            }
            let package = pick_single(query, matches)?;
            select_version(query, package)
        }
    }
}

fn find_version<'a>(versions: &'a [Manifest], wanted: &str) -> Option<&'a Manifest> {
    versions
        .iter()
        .find(|m| m.version.as_str() == wanted)
        .or_else(|| {
            versions
                .iter()
                .find(|m| compare_versions(m.version.as_str(), wanted).is_eq())
        })
}

fn pick_single(
    query: &PackageQuery,
    mut matches: Vec<PackageMatch>,
) -> Result<PackageMatch, ResolutionError> {
    if matches.len() > 1 {
        let full: Vec<usize> = matches
            .iter()
            .enumerate()
            .filter(|(_, m)| m.candidate.match_kind == MatchKind::Full)
            .map(|(i, _)| i)
            .collect();
        if let [only] = full[..] {
            tracing::debug!(
                "{} is the only full match among {} candidates",
                matches[only].candidate.id,
                matches.len()
            );
            return Ok(matches.swap_remove(only));
        }
        return Err(ResolutionError::AmbiguousQuery {
            query: query.describe(),
            candidates: matches.into_iter().map(|m| m.candidate).collect(),
        });
    }

    matches
        .pop()
        .ok_or_else(|| ResolutionError::NoMatchFound {
            query: query.describe(),
        })
}

fn select_version(
    query: &PackageQuery,
    package: PackageMatch,
) -> Result<Manifest, ResolutionError> {
    match &query.version {
        Some(wanted) => find_version(&package.versions, wanted)
            .cloned()
            .ok_or_else(|| ResolutionError::NoMatchFound {
                query: query.describe(),
            }),
        None => package
            .versions
            .into_iter()
            .next()
            .ok_or_else(|| ResolutionError::NoMatchFound {
                query: query.describe(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;
    use async_trait::async_trait;
    use std::sync::Arc;

    const HASH: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn manifest(id: &str, name: &str, version: &str) -> Manifest {
        Manifest::parse(&format!(
            "id = \"{id}\"\nname = \"{name}\"\nmoniker = \"{}\"\nversion = \"{version}\"\n\n[[installer]]\narchitecture = \"x64\"\ntype = \"exe\"\nurl = \"https://example.com/{id}.exe\"\nsha256 = \"{HASH}\"\n",
            name.to_lowercase()
        ))
        .unwrap()
    }

    #[derive(Debug)]
    struct Fixed {
        name: &'static str,
        manifests: Arc<Vec<Manifest>>,
    }

    #[async_trait]
    impl Source for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        async fn manifests(&self) -> Result<Arc<Vec<Manifest>>, SourceError> {
            Ok(Arc::clone(&self.manifests))
        }
    }

    #[derive(Debug)]
    struct Down;

    #[async_trait]
    impl Source for Down {
        fn name(&self) -> &str {
            "down"
        }
        async fn manifests(&self) -> Result<Arc<Vec<Manifest>>, SourceError> {
            Err(SourceError::Unavailable {
                source_name: "down".into(),
                message: "offline".into(),
            })
        }
    }

    fn set(sources: Vec<(&'static str, Vec<Manifest>)>) -> SourceSet {
        SourceSet::new(
            sources
                .into_iter()
                .map(|(name, m)| {
                    Arc::new(Fixed {
                        name,
                        manifests: Arc::new(m),
                    }) as Arc<dyn Source>
                })
                .collect(),
        )
    }

    fn query(text: &str) -> PackageRequest {
        PackageRequest::Query(PackageQuery {
            query: Some(text.into()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn single_substring_match_resolves() {
        let sources = set(vec![(
            "main",
            vec![manifest("Contoso.Editor", "Editor", "1.0")],
        )]);
        let m = resolve_manifest(&query("edit"), &sources).await.unwrap();
        assert_eq!(m.id.as_str(), "Contoso.Editor");
    }

    #[tokio::test]
    async fn newest_version_wins_unless_pinned() {
        let sources = set(vec![(
            "main",
            vec![
                manifest("Contoso.Editor", "Editor", "1.9"),
                manifest("Contoso.Editor", "Editor", "1.10"),
            ],
        )]);
        let latest = resolve_manifest(&query("Contoso.Editor"), &sources)
            .await
            .unwrap();
        assert_eq!(latest.version.as_str(), "1.10");

        let pinned = PackageRequest::Query(PackageQuery {
            id: Some("Contoso.Editor".into()),
            version: Some("1.9".into()),
            ..Default::default()
        });
        let m = resolve_manifest(&pinned, &sources).await.unwrap();
        assert_eq!(m.version.as_str(), "1.9");
    }

    #[tokio::test]
    async fn missing_version_is_no_match() {
        let sources = set(vec![("main", vec![manifest("A.App", "App", "1.0")])]);
        let request = PackageRequest::Query(PackageQuery {
            id: Some("A.App".into()),
            version: Some("2.0".into()),
            ..Default::default()
        });
        assert!(matches!(
            resolve_manifest(&request, &sources).await,
            Err(ResolutionError::NoMatchFound { .. })
        ));
    }

    #[tokio::test]
    async fn zero_candidates_is_no_match() {
        let sources = set(vec![("main", vec![manifest("A.App", "App", "1.0")])]);
        let err = resolve_manifest(&query("zzz"), &sources).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NoMatchFound { .. }));
        assert_eq!(err.exit_code(), exit_code::NO_MATCH_FOUND);
    }

    #[tokio::test]
    async fn several_partial_matches_are_ambiguous_with_candidates() {
        let sources = set(vec![(
            "main",
            vec![
                manifest("Contoso.Editor", "Editor", "1.0"),
                manifest("Fabrikam.Editor", "Editor Pro", "2.0"),
            ],
        )]);
        match resolve_manifest(&query("edi"), &sources).await {
            Err(ResolutionError::AmbiguousQuery { candidates, .. }) => {
                let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, vec!["Contoso.Editor", "Fabrikam.Editor"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_single_full_match_beats_partial_ones() {
        let sources = set(vec![(
            "main",
            vec![
                manifest("Contoso.Editor", "Editor", "1.0"),
                manifest("Fabrikam.EditorPro", "Editor Pro", "2.0"),
            ],
        )]);
        let m = resolve_manifest(&query("editor"), &sources).await.unwrap();
        assert_eq!(m.id.as_str(), "Contoso.Editor");
    }

    #[tokio::test]
    async fn exact_mode_is_case_sensitive() {
        let sources = set(vec![("main", vec![manifest("Contoso.Editor", "Editor", "1.0")])]);
        let request = PackageRequest::Query(PackageQuery {
            id: Some("contoso.editor".into()),
            exact: true,
            ..Default::default()
        });
        assert!(matches!(
            resolve_manifest(&request, &sources).await,
            Err(ResolutionError::NoMatchFound { .. })
        ));

        let request = PackageRequest::Query(PackageQuery {
            id: Some("Contoso.Editor".into()),
            exact: true,
            ..Default::default()
        });
        assert!(resolve_manifest(&request, &sources).await.is_ok());
    }

    #[tokio::test]
    async fn first_source_wins_on_duplicate_identity() {
        let sources = set(vec![
            ("first", vec![manifest("Contoso.Editor", "Editor", "1.0")]),
            ("second", vec![manifest("contoso.editor", "Editor", "9.0")]),
        ]);
        let hits = search(
            &sources,
            &PackageQuery {
                query: Some("editor".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].candidate.source, "first");
        assert_eq!(hits[0].candidate.version.as_str(), "1.0");
    }

    #[tokio::test]
    async fn failing_source_is_skipped_when_others_answer() {
        let mut sources: Vec<Arc<dyn Source>> = vec![Arc::new(Down)];
        sources.extend(
            set(vec![("main", vec![manifest("A.App", "App", "1.0")])])
                .iter()
                .cloned(),
        );
        let sources = SourceSet::new(sources);
        assert!(resolve_manifest(&query("A.App"), &sources).await.is_ok());

        let only_down = SourceSet::new(vec![Arc::new(Down)]);
        assert!(matches!(
            resolve_manifest(&query("A.App"), &only_down).await,
            Err(ResolutionError::Source(_))
        ));
    }

    #[tokio::test]
    async fn explicit_manifest_parse_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "id = 1").unwrap();
        let err = resolve_manifest(&PackageRequest::Manifest(path), &SourceSet::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Manifest(_)));
        assert_eq!(err.exit_code(), exit_code::MANIFEST_PARSE);
    }

    #[test]
    fn channel_must_match_when_requested() {
        let mut m = manifest("A.App", "App", "1.0");
        let q = PackageQuery {
            channel: Some("beta".into()),
            ..Default::default()
        };
        assert_eq!(q.matches(&m), None);
        m.channel = Some("Beta".into());
        assert_eq!(q.matches(&m), Some(MatchKind::Partial));
    }
}
