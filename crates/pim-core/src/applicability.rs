//! Installer applicability: pick the one installer record that fits this host.
//!
//! Filtering runs as a fixed sequence of stages, each narrowing the candidate
//! list. An empty list after any stage is a failure naming that stage. If more
//! than one record survives every stage, architecture preference breaks the
//! tie; a tie that survives that too is reported as ambiguous rather than
//! guessed. Everything here is pure, so the same manifest and constraints
//! always yield the same outcome.

use pim_schema::locale::LocaleMatch;
use pim_schema::{InstallerRecord, Manifest};
use thiserror::Error;

use crate::args::EffectiveConstraints;

/// Filter stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStage {
    /// Installer technology must support the derived scope.
    InstallerType,
    /// Record architecture must be in the accepted list.
    Architecture,
    /// Record scope must equal the requested scope.
    Scope,
    /// Best locale tier wins.
    Locale,
    /// Host OS must be at least the record's minimum.
    MinimumOsVersion,
}

impl FilterStage {
    /// Lowercase name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstallerType => "installer type",
            Self::Architecture => "architecture",
            Self::Scope => "scope",
            Self::Locale => "locale",
            Self::MinimumOsVersion => "minimum OS version",
        }
    }
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why no single installer could be chosen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicabilityError {
    /// A filter stage left no candidates.
    #[error("No applicable installer for {id}: the {stage} filter eliminated all {remaining} remaining candidates ({constraint})")]
    NoApplicableInstaller {
        /// Package identifier.
        id: String,
        /// Stage that emptied the list.
        stage: FilterStage,
        /// Candidates that entered the eliminating stage.
        remaining: usize,
        /// The constraint the stage applied and where it came from.
        constraint: String,
    },

    /// More than one record survived every stage and the tie-break.
    #[error("Multiple installers for {id} are equally applicable; narrow with --architecture, --scope or --locale")]
    AmbiguousInstallers {
        /// Package identifier.
        id: String,
        /// The tied records, in manifest order.
        installers: Vec<InstallerRecord>,
    },
}

/// The chosen installer and the constraints that matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The selected record.
    pub installer: InstallerRecord,
    /// Position of the record in the manifest.
    pub index: usize,
    /// Position of its architecture in the preference list; 0 is best.
    pub architecture_rank: usize,
    /// Locale grade, when a locale was requested.
    pub locale_match: Option<LocaleMatch>,
}

/// Result of [`select_installer`], kept on the context either way.
pub type SelectionOutcome = Result<Selection, ApplicabilityError>;

#[derive(Debug, Clone)]
struct Candidate<'a> {
    index: usize,
    record: &'a InstallerRecord,
    architecture_rank: usize,
    locale_match: Option<LocaleMatch>,
}

/// Select the single applicable installer from `manifest`.
///
/// # Errors
///
/// Returns [`ApplicabilityError::NoApplicableInstaller`] naming the first
/// stage that leaves no candidates, or
/// [`ApplicabilityError::AmbiguousInstallers`] when the tie-break cannot pick
/// one record.
pub fn select_installer(manifest: &Manifest, constraints: &EffectiveConstraints) -> SelectionOutcome {
    let id = manifest.id.to_string();
    let mut candidates: Vec<Candidate<'_>> = manifest
        .installers
        .iter()
        .enumerate()
        .map(|(index, record)| Candidate {
            index,
            record,
            architecture_rank: usize::MAX,
            locale_match: None,
        })
        .collect();

    let kept = candidates
        .iter()
        .filter(|c| {
            c.record
                .installer_type
                .supports_scope(constraints.derived_scope)
        })
        .cloned()
        .collect();
    candidates = narrow(&id, FilterStage::InstallerType, constraints, candidates, kept)?;

    // Architecture, ranked by preference.
    let kept = candidates
        .iter()
        .filter_map(|c| {
            let rank = constraints
                .architectures
                .iter()
                .position(|a| *a == c.record.architecture)?;
            Some(Candidate {
                architecture_rank: rank,
                ..c.clone()
            })
        })
        .collect();
    candidates = narrow(&id, FilterStage::Architecture, constraints, candidates, kept)?;

    // Scope, exact when requested.
    let kept = candidates
        .iter()
        .filter(|c| constraints.scope.is_none_or(|scope| c.record.scope == scope))
        .cloned()
        .collect();
    candidates = narrow(&id, FilterStage::Scope, constraints, candidates, kept)?;

    let kept = filter_locale(&candidates, manifest, constraints.locale.as_deref());
    candidates = narrow(&id, FilterStage::Locale, constraints, candidates, kept)?;

    let kept = candidates
        .iter()
        .filter(|c| {
            c.record
                .minimum_os_version
                .is_none_or(|min| min <= constraints.os_version)
        })
        .cloned()
        .collect();
    candidates = narrow(&id, FilterStage::MinimumOsVersion, constraints, candidates, kept)?;

    tie_break(id, candidates)
}

fn narrow<'a>(
    id: &str,
    stage: FilterStage,
    constraints: &EffectiveConstraints,
    before: Vec<Candidate<'a>>,
    after: Vec<Candidate<'a>>,
) -> Result<Vec<Candidate<'a>>, ApplicabilityError> {
    tracing::trace!("{stage} filter: {} -> {}", before.len(), after.len());
    if after.is_empty() {
        Err(ApplicabilityError::NoApplicableInstaller {
            id: id.to_string(),
            stage,
            remaining: before.len(),
            constraint: describe_constraint(stage, constraints),
        })
    } else {
        Ok(after)
    }
}

fn describe_constraint(stage: FilterStage, constraints: &EffectiveConstraints) -> String {
    match stage {
        FilterStage::InstallerType => match constraints.scope {
            Some(scope) => format!("--scope {scope}"),
            None => format!("{} scope from current privileges", constraints.derived_scope),
        },
        FilterStage::Architecture => {
            let archs: Vec<String> = constraints
                .architectures
                .iter()
                .map(ToString::to_string)
                .collect();
            if constraints.architecture_requested {
                format!("--architecture {}", archs.join(", "))
            } else {
                format!("this host runs {}", archs.join(", "))
            }
        }
        FilterStage::Scope => constraints
            .scope
            .map_or_else(|| "any scope".to_string(), |scope| format!("--scope {scope}")),
        FilterStage::Locale => constraints
            .locale
            .as_ref()
            .map_or_else(|| "any locale".to_string(), |locale| format!("--locale {locale}")),
        FilterStage::MinimumOsVersion => format!("host OS {}", constraints.os_version),
    }
}

/// Keep the best locale tier present among the candidates.
fn filter_locale<'a>(
    candidates: &[Candidate<'a>],
    manifest: &Manifest,
    requested: Option<&str>,
) -> Vec<Candidate<'a>> {
    match requested {
        Some(requested) => {
            let graded: Vec<Candidate<'a>> = candidates
                .iter()
                .map(|c| Candidate {
                    locale_match: Some(LocaleMatch::grade(requested, c.record.locale.as_deref())),
                    ..c.clone()
                })
                .collect();
            let best = graded
                .iter()
                .filter_map(|c| c.locale_match)
                .filter(|m| *m != LocaleMatch::Mismatch)
                .min();
            match best {
                Some(best) => graded
                    .into_iter()
                    .filter(|c| c.locale_match == Some(best))
                    .collect(),
                None => Vec::new(),
            }
        }
        None => {
            let preferred: Vec<Candidate<'a>> = candidates
                .iter()
                .filter(|c| match (&c.record.locale, &manifest.default_locale) {
                    (None, _) => true,
                    (Some(tag), Some(default)) => tag.eq_ignore_ascii_case(default),
                    (Some(_), None) => false,
                })
                .cloned()
                .collect();
            if preferred.is_empty() {
                candidates.to_vec()
            } else {
                preferred
            }
        }
    }
}

fn tie_break(id: String, candidates: Vec<Candidate<'_>>) -> SelectionOutcome {
    let best_rank = candidates
        .iter()
        .map(|c| c.architecture_rank)
        .min()
        .unwrap_or(usize::MAX);

    let mut finalists: Vec<Candidate<'_>> = Vec::new();
    for c in candidates.into_iter().filter(|c| c.architecture_rank == best_rank) {
        // Byte-for-byte duplicate records are one installer.
        if !finalists.iter().any(|f| f.record == c.record) {
            finalists.push(c);
        }
    }

    match finalists.as_slice() {
        [only] => Ok(Selection {
            installer: only.record.clone(),
            index: only.index,
            architecture_rank: only.architecture_rank,
            locale_match: only.locale_match,
        }),
        _ => Err(ApplicabilityError::AmbiguousInstallers {
            id,
            installers: finalists.into_iter().map(|c| c.record.clone()).collect(),
        }),
    }
}
