//! Tab-completion values for command arguments.

use pim_schema::Scope;

use crate::args::{ArgKind, InvocationArgs};
use crate::host::HostEnvironment;
use crate::search::PackageQuery;
use crate::source::{SourceError, SourceSet};

/// What the shell should offer for an argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// These values, already filtered by the partial word.
    Values(Vec<String>),
    /// Nothing to offer.
    Empty,
    /// Print nothing so the shell falls back to its own (file path) completion.
    NoOutput,
}

/// Completion values for `arg` given the partial `word`.
///
/// `context` holds the other arguments already on the command line. Values
/// that come from manifests are taken only from packages matching them, match
/// `word` as a case-insensitive prefix and are returned sorted and
/// deduplicated. An unknown `--source` in `context` is ignored.
///
/// # Errors
///
/// Returns the source error when the only source consulted fails.
pub async fn complete(
    arg: ArgKind,
    word: &str,
    context: &InvocationArgs,
    sources: &SourceSet,
    host: &dyn HostEnvironment,
) -> Result<Completion, SourceError> {
    let values: Vec<String> = match arg {
        ArgKind::Query | ArgKind::Id | ArgKind::Name | ArgKind::Moniker | ArgKind::Version
        | ArgKind::Channel => {
            let mut narrowed = context
                .source
                .as_deref()
                .and_then(|name| sources.restrict(ArgKind::Source, name).ok())
                .unwrap_or_else(|| sources.clone());
            if let Some(header) = &context.custom_header {
                narrowed = narrowed.with_custom_header(header);
            }
            manifest_values(arg, &narrowing_query(arg, context), &narrowed).await?
        }
        ArgKind::Source | ArgKind::DependencySource => sources.names(),
        ArgKind::Scope => Scope::VALID.iter().map(ToString::to_string).collect(),
        ArgKind::Architecture => host
            .applicable_architectures()
            .iter()
            .map(ToString::to_string)
            .collect(),
        ArgKind::Locale => return Ok(Completion::Empty),
        ArgKind::Manifest | ArgKind::Log | ArgKind::InstallLocation => {
            return Ok(Completion::NoOutput);
        }
        ArgKind::CustomHeader
        | ArgKind::Exact
        | ArgKind::Interactive
        | ArgKind::Silent
        | ArgKind::Override
        | ArgKind::HashOverride
        | ArgKind::AcceptPackageAgreements
        | ArgKind::AcceptSourceAgreements => return Ok(Completion::Empty),
    };

    let prefix = word.to_lowercase();
    let mut values: Vec<String> = values
        .into_iter()
        .filter(|v| v.to_lowercase().starts_with(&prefix))
        .collect();
    values.sort();
    values.dedup();

    if values.is_empty() {
        Ok(Completion::Empty)
    } else {
        Ok(Completion::Values(values))
    }
}

/// The query formed by everything on the command line except `arg` itself
/// and the version, which only picks among a package's manifests.
fn narrowing_query(arg: ArgKind, context: &InvocationArgs) -> PackageQuery {
    let mut query = context.package_query();
    query.version = None;
    match arg {
        ArgKind::Query => query.query = None,
        ArgKind::Id => query.id = None,
        ArgKind::Name => query.name = None,
        ArgKind::Moniker => query.moniker = None,
        ArgKind::Channel => query.channel = None,
        _ => {}
    }
    query
}

async fn manifest_values(
    arg: ArgKind,
    query: &PackageQuery,
    sources: &SourceSet,
) -> Result<Vec<String>, SourceError> {
    let mut values = Vec::new();
    for source in sources.iter() {
        let manifests = match source.manifests().await {
            Ok(m) => m,
            Err(e) if sources.iter().count() > 1 => {
                tracing::debug!("Skipping source for completion: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        for m in manifests.iter().filter(|m| query.matches(m).is_some()) {
            match arg {
                ArgKind::Query => {
                    values.push(m.id.to_string());
                    values.push(m.name.clone());
                    values.extend(m.moniker.clone());
                }
                ArgKind::Id => values.push(m.id.to_string()),
                ArgKind::Name => values.push(m.name.clone()),
                ArgKind::Moniker => values.extend(m.moniker.clone()),
                ArgKind::Version => values.push(m.version.to_string()),
                ArgKind::Channel => values.extend(m.channel.clone()),
                _ => {}
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticHost;
    use crate::source::{DirectorySource, Source};
    use std::sync::Arc;

    const HASH: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn write(dir: &std::path::Path, id: &str, moniker: &str, version: &str) {
        std::fs::write(
            dir.join(format!("{id}-{version}.toml")),
            format!(
                "id = \"{id}\"\nname = \"{id}\"\nmoniker = \"{moniker}\"\nversion = \"{version}\"\n\n[[installer]]\narchitecture = \"x64\"\ntype = \"exe\"\nurl = \"https://example.com/a.exe\"\nsha256 = \"{HASH}\"\n"
            ),
        )
        .unwrap();
    }

    fn sources(dir: &std::path::Path) -> SourceSet {
        SourceSet::new(vec![
            Arc::new(DirectorySource::new("main", dir)) as Arc<dyn Source>
        ])
    }

    #[tokio::test]
    async fn ids_complete_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Contoso.Editor", "editor", "1.0");
        write(dir.path(), "Contoso.Editor", "editor", "2.0");
        write(dir.path(), "Fabrikam.Tool", "tool", "1.0");
        let host = StaticHost::x64(dir.path());

        let none = InvocationArgs::default();
        let c = complete(ArgKind::Id, "con", &none, &sources(dir.path()), &host)
            .await
            .unwrap();
        assert_eq!(c, Completion::Values(vec!["Contoso.Editor".into()]));

        let c = complete(ArgKind::Version, "", &none, &sources(dir.path()), &host)
            .await
            .unwrap();
        assert_eq!(c, Completion::Values(vec!["1.0".into(), "2.0".into()]));
    }

    #[tokio::test]
    async fn fixed_domains_and_explicit_variants() {
        let dir = tempfile::tempdir().unwrap();
        let host = StaticHost::x64(dir.path());
        let set = sources(dir.path());
        let none = InvocationArgs::default();

        assert_eq!(
            complete(ArgKind::Scope, "m", &none, &set, &host).await.unwrap(),
            Completion::Values(vec!["machine".into()])
        );
        assert_eq!(
            complete(ArgKind::Source, "", &none, &set, &host).await.unwrap(),
            Completion::Values(vec!["main".into()])
        );
        assert_eq!(
            complete(ArgKind::Locale, "en", &none, &set, &host).await.unwrap(),
            Completion::Empty
        );
        assert_eq!(
            complete(ArgKind::Log, "", &none, &set, &host).await.unwrap(),
            Completion::NoOutput
        );
        assert_eq!(
            complete(ArgKind::InstallLocation, "", &none, &set, &host).await.unwrap(),
            Completion::NoOutput
        );
        assert_eq!(
            complete(ArgKind::Id, "zzz", &none, &set, &host).await.unwrap(),
            Completion::Empty
        );
    }

    #[tokio::test]
    async fn other_arguments_narrow_the_offered_values() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Contoso.Editor", "editor", "1.0");
        write(dir.path(), "Contoso.Editor", "editor", "2.0");
        write(dir.path(), "Fabrikam.Tool", "tool", "3.0");
        let host = StaticHost::x64(dir.path());
        let set = sources(dir.path());

        let editor = InvocationArgs {
            id: Some("Contoso.Editor".into()),
            ..Default::default()
        };
        let c = complete(ArgKind::Version, "", &editor, &set, &host).await.unwrap();
        assert_eq!(c, Completion::Values(vec!["1.0".into(), "2.0".into()]));

        // The argument being completed does not narrow itself.
        let c = complete(ArgKind::Id, "", &editor, &set, &host).await.unwrap();
        assert_eq!(
            c,
            Completion::Values(vec!["Contoso.Editor".into(), "Fabrikam.Tool".into()])
        );

        let tool = InvocationArgs {
            moniker: Some("tool".into()),
            version: Some("9.9".into()),
            ..Default::default()
        };
        let c = complete(ArgKind::Id, "", &tool, &set, &host).await.unwrap();
        assert_eq!(c, Completion::Values(vec!["Fabrikam.Tool".into()]));

        let nothing = InvocationArgs {
            query: Some("nope".into()),
            ..Default::default()
        };
        let c = complete(ArgKind::Version, "", &nothing, &set, &host).await.unwrap();
        assert_eq!(c, Completion::Empty);
    }
}
