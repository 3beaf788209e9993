//! Argument constraint validation.
//!
//! Runs once over the parsed arguments before any pipeline step. It raises or
//! it doesn't; it never touches an execution context.

use pim_schema::{Arch, Scope, locale};
use thiserror::Error;

use crate::args::{ArgKind, InvocationArgs};
use crate::host::HostEnvironment;

/// Longest accepted `--header` value.
pub const MAX_CUSTOM_HEADER_LEN: usize = 1024;

/// A semantic problem with the supplied arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `--manifest` was combined with a query-shaping argument.
    #[error("--manifest cannot be combined with search arguments (query, id, name, moniker, version, channel, source, exact)")]
    ManifestAndQueryConflict,

    /// A value lies outside its argument's domain.
    #[error("{}", invalid_value_message(argument, value, valid))]
    InvalidArgumentValue {
        /// Option name without dashes.
        argument: String,
        /// Rejected value.
        value: String,
        /// Accepted values; empty when the domain is unbounded.
        valid: Vec<String>,
    },

    /// Nothing identifies the package to act on.
    #[error("Specify a package with a query, --id, --name, --moniker or --manifest")]
    MissingPackage,
}

fn invalid_value_message(argument: &str, value: &str, valid: &[String]) -> String {
    if valid.is_empty() {
        format!("Invalid value '{value}' for --{argument}")
    } else {
        format!(
            "Invalid value '{value}' for --{argument}. Valid values: {}",
            valid.join(", ")
        )
    }
}

impl ValidationError {
    /// Shorthand for an [`InvalidArgumentValue`](Self::InvalidArgumentValue).
    pub fn invalid_value(argument: ArgKind, value: &str, valid: Vec<String>) -> Self {
        Self::InvalidArgumentValue {
            argument: argument.name().to_string(),
            value: value.to_string(),
            valid,
        }
    }
}

/// Check mutual exclusions and value domains.
///
/// The architecture domain is whatever `host` reports as applicable, so the
/// error's candidate list always equals the host's list.
///
/// # Errors
///
/// Returns [`ValidationError::ManifestAndQueryConflict`] or the first
/// [`ValidationError::InvalidArgumentValue`] found.
pub fn validate_arguments(
    args: &InvocationArgs,
    host: &dyn HostEnvironment,
) -> Result<(), ValidationError> {
    if args.contains(ArgKind::Manifest)
        && ArgKind::QUERY_SHAPING.iter().any(|kind| args.contains(*kind))
    {
        return Err(ValidationError::ManifestAndQueryConflict);
    }

    if let Some(scope) = &args.scope {
        if Scope::parse_arg(scope) == Scope::Unknown {
            return Err(ValidationError::invalid_value(
                ArgKind::Scope,
                scope,
                Scope::VALID.iter().map(ToString::to_string).collect(),
            ));
        }
    }

    if let Some(arch) = &args.architecture {
        let applicable = arch
            .parse::<Arch>()
            .is_ok_and(|parsed| host.is_applicable(parsed));
        if !applicable {
            return Err(ValidationError::invalid_value(
                ArgKind::Architecture,
                arch,
                host.applicable_architectures()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            ));
        }
    }

    if let Some(tag) = &args.locale {
        if !locale::is_well_formed(tag) {
            return Err(ValidationError::invalid_value(ArgKind::Locale, tag, Vec::new()));
        }
    }

    if let Some(header) = &args.custom_header {
        if header.len() > MAX_CUSTOM_HEADER_LEN
            || reqwest::header::HeaderValue::from_str(header).is_err()
        {
            return Err(ValidationError::invalid_value(
                ArgKind::CustomHeader,
                header,
                Vec::new(),
            ));
        }
    }

    Ok(())
}

/// Commands that act on exactly one package need something to look it up by.
///
/// # Errors
///
/// Returns [`ValidationError::MissingPackage`] when no query, id, name,
/// moniker or manifest was given.
pub fn require_package(args: &InvocationArgs) -> Result<(), ValidationError> {
    let has_target = [
        ArgKind::Manifest,
        ArgKind::Query,
        ArgKind::Id,
        ArgKind::Name,
        ArgKind::Moniker,
    ]
    .iter()
    .any(|kind| args.contains(*kind));

    if has_target {
        Ok(())
    } else {
        Err(ValidationError::MissingPackage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticHost;
    use std::path::PathBuf;

    fn host() -> StaticHost {
        StaticHost::x64("/r")
    }

    fn with_manifest() -> InvocationArgs {
        InvocationArgs {
            manifest: Some(PathBuf::from("pkg.toml")),
            ..Default::default()
        }
    }

    #[test]
    fn manifest_conflicts_with_every_query_field() {
        let cases: Vec<fn(&mut InvocationArgs)> = vec![
            |a| a.query = Some("editor".into()),
            |a| a.id = Some("Contoso.Editor".into()),
            |a| a.name = Some("Editor".into()),
            |a| a.moniker = Some("ed".into()),
            |a| a.version = Some("1.0".into()),
            |a| a.channel = Some("beta".into()),
            |a| a.source = Some("main".into()),
            |a| a.exact = true,
        ];
        for set in cases {
            let mut args = with_manifest();
            set(&mut args);
            assert_eq!(
                validate_arguments(&args, &host()),
                Err(ValidationError::ManifestAndQueryConflict)
            );
        }
    }

    #[test]
    fn manifest_alone_is_fine() {
        assert_eq!(validate_arguments(&with_manifest(), &host()), Ok(()));
    }

    #[test]
    fn bad_scope_lists_valid_values() {
        let args = InvocationArgs {
            scope: Some("system".into()),
            ..Default::default()
        };
        match validate_arguments(&args, &host()) {
            Err(ValidationError::InvalidArgumentValue { argument, valid, .. }) => {
                assert_eq!(argument, "scope");
                assert_eq!(valid, vec!["user".to_string(), "machine".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn architecture_candidates_equal_host_set() {
        let host = host().with_architectures(vec![Arch::X64, Arch::Neutral]);
        for bad in ["arm64", "x86", "pdp11", "unknown"] {
            let args = InvocationArgs {
                architecture: Some(bad.into()),
                ..Default::default()
            };
            match validate_arguments(&args, &host) {
                Err(ValidationError::InvalidArgumentValue { valid, .. }) => {
                    assert_eq!(valid, vec!["x64".to_string(), "neutral".to_string()]);
                }
                other => panic!("{bad}: unexpected {other:?}"),
            }
        }

        let ok = InvocationArgs {
            architecture: Some("amd64".into()),
            ..Default::default()
        };
        assert_eq!(validate_arguments(&ok, &host), Ok(()));
    }

    #[test]
    fn malformed_locale_has_no_candidates() {
        let args = InvocationArgs {
            locale: Some("xx_".into()),
            ..Default::default()
        };
        match validate_arguments(&args, &host()) {
            Err(err @ ValidationError::InvalidArgumentValue { .. }) => {
                assert!(matches!(&err, ValidationError::InvalidArgumentValue { valid, .. } if valid.is_empty()));
                assert!(!err.to_string().contains("Valid values"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let good = InvocationArgs {
            locale: Some("en-US".into()),
            ..Default::default()
        };
        assert_eq!(validate_arguments(&good, &host()), Ok(()));
    }

    #[test]
    fn custom_header_must_be_a_short_header_value() {
        for bad in ["line\nbreak".to_string(), "x".repeat(MAX_CUSTOM_HEADER_LEN + 1)] {
            let args = InvocationArgs {
                custom_header: Some(bad),
                ..Default::default()
            };
            assert!(matches!(
                validate_arguments(&args, &host()),
                Err(ValidationError::InvalidArgumentValue { argument, .. }) if argument == "header"
            ));
        }
        let args = InvocationArgs {
            custom_header: Some("tenant=contoso".into()),
            ..Default::default()
        };
        assert_eq!(validate_arguments(&args, &host()), Ok(()));
    }

    #[test]
    fn require_package_accepts_any_lookup_field() {
        assert_eq!(
            require_package(&InvocationArgs::default()),
            Err(ValidationError::MissingPackage)
        );
        let args = InvocationArgs {
            moniker: Some("ed".into()),
            ..Default::default()
        };
        assert_eq!(require_package(&args), Ok(()));
    }
}
