//! Parsed invocation arguments and the constraints derived from them.

use std::path::PathBuf;

use pim_schema::{Arch, OsVersion, Scope};

use crate::host::HostEnvironment;
use crate::search::PackageQuery;

/// Argument kinds of the package commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// Free-text query.
    Query,
    /// Explicit manifest file.
    Manifest,
    /// Package identifier.
    Id,
    /// Package display name.
    Name,
    /// Package moniker.
    Moniker,
    /// Package version.
    Version,
    /// Release channel.
    Channel,
    /// Source to search.
    Source,
    /// Install scope.
    Scope,
    /// Installer architecture.
    Architecture,
    /// Case-sensitive equality matching.
    Exact,
    /// Interactive installer UI.
    Interactive,
    /// Silent installer.
    Silent,
    /// Installer locale.
    Locale,
    /// Installer log path.
    Log,
    /// Replacement installer arguments.
    Override,
    /// Install location.
    InstallLocation,
    /// Proceed past a hash mismatch.
    HashOverride,
    /// Source for dependencies.
    DependencySource,
    /// Accept package agreements.
    AcceptPackageAgreements,
    /// Accept source agreements.
    AcceptSourceAgreements,
    /// Extra header sent to index sources.
    CustomHeader,
}

impl ArgKind {
    /// Arguments that shape a source query; all conflict with `--manifest`.
    pub const QUERY_SHAPING: [ArgKind; 8] = [
        Self::Query,
        Self::Id,
        Self::Name,
        Self::Moniker,
        Self::Version,
        Self::Channel,
        Self::Source,
        Self::Exact,
    ];

    /// Every argument kind, in help order.
    pub const ALL: [ArgKind; 22] = [
        Self::Query,
        Self::Manifest,
        Self::Id,
        Self::Name,
        Self::Moniker,
        Self::Version,
        Self::Channel,
        Self::Source,
        Self::Scope,
        Self::Architecture,
        Self::Exact,
        Self::Interactive,
        Self::Silent,
        Self::Locale,
        Self::Log,
        Self::Override,
        Self::InstallLocation,
        Self::HashOverride,
        Self::DependencySource,
        Self::AcceptPackageAgreements,
        Self::AcceptSourceAgreements,
        Self::CustomHeader,
    ];

    /// Look up an argument by its long option name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim_start_matches('-');
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Long option name as typed on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Manifest => "manifest",
            Self::Id => "id",
            Self::Name => "name",
            Self::Moniker => "moniker",
            Self::Version => "version",
            Self::Channel => "channel",
            Self::Source => "source",
            Self::Scope => "scope",
            Self::Architecture => "architecture",
            Self::Exact => "exact",
            Self::Interactive => "interactive",
            Self::Silent => "silent",
            Self::Locale => "locale",
            Self::Log => "log",
            Self::Override => "override",
            Self::InstallLocation => "location",
            Self::HashOverride => "ignore-security-hash",
            Self::DependencySource => "dependency-source",
            Self::AcceptPackageAgreements => "accept-package-agreements",
            Self::AcceptSourceAgreements => "accept-source-agreements",
            Self::CustomHeader => "header",
        }
    }
}

/// Arguments of one package command, parsed but not yet checked.
///
/// Each field corresponds to the [`ArgKind`] of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationArgs {
    /// Free-text query.
    pub query: Option<String>,
    /// Explicit manifest file.
    pub manifest: Option<PathBuf>,
    /// Package identifier filter.
    pub id: Option<String>,
    /// Package name filter.
    pub name: Option<String>,
    /// Moniker filter.
    pub moniker: Option<String>,
    /// Version to resolve.
    pub version: Option<String>,
    /// Release channel filter.
    pub channel: Option<String>,
    /// Restrict discovery to this source.
    pub source: Option<String>,
    /// Install scope as typed.
    pub scope: Option<String>,
    /// Installer architecture as typed.
    pub architecture: Option<String>,
    /// Case-sensitive equality matching.
    pub exact: bool,
    /// Let the installer show its UI.
    pub interactive: bool,
    /// Run the installer unattended.
    pub silent: bool,
    /// Installer locale as typed.
    pub locale: Option<String>,
    /// Installer log path.
    pub log: Option<PathBuf>,
    /// Replaces the installer arguments entirely.
    pub override_args: Option<String>,
    /// Install location.
    pub install_location: Option<PathBuf>,
    /// Proceed past a hash mismatch.
    pub hash_override: bool,
    /// Source for dependencies.
    pub dependency_source: Option<String>,
    /// Accept package agreements.
    pub accept_package_agreements: bool,
    /// Accept source agreements.
    pub accept_source_agreements: bool,
    /// Value sent to index sources in the custom header.
    pub custom_header: Option<String>,
}

impl InvocationArgs {
    /// Whether an argument was supplied.
    pub fn contains(&self, kind: ArgKind) -> bool {
        match kind {
            ArgKind::Query => self.query.is_some(),
            ArgKind::Manifest => self.manifest.is_some(),
            ArgKind::Id => self.id.is_some(),
            ArgKind::Name => self.name.is_some(),
            ArgKind::Moniker => self.moniker.is_some(),
            ArgKind::Version => self.version.is_some(),
            ArgKind::Channel => self.channel.is_some(),
            ArgKind::Source => self.source.is_some(),
            ArgKind::Scope => self.scope.is_some(),
            ArgKind::Architecture => self.architecture.is_some(),
            ArgKind::Exact => self.exact,
            ArgKind::Interactive => self.interactive,
            ArgKind::Silent => self.silent,
            ArgKind::Locale => self.locale.is_some(),
            ArgKind::Log => self.log.is_some(),
            ArgKind::Override => self.override_args.is_some(),
            ArgKind::InstallLocation => self.install_location.is_some(),
            ArgKind::HashOverride => self.hash_override,
            ArgKind::DependencySource => self.dependency_source.is_some(),
            ArgKind::AcceptPackageAgreements => self.accept_package_agreements,
            ArgKind::AcceptSourceAgreements => self.accept_source_agreements,
            ArgKind::CustomHeader => self.custom_header.is_some(),
        }
    }

    /// The source query described by these arguments.
    pub fn package_query(&self) -> PackageQuery {
        PackageQuery {
            query: self.query.clone(),
            id: self.id.clone(),
            name: self.name.clone(),
            moniker: self.moniker.clone(),
            version: self.version.clone(),
            channel: self.channel.clone(),
            exact: self.exact,
        }
    }
}

/// What the user asked to operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageRequest {
    /// An explicit manifest file.
    Manifest(PathBuf),
    /// A query against configured sources.
    Query(PackageQuery),
}

/// Merged user arguments and host defaults that drive resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConstraints {
    /// Package to resolve.
    pub request: PackageRequest,
    /// Architectures to accept, preference first. A single entry when the
    /// user named one.
    pub architectures: Vec<Arch>,
    /// Whether `architectures` came from the user rather than the host.
    pub architecture_requested: bool,
    /// Requested scope.
    pub scope: Option<Scope>,
    /// Scope the installer technology must support: the requested one, or
    /// machine when elevated and user otherwise.
    pub derived_scope: Scope,
    /// Requested locale.
    pub locale: Option<String>,
    /// Host OS version, for minimum-version filtering.
    pub os_version: OsVersion,
    /// Proceed past hash mismatches with a warning.
    pub hash_override: bool,
}

impl EffectiveConstraints {
    /// Derive constraints from validated arguments.
    ///
    /// Run [`validate_arguments`](crate::validate::validate_arguments) first:
    /// unparsable architecture or scope values are treated as absent here.
    pub fn derive(args: &InvocationArgs, host: &dyn HostEnvironment) -> Self {
        let requested_arch = args
            .architecture
            .as_deref()
            .and_then(|a| a.parse::<Arch>().ok());

        let request = match &args.manifest {
            Some(path) => PackageRequest::Manifest(path.clone()),
            None => PackageRequest::Query(args.package_query()),
        };

        let scope = args
            .scope
            .as_deref()
            .map(Scope::parse_arg)
            .filter(|s| *s != Scope::Unknown);
        let derived_scope = scope.unwrap_or(if host.is_admin() {
            Scope::Machine
        } else {
            Scope::User
        });

        Self {
            request,
            architectures: requested_arch
                .map_or_else(|| host.applicable_architectures(), |a| vec![a]),
            architecture_requested: requested_arch.is_some(),
            scope,
            derived_scope,
            locale: args.locale.clone(),
            os_version: host.os_version(),
            hash_override: args.hash_override,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticHost;

    #[test]
    fn names_round_trip() {
        for kind in ArgKind::ALL {
            assert_eq!(ArgKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ArgKind::from_name("--location"), Some(ArgKind::InstallLocation));
        assert_eq!(ArgKind::from_name("bogus"), None);
    }

    #[test]
    fn unspecified_architecture_falls_back_to_host_list() {
        let host = StaticHost::x64("/r");
        let c = EffectiveConstraints::derive(&InvocationArgs::default(), &host);
        assert_eq!(c.architectures, host.applicable_architectures());
        assert!(!c.architecture_requested);
        assert_eq!(c.scope, None);
        assert_eq!(c.derived_scope, Scope::User);
    }

    #[test]
    fn elevation_implies_machine_scope_unless_one_is_requested() {
        let admin = StaticHost {
            admin: true,
            ..StaticHost::x64("/r")
        };
        let c = EffectiveConstraints::derive(&InvocationArgs::default(), &admin);
        assert_eq!(c.scope, None);
        assert_eq!(c.derived_scope, Scope::Machine);

        let args = InvocationArgs {
            scope: Some("user".into()),
            ..Default::default()
        };
        let c = EffectiveConstraints::derive(&args, &admin);
        assert_eq!(c.derived_scope, Scope::User);
    }

    #[test]
    fn requested_values_are_carried() {
        let host = StaticHost::x64("/r");
        let args = InvocationArgs {
            id: Some("Contoso.Editor".into()),
            architecture: Some("x86".into()),
            scope: Some("Machine".into()),
            locale: Some("en-US".into()),
            hash_override: true,
            ..Default::default()
        };
        let c = EffectiveConstraints::derive(&args, &host);
        assert_eq!(c.architectures, vec![Arch::X86]);
        assert!(c.architecture_requested);
        assert_eq!(c.scope, Some(Scope::Machine));
        assert!(c.hash_override);
        match c.request {
            PackageRequest::Query(q) => assert_eq!(q.id.as_deref(), Some("Contoso.Editor")),
            PackageRequest::Manifest(_) => panic!("expected a query"),
        }
    }

    #[test]
    fn manifest_argument_becomes_manifest_request() {
        let host = StaticHost::x64("/r");
        let args = InvocationArgs {
            manifest: Some(PathBuf::from("m.toml")),
            ..Default::default()
        };
        let c = EffectiveConstraints::derive(&args, &host);
        assert_eq!(c.request, PackageRequest::Manifest(PathBuf::from("m.toml")));
    }
}
