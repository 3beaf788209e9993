//! The steps package commands are built from, and the standard pipelines.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Pipeline, Step};
use crate::applicability::{ApplicabilityError, select_installer};
use crate::args::PackageRequest;
use crate::context::{Downloaded, ExecutionContext, ExecutionStage, Status};
use crate::error::WorkflowError;
use crate::host::PathName;
use crate::io::download::DownloadRequest;
use crate::launch::{InstallMode, LaunchOutcome, LaunchRequest};
use crate::paths::installer_log_path;
use crate::search::{ResolutionError, resolve_manifest};
use crate::verify::{Verification, verify_digest};

/// Advance the reported stage. Never fails.
#[derive(Debug, Clone, Copy)]
pub struct ReportExecutionStage(pub ExecutionStage);

#[async_trait]
impl Step for ReportExecutionStage {
    fn name(&self) -> &'static str {
        "report-execution-stage"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        ctx.report_stage(self.0);
    }
}

/// Stop before discovery when a source to be queried declares agreements the
/// user has not accepted. Manifest-file requests query no source.
#[derive(Debug, Clone, Copy)]
pub struct EnsureSourceAgreementsAccepted;

#[async_trait]
impl Step for EnsureSourceAgreementsAccepted {
    fn name(&self) -> &'static str {
        "ensure-source-agreements-accepted"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        if matches!(ctx.constraints.request, PackageRequest::Manifest(_)) {
            return;
        }

        let reporter = Arc::clone(ctx.reporter());
        let mut unaccepted = None;
        for source in ctx.services.sources.iter() {
            if source.agreements().is_empty() {
                continue;
            }
            reporter.info(&format!("Source '{}' agreements:", source.name()));
            for agreement in source.agreements() {
                reporter.info(agreement);
            }
            unaccepted.get_or_insert_with(|| source.name().to_string());
        }

        if let Some(source_name) = unaccepted.filter(|_| !ctx.args.accept_source_agreements) {
            ctx.fail(WorkflowError::SourceAgreementsNotAccepted { source_name });
        }
    }
}

/// Resolve the request to one manifest.
#[derive(Debug, Clone, Copy)]
pub struct GetManifest;

#[async_trait]
impl Step for GetManifest {
    fn name(&self) -> &'static str {
        "get-manifest"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let cancel = ctx.cancel_token().clone();
        let resolved = {
            let request = &ctx.constraints.request;
            let sources = &ctx.services.sources;
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = resolve_manifest(request, sources) => Some(result),
            }
        };

        match resolved {
            None => ctx.fail(WorkflowError::Cancelled),
            Some(Ok(manifest)) => {
                tracing::debug!("Resolved {} {}", manifest.id, manifest.version);
                ctx.manifest = Some(manifest);
            }
            Some(Err(err)) => ctx.fail(err.into()),
        }
    }
}

/// Run the applicability resolver and keep its outcome on the context.
///
/// Does not fail on an inapplicable manifest; see
/// [`EnsureApplicableInstaller`].
#[derive(Debug, Clone, Copy)]
pub struct SelectInstaller;

#[async_trait]
impl Step for SelectInstaller {
    fn name(&self) -> &'static str {
        "select-installer"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let Some(manifest) = &ctx.manifest else {
            ctx.fail(WorkflowError::context("select installer", "no manifest resolved"));
            return;
        };
        let outcome = select_installer(manifest, &ctx.constraints);
        match &outcome {
            Ok(selection) => tracing::debug!(
                "Selected installer #{} ({})",
                selection.index,
                selection.installer.describe()
            ),
            Err(err) => tracing::debug!("No installer selected: {err}"),
        }
        ctx.selection = Some(outcome);
    }
}

/// Fail unless exactly one installer was selected.
#[derive(Debug, Clone, Copy)]
pub struct EnsureApplicableInstaller;

#[async_trait]
impl Step for EnsureApplicableInstaller {
    fn name(&self) -> &'static str {
        "ensure-applicable-installer"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let err = match &ctx.selection {
            Some(Ok(_)) => return,
            Some(Err(err)) => WorkflowError::from(err.clone()),
            None => WorkflowError::context("ensure applicable installer", "selection has not run"),
        };
        ctx.fail(err);
    }
}

/// Stop when the package declares agreements the user has not accepted.
#[derive(Debug, Clone, Copy)]
pub struct EnsureAgreementsAccepted;

#[async_trait]
impl Step for EnsureAgreementsAccepted {
    fn name(&self) -> &'static str {
        "ensure-agreements-accepted"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let Some(manifest) = &ctx.manifest else {
            return;
        };
        if manifest.agreements.is_empty() {
            return;
        }

        let reporter = Arc::clone(ctx.reporter());
        for agreement in &manifest.agreements {
            reporter.info(agreement);
        }
        if !ctx.args.accept_package_agreements {
            let id = manifest.id.to_string();
            ctx.fail(WorkflowError::AgreementsNotAccepted { id });
        }
    }
}

/// Fetch the selected installer into the temp directory.
#[derive(Debug, Clone, Copy)]
pub struct DownloadInstaller;

#[async_trait]
impl Step for DownloadInstaller {
    fn name(&self) -> &'static str {
        "download-installer"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let (Some(manifest), Some(Ok(selection))) = (&ctx.manifest, &ctx.selection) else {
            ctx.fail(WorkflowError::context("download", "no installer selected"));
            return;
        };

        let file_name = match selection.installer.file_name() {
            "" => "installer",
            name => name,
        };
        let dest = ctx
            .services
            .host
            .path_to(PathName::Temp)
            .join(manifest.id.as_str())
            .join(manifest.version.as_str())
            .join(file_name);

        let result = ctx
            .services
            .downloader
            .download(DownloadRequest {
                id: &manifest.id,
                version: &manifest.version,
                url: &selection.installer.url,
                dest: &dest,
                reporter: ctx.reporter().as_ref(),
                cancel: ctx.cancel_token(),
            })
            .await;

        match result {
            Ok(digest) => {
                tracing::debug!("Downloaded {} ({digest})", dest.display());
                ctx.downloaded = Some(Downloaded { path: dest, digest });
            }
            Err(err) => ctx.fail(err.into()),
        }
    }
}

/// Compare the downloaded bytes against the manifest hash.
///
/// A mismatch halts the run and removes the file, unless the hash override
/// was given, in which case a single warning is recorded.
#[derive(Debug, Clone, Copy)]
pub struct VerifyInstallerHash;

#[async_trait]
impl Step for VerifyInstallerHash {
    fn name(&self) -> &'static str {
        "verify-installer-hash"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let (Some(Ok(selection)), Some(downloaded)) = (&ctx.selection, &ctx.downloaded) else {
            ctx.fail(WorkflowError::context("verify", "nothing downloaded"));
            return;
        };

        match verify_digest(
            &selection.installer.sha256,
            &downloaded.digest,
            ctx.constraints.hash_override,
        ) {
            Ok(Verification::Matched) => {
                tracing::debug!("Installer hash verified");
            }
            Ok(Verification::Overridden { expected, actual }) => {
                ctx.warn(format!(
                    "Installer hash does not match (expected {expected}, got {actual}); continuing because --ignore-security-hash was given"
                ));
            }
            Err(err) => {
                tokio::fs::remove_file(&downloaded.path).await.ok();
                ctx.fail(err.into());
            }
        }
    }
}

/// Hand the verified installer to the launcher.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteInstaller;

#[async_trait]
impl Step for ExecuteInstaller {
    fn name(&self) -> &'static str {
        "execute-installer"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let (Some(manifest), Some(Ok(selection)), Some(downloaded)) =
            (&ctx.manifest, &ctx.selection, &ctx.downloaded)
        else {
            ctx.fail(WorkflowError::context("install", "no verified installer"));
            return;
        };
        let host = &ctx.services.host;
        let reporter = Arc::clone(ctx.reporter());

        let log = ctx.args.log.clone().unwrap_or_else(|| {
            installer_log_path(
                &host.path_to(PathName::DefaultLog),
                manifest.id.as_str(),
                manifest.version.as_str(),
            )
        });
        if let Some(parent) = log.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                ctx.fail(err.into());
                return;
            }
        }

        let location = ctx.args.install_location.clone().or_else(|| {
            selection.installer.installer_type.is_archive().then(|| {
                host.path_to(PathName::LocalState)
                    .join("packages")
                    .join(manifest.id.as_str())
            })
        });

        reporter.installing(&manifest.id, &manifest.version);
        let result = ctx
            .services
            .launcher
            .launch(LaunchRequest {
                manifest,
                installer: &selection.installer,
                file: &downloaded.path,
                mode: InstallMode::from_flags(ctx.args.silent, ctx.args.interactive),
                log: &log,
                location: location.as_deref(),
                override_args: ctx.args.override_args.as_deref(),
                cancel: ctx.cancel_token(),
            })
            .await;

        match result {
            Ok(outcome) => {
                let detail = match &outcome {
                    LaunchOutcome::Exited => "installed".to_string(),
                    LaunchOutcome::Placed { location, files } => {
                        format!("{files} file(s) in {}", location.display())
                    }
                };
                reporter.done(&manifest.id, &manifest.version, &detail);
                ctx.launched = Some(outcome);
            }
            Err(err) => {
                reporter.failed(&manifest.id, &manifest.version, &err.to_string());
                ctx.fail(err.into());
            }
        }
    }
}

/// Show the candidates carried by an ambiguous failure.
#[derive(Debug, Clone, Copy)]
pub struct ShowSearchResults;

#[async_trait]
impl Step for ShowSearchResults {
    fn name(&self) -> &'static str {
        "show-search-results"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let reporter = ctx.reporter();
        match ctx.status() {
            Status::Failed(WorkflowError::Resolution(ResolutionError::AmbiguousQuery {
                candidates,
                ..
            })) => reporter.search_results(candidates),
            Status::Failed(WorkflowError::Applicability(
                ApplicabilityError::AmbiguousInstallers { installers, .. },
            )) => {
                for installer in installers {
                    reporter.info(&format!("  {} {}", installer.describe(), installer.url));
                }
            }
            _ => {}
        }
    }
}

/// Print the resolved manifest and the installer that would be used.
#[derive(Debug, Clone, Copy)]
pub struct ShowPackageDetails;

#[async_trait]
impl Step for ShowPackageDetails {
    fn name(&self) -> &'static str {
        "show-package-details"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) {
        let Some(manifest) = &ctx.manifest else {
            ctx.fail(WorkflowError::context("show", "no manifest resolved"));
            return;
        };
        let reporter = ctx.reporter();

        reporter.success(&format!("{} [{}]", manifest.name, manifest.id));
        reporter.info(&format!("Version: {}", manifest.version));
        let optional = [
            ("Moniker", &manifest.moniker),
            ("Channel", &manifest.channel),
            ("Publisher", &manifest.publisher),
            ("Description", &manifest.description),
        ];
        for (label, value) in optional {
            if let Some(value) = value {
                reporter.info(&format!("{label}: {value}"));
            }
        }
        for agreement in &manifest.agreements {
            reporter.info(&format!("Agreement: {agreement}"));
        }

        match &ctx.selection {
            Some(Ok(selection)) => {
                let installer = &selection.installer;
                reporter.info(&format!("Installer: {}", installer.describe()));
                reporter.info(&format!("  Url: {}", installer.url));
                reporter.info(&format!("  Sha256: {}", installer.sha256));
            }
            Some(Err(err)) => reporter.warning(&err.to_string()),
            None => {}
        }
    }
}

/// Download, verify and run the selected installer.
pub fn install_single_package() -> Pipeline {
    Pipeline::new()
        .then(EnsureAgreementsAccepted)
        .then(ReportExecutionStage(ExecutionStage::Download))
        .then(DownloadInstaller)
        .then(ReportExecutionStage(ExecutionStage::PreExecution))
        .then(VerifyInstallerHash)
        .then(ReportExecutionStage(ExecutionStage::Execution))
        .then(ExecuteInstaller)
        .then(ReportExecutionStage(ExecutionStage::PostExecution))
}

/// The `install` command.
pub fn install_pipeline() -> Pipeline {
    Pipeline::new()
        .then(ReportExecutionStage(ExecutionStage::Discovery))
        .then(EnsureSourceAgreementsAccepted)
        .then(GetManifest)
        .then(SelectInstaller)
        .then(EnsureApplicableInstaller)
        .extend(install_single_package())
}

/// The `show` command.
pub fn show_pipeline() -> Pipeline {
    Pipeline::new()
        .then(ReportExecutionStage(ExecutionStage::Discovery))
        .then(EnsureSourceAgreementsAccepted)
        .then(GetManifest)
        .then(SelectInstaller)
        .then(ShowPackageDetails)
}
