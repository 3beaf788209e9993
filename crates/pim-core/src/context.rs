//! Per-invocation execution state threaded through every workflow step.

use std::path::PathBuf;
use std::sync::Arc;

use pim_schema::{Manifest, Sha256Digest};
use tokio_util::sync::CancellationToken;

use crate::applicability::SelectionOutcome;
use crate::args::{ArgKind, EffectiveConstraints, InvocationArgs};
use crate::error::{WorkflowError, exit_code};
use crate::host::HostEnvironment;
use crate::io::download::Downloader;
use crate::launch::{InstallerLauncher, LaunchOutcome};
use crate::reporter::Reporter;
use crate::source::SourceSet;
use crate::validate::{ValidationError, require_package, validate_arguments};

/// Coarse progress marker, in the order a run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ExecutionStage {
    /// Nothing has happened yet.
    #[default]
    Initial,
    /// Arguments are being validated.
    ParseArgs,
    /// Sources are being searched.
    Discovery,
    /// The installer is being fetched.
    Download,
    /// The installer is being verified.
    PreExecution,
    /// The installer is running.
    Execution,
    /// The installer has finished.
    PostExecution,
}

impl ExecutionStage {
    /// Kebab-case name used in logs and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::ParseArgs => "parse-args",
            Self::Discovery => "discovery",
            Self::Download => "download",
            Self::PreExecution => "pre-execution",
            Self::Execution => "execution",
            Self::PostExecution => "post-execution",
        }
    }
}

impl std::fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Behaviour switches set by the command before the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextFlag {
    /// On an ambiguous resolution, show the candidates before stopping.
    ShowSearchResultsOnPartialFailure,
}

impl ContextFlag {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Where a run ended up.
#[derive(Debug, Default)]
pub enum Status {
    /// No step has failed (yet).
    #[default]
    Success,
    /// A step failed; the first failure is kept.
    Failed(WorkflowError),
    /// Cancellation was requested or surfaced from a step.
    Cancelled,
}

impl Status {
    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => exit_code::SUCCESS,
            Self::Failed(err) => err.exit_code(),
            Self::Cancelled => exit_code::CANCELLED,
        }
    }

    /// Whether no step has failed.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Collaborators shared read-only between concurrent runs.
#[derive(Debug, Clone)]
pub struct Services {
    /// Sources to resolve packages from, in precedence order.
    pub sources: SourceSet,
    /// Host queries.
    pub host: Arc<dyn HostEnvironment>,
    /// Fetches installers.
    pub downloader: Arc<dyn Downloader>,
    /// Runs or places installers.
    pub launcher: Arc<dyn InstallerLauncher>,
}

/// A verified-or-not installer on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    /// Where the installer was written.
    pub path: PathBuf,
    /// Digest of the bytes as they were written.
    pub digest: Sha256Digest,
}

/// Mutable state for one command invocation.
///
/// Steps read what earlier steps produced (`manifest`, `selection`,
/// `downloaded`) and report failure through [`fail`](Self::fail); the
/// pipeline runner stops at the first failure.
pub struct ExecutionContext {
    /// Arguments as given.
    pub args: InvocationArgs,
    /// Constraints derived from `args` and the host.
    pub constraints: EffectiveConstraints,
    /// Collaborators for this run.
    pub services: Services,
    /// Resolved manifest.
    pub manifest: Option<Manifest>,
    /// Installer selection outcome, success or not.
    pub selection: Option<SelectionOutcome>,
    /// Downloaded installer.
    pub downloaded: Option<Downloaded>,
    /// What the launcher did.
    pub launched: Option<LaunchOutcome>,
    reporter: Arc<dyn Reporter>,
    flags: u8,
    stage: ExecutionStage,
    status: Status,
    warnings: Vec<String>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("stage", &self.stage)
            .field("status", &self.status)
            .field("manifest", &self.manifest.as_ref().map(|m| m.id.as_str()))
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Build a context from arguments that already passed validation.
    pub fn new(
        args: InvocationArgs,
        services: Services,
        reporter: Arc<dyn Reporter>,
        cancel: CancellationToken,
    ) -> Self {
        let constraints = EffectiveConstraints::derive(&args, services.host.as_ref());
        Self {
            args,
            constraints,
            services,
            manifest: None,
            selection: None,
            downloaded: None,
            launched: None,
            reporter,
            flags: 0,
            stage: ExecutionStage::Initial,
            status: Status::Success,
            warnings: Vec::new(),
            cancel,
        }
    }

    /// Validate `args` and build a context for a single-package command.
    ///
    /// `--source` narrows the configured sources; `--dependency-source` must
    /// name a configured source; `--header` is handed to every source that
    /// makes requests.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found in `args`.
    pub fn prepare(
        args: InvocationArgs,
        mut services: Services,
        reporter: Arc<dyn Reporter>,
        cancel: CancellationToken,
    ) -> Result<Self, ValidationError> {
        reporter.stage(ExecutionStage::ParseArgs);
        validate_arguments(&args, services.host.as_ref())?;
        require_package(&args)?;

        if let Some(name) = &args.source {
            services.sources = services.sources.restrict(ArgKind::Source, name)?;
        }
        if let Some(name) = &args.dependency_source {
            services.sources.restrict(ArgKind::DependencySource, name)?;
        }
        if let Some(header) = &args.custom_header {
            services.sources = services.sources.with_custom_header(header);
        }

        let mut ctx = Self::new(args, services, reporter, cancel);
        ctx.stage = ExecutionStage::ParseArgs;
        Ok(ctx)
    }

    /// Where progress and messages go.
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// Turn on `flag` for this context only.
    pub fn set_flag(&mut self, flag: ContextFlag) {
        self.flags |= flag.bit();
    }

    /// Whether `flag` is on.
    pub fn has_flag(&self, flag: ContextFlag) -> bool {
        self.flags & flag.bit() != 0
    }

    /// Furthest stage reached.
    pub fn stage(&self) -> ExecutionStage {
        self.stage
    }

    /// Advance to `stage`. Stages never move backwards; an earlier or equal
    /// stage is ignored.
    pub fn report_stage(&mut self, stage: ExecutionStage) {
        if stage <= self.stage {
            tracing::trace!("Ignoring stage {stage}; already at {}", self.stage);
            return;
        }
        self.stage = stage;
        self.reporter.stage(stage);
    }

    /// Current status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Whether a step has failed or the run was cancelled.
    pub fn is_terminated(&self) -> bool {
        !self.status.is_success()
    }

    /// Record a failure. The first terminal state wins; cancellation errors
    /// from any layer become [`Status::Cancelled`].
    pub fn fail(&mut self, err: WorkflowError) {
        if self.is_terminated() {
            tracing::debug!("Ignoring failure after termination: {err}");
            return;
        }
        if err.is_cancellation() {
            tracing::debug!("Run cancelled: {err}");
            self.status = Status::Cancelled;
        } else {
            tracing::debug!("Step failed: {err}");
            self.status = Status::Failed(err);
        }
    }

    /// Token steps watch for cancellation.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether cancellation has been requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Move to [`Status::Cancelled`] unless already terminated.
    pub fn mark_cancelled(&mut self) {
        self.fail(WorkflowError::Cancelled);
    }

    /// Record a warning once, telling the reporter the first time.
    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        if self.warnings.contains(&msg) {
            return;
        }
        tracing::warn!("{msg}");
        self.reporter.warning(&msg);
        self.warnings.push(msg);
    }

    /// Warnings recorded so far, in order.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Process exit code for the current status.
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Consume the context, keeping its final status.
    pub fn into_status(self) -> Status {
        self.status
    }
}
