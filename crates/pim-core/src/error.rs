//! Failure taxonomy for a pipeline run and its process exit codes.

use thiserror::Error;

use crate::applicability::ApplicabilityError;
use crate::io::download::DownloadError;
use crate::launch::LaunchError;
use crate::search::ResolutionError;
use crate::validate::ValidationError;
use crate::verify::IntegrityError;

/// Stable process exit codes, one per terminal failure class.
pub mod exit_code {
    /// Pipeline completed.
    pub const SUCCESS: i32 = 0;
    /// Manifest path combined with query arguments.
    pub const MANIFEST_AND_QUERY_CONFLICT: i32 = 2;
    /// An argument value is outside its domain.
    pub const INVALID_ARGUMENT_VALUE: i32 = 3;
    /// No package matched the query.
    pub const NO_MATCH_FOUND: i32 = 4;
    /// The query or installer selection was ambiguous.
    pub const AMBIGUOUS_QUERY: i32 = 5;
    /// Every installer was filtered out.
    pub const NO_APPLICABLE_INSTALLER: i32 = 6;
    /// Downloaded bytes do not match the manifest hash.
    pub const INTEGRITY_MISMATCH: i32 = 7;
    /// The user or system cancelled the run.
    pub const CANCELLED: i32 = 8;
    /// The manifest could not be read or parsed.
    pub const MANIFEST_PARSE: i32 = 9;
    /// I/O, network or source failure.
    pub const INFRASTRUCTURE: i32 = 10;
    /// The installer ran and reported failure.
    pub const INSTALLER_FAILED: i32 = 11;
    /// The package requires agreements the user has not accepted.
    pub const AGREEMENTS_NOT_ACCEPTED: i32 = 12;
}

/// Any failure that terminates a pipeline.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Arguments failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request did not resolve to one manifest.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// No single installer fits this host.
    #[error(transparent)]
    Applicability(#[from] ApplicabilityError),

    /// The downloaded installer failed verification.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Fetching the installer failed.
    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    /// Running or placing the installer failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// Cancellation was requested.
    #[error("Operation cancelled")]
    Cancelled,

    /// The package declares agreements that were not accepted.
    #[error("{id} requires accepting its agreements; pass --accept-package-agreements")]
    AgreementsNotAccepted {
        /// Package identifier.
        id: String,
    },

    /// A source declares agreements that were not accepted.
    #[error("Source '{source_name}' requires accepting its agreements; pass --accept-source-agreements")]
    SourceAgreementsNotAccepted {
        /// Configured source name.
        source_name: String,
    },

    /// Filesystem failure outside download and launch.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A step ran without the state it needs.
    #[error("{context}: {message}")]
    Context {
        /// Where it happened.
        context: &'static str,
        /// What was missing.
        message: String,
    },
}

impl WorkflowError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }

    /// The process exit code this failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(ValidationError::ManifestAndQueryConflict) => {
                exit_code::MANIFEST_AND_QUERY_CONFLICT
            }
            Self::Validation(_) => exit_code::INVALID_ARGUMENT_VALUE,
            Self::Resolution(e) => e.exit_code(),
            Self::Applicability(ApplicabilityError::NoApplicableInstaller { .. }) => {
                exit_code::NO_APPLICABLE_INSTALLER
            }
            Self::Applicability(ApplicabilityError::AmbiguousInstallers { .. }) => {
                exit_code::AMBIGUOUS_QUERY
            }
            Self::Integrity(IntegrityError::Mismatch { .. }) => exit_code::INTEGRITY_MISMATCH,
            Self::Integrity(IntegrityError::Read(_)) => exit_code::INFRASTRUCTURE,
            Self::Download(DownloadError::Cancelled) | Self::Cancelled => exit_code::CANCELLED,
            Self::Launch(LaunchError::Cancelled) => exit_code::CANCELLED,
            Self::Launch(LaunchError::ExitCode { .. }) => exit_code::INSTALLER_FAILED,
            Self::AgreementsNotAccepted { .. } | Self::SourceAgreementsNotAccepted { .. } => {
                exit_code::AGREEMENTS_NOT_ACCEPTED
            }
            Self::Download(_) | Self::Launch(_) | Self::Io(_) | Self::Context { .. } => {
                exit_code::INFRASTRUCTURE
            }
        }
    }

    /// Whether this failure is a cancellation surfacing from any layer.
    pub fn is_cancellation(&self) -> bool {
        self.exit_code() == exit_code::CANCELLED
    }

    /// Failures that still carry useful candidates to show the user.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Self::Resolution(ResolutionError::AmbiguousQuery { .. })
                | Self::Applicability(ApplicabilityError::AmbiguousInstallers { .. })
        )
    }
}
