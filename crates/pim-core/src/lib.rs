//! Engine for pim: argument validation, manifest resolution, installer
//! applicability, integrity verification and the workflow pipeline that
//! strings them together.

pub mod applicability;
pub mod args;
pub mod complete;
pub mod context;
pub mod error;
pub mod host;
pub mod io;
pub mod launch;
pub mod paths;
pub mod reporter;
pub mod search;
pub mod source;
pub mod validate;
pub mod verify;
pub mod workflow;

pub use context::{ContextFlag, ExecutionContext, ExecutionStage, Services, Status};
pub use error::{WorkflowError, exit_code};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("pim/", env!("CARGO_PKG_VERSION"));
