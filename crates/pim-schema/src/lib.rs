//! Shared types and the manifest parse boundary for pim.
//!
//! Everything in this crate is plain data: the engine in `pim-core` consumes
//! these types, the CLI produces and displays them.

pub mod arch;
pub mod hash;
pub mod installer;
pub mod locale;
pub mod manifest;
pub mod types;
pub mod version;

// Re-exports
pub use arch::*;
pub use hash::*;
pub use installer::{InstallerRecord, InstallerSwitches, InstallerType, Scope};
pub use manifest::{Manifest, ManifestError};
pub use types::*;
pub use version::{OsVersion, compare_versions};
