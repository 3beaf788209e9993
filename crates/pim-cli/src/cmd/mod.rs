//! Command implementations.

pub mod complete;
pub mod completions;
pub mod hash;
pub mod install;
pub mod search;
pub mod show;

use std::sync::Arc;

use anyhow::{Context, Result};
use pim_core::host::{HostEnvironment, PathName, SystemHost};
use pim_core::io::download::HttpDownloader;
use pim_core::launch::ProcessLauncher;
use pim_core::paths::settings_file;
use pim_core::source::SourceSet;
use pim_core::{ExecutionContext, Reporter, Services, Status, WorkflowError};

use crate::config::Settings;

/// Everything a command needs from the outside world, loaded once.
#[derive(Debug, Clone)]
pub struct Session {
    pub host: Arc<SystemHost>,
    pub sources: SourceSet,
    pub client: reqwest::Client,
}

impl Session {
    /// Detect the host and load `settings.toml`.
    pub fn load() -> Result<Self> {
        let host = SystemHost::detect()?;
        let path = settings_file(&host.path_to(PathName::StandardSettings));
        let settings = Settings::load(&path).context("Failed to load settings")?;
        let client = reqwest::Client::builder()
            .user_agent(pim_core::USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        let sources = settings.source_set(&client);
        tracing::debug!("Configured sources: {:?}", sources.names());

        Ok(Self {
            host: Arc::new(host),
            sources,
            client,
        })
    }

    /// Engine collaborators for one pipeline run.
    pub fn services(&self) -> Services {
        Services {
            sources: self.sources.clone(),
            host: self.host.clone(),
            downloader: Arc::new(HttpDownloader::new(self.client.clone())),
            launcher: Arc::new(ProcessLauncher),
        }
    }
}

/// Report how a run ended and return its exit code.
pub fn finish(ctx: &ExecutionContext) -> i32 {
    match ctx.status() {
        Status::Success => {}
        Status::Cancelled => ctx.reporter().warning("Operation cancelled"),
        Status::Failed(err) => ctx.reporter().error(&err.to_string()),
    }
    ctx.exit_code()
}

/// Report a failure that happened before any context existed.
pub fn fail_early(reporter: &dyn Reporter, err: impl Into<WorkflowError>) -> i32 {
    let err = err.into();
    reporter.error(&err.to_string());
    err.exit_code()
}
