//! Reporter trait for dependency injection
//!
//! This trait allows the engine to report stages, progress and status without
//! being coupled to a specific terminal implementation.

use std::sync::Mutex;

use pim_schema::{PackageId, Version};

use crate::context::ExecutionStage;
use crate::search::Candidate;

/// Receives everything the engine wants the user to see.
pub trait Reporter: Send + Sync {
    /// The pipeline entered a new execution stage.
    fn stage(&self, stage: ExecutionStage);

    /// Updates the progress of a download.
    fn downloading(&self, id: &PackageId, version: &Version, current: u64, total: Option<u64>);

    /// The installer for a package has been launched.
    fn installing(&self, id: &PackageId, version: &Version);

    /// Marks a package operation as successfully completed.
    fn done(&self, id: &PackageId, version: &Version, detail: &str);

    /// Marks a package operation as failed with a specific reason.
    fn failed(&self, id: &PackageId, version: &Version, reason: &str);

    /// Show the candidates of a search, e.g. to disambiguate a query.
    fn search_results(&self, candidates: &[Candidate]);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn stage(&self, stage: ExecutionStage) {
        (**self).stage(stage);
    }
    fn downloading(&self, id: &PackageId, version: &Version, current: u64, total: Option<u64>) {
        (**self).downloading(id, version, current, total);
    }
    fn installing(&self, id: &PackageId, version: &Version) {
        (**self).installing(id, version);
    }
    fn done(&self, id: &PackageId, version: &Version, detail: &str) {
        (**self).done(id, version, detail);
    }
    fn failed(&self, id: &PackageId, version: &Version, reason: &str) {
        (**self).failed(id, version, reason);
    }
    fn search_results(&self, candidates: &[Candidate]) {
        (**self).search_results(candidates);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// A no-op reporter for silent operations (e.g., completion, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn stage(&self, _: ExecutionStage) {}
    fn downloading(&self, _: &PackageId, _: &Version, _: u64, _: Option<u64>) {}
    fn installing(&self, _: &PackageId, _: &Version) {}
    fn done(&self, _: &PackageId, _: &Version, _: &str) {}
    fn failed(&self, _: &PackageId, _: &Version, _: &str) {}
    fn search_results(&self, _: &[Candidate]) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}

/// One call made against a [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// [`Reporter::stage`].
    Stage(ExecutionStage),
    /// [`Reporter::downloading`].
    Downloading {
        /// Bytes so far.
        current: u64,
    },
    /// [`Reporter::installing`], with the package id.
    Installing(String),
    /// [`Reporter::done`], with the package id.
    Done(String),
    /// [`Reporter::failed`], with the package id.
    Failed(String),
    /// [`Reporter::search_results`], with the candidate ids.
    SearchResults(Vec<String>),
    /// [`Reporter::info`].
    Info(String),
    /// [`Reporter::success`].
    Success(String),
    /// [`Reporter::warning`].
    Warning(String),
    /// [`Reporter::error`].
    Error(String),
}

/// Reporter that remembers everything it was told, for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded warnings only.
    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Warning(w) => Some(w),
                _ => None,
            })
            .collect()
    }

    /// Recorded stages in order.
    pub fn stages(&self) -> Vec<ExecutionStage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ReportEvent::Stage(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ReportEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Reporter for RecordingReporter {
    fn stage(&self, stage: ExecutionStage) {
        self.push(ReportEvent::Stage(stage));
    }
    fn downloading(&self, _: &PackageId, _: &Version, current: u64, _: Option<u64>) {
        self.push(ReportEvent::Downloading { current });
    }
    fn installing(&self, id: &PackageId, _: &Version) {
        self.push(ReportEvent::Installing(id.to_string()));
    }
    fn done(&self, id: &PackageId, _: &Version, _: &str) {
        self.push(ReportEvent::Done(id.to_string()));
    }
    fn failed(&self, id: &PackageId, _: &Version, reason: &str) {
        self.push(ReportEvent::Failed(format!("{id}: {reason}")));
    }
    fn search_results(&self, candidates: &[Candidate]) {
        self.push(ReportEvent::SearchResults(
            candidates.iter().map(|c| c.id.to_string()).collect(),
        ));
    }
    fn info(&self, msg: &str) {
        self.push(ReportEvent::Info(msg.to_string()));
    }
    fn success(&self, msg: &str) {
        self.push(ReportEvent::Success(msg.to_string()));
    }
    fn warning(&self, msg: &str) {
        self.push(ReportEvent::Warning(msg.to_string()));
    }
    fn error(&self, msg: &str) {
        self.push(ReportEvent::Error(msg.to_string()));
    }
}
