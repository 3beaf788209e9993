//! Step composition and the pipeline runner.
//!
//! A [`Pipeline`] is an ordered list of [`Step`]s run against one
//! [`ExecutionContext`]. Steps report failure by calling
//! [`ExecutionContext::fail`]; the runner checks the context before every
//! step and stops at the first failure or cancellation request.

pub mod steps;

use async_trait::async_trait;
use futures::future::join_all;

use crate::context::{ContextFlag, ExecutionContext, Status};

pub use steps::{install_pipeline, install_single_package, show_pipeline};

/// One unit of work in a pipeline.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Advance `ctx`, or record why it cannot be advanced.
    async fn execute(&self, ctx: &mut ExecutionContext);
}

/// Ordered steps, run strictly one after another.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.step_names()).finish()
    }
}

impl Pipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    #[must_use]
    pub fn then(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append every step of `other`.
    #[must_use]
    pub fn extend(mut self, other: Pipeline) -> Self {
        self.steps.extend(other.steps);
        self
    }

    /// Step names in run order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there are no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order against `ctx`.
    ///
    /// Stops before the next step once the context is terminated or a
    /// cancellation was requested. When the context carries
    /// [`ContextFlag::ShowSearchResultsOnPartialFailure`] and the failure
    /// still has candidates to show, those are displayed before returning.
    pub async fn run(&self, ctx: &mut ExecutionContext) {
        for step in &self.steps {
            if ctx.is_cancel_requested() {
                tracing::debug!("Cancellation requested before {}", step.name());
                ctx.mark_cancelled();
            }
            if ctx.is_terminated() {
                break;
            }

            tracing::debug!("Running step {}", step.name());
            step.execute(ctx).await;

            let show_results = match ctx.status() {
                Status::Success => continue,
                Status::Cancelled => false,
                Status::Failed(err) => {
                    tracing::debug!("Step {} failed: {err}", step.name());
                    err.is_partial()
                        && ctx.has_flag(ContextFlag::ShowSearchResultsOnPartialFailure)
                }
            };
            if show_results {
                steps::ShowSearchResults.execute(ctx).await;
            }
            break;
        }
    }
}

/// Run independent pipelines concurrently, one context each.
///
/// Contexts come back in input order, each with its own final status.
pub async fn run_batch(runs: Vec<(&Pipeline, ExecutionContext)>) -> Vec<ExecutionContext> {
    join_all(runs.into_iter().map(|(pipeline, mut ctx)| async move {
        pipeline.run(&mut ctx).await;
        ctx
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::InvocationArgs;
    use crate::context::tests::services;
    use crate::error::{WorkflowError, exit_code};
    use crate::reporter::{RecordingReporter, ReportEvent};
    use crate::search::{Candidate, MatchKind, ResolutionError};
    use pim_schema::{PackageId, Version};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        outcome: Option<fn() -> WorkflowError>,
        cancel_after: bool,
    }

    #[async_trait]
    impl Step for Record {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(&self, ctx: &mut ExecutionContext) {
            self.log.lock().unwrap().push(self.name);
            if let Some(make) = self.outcome {
                ctx.fail(make());
            }
            if self.cancel_after {
                ctx.cancel_token().cancel();
            }
        }
    }

    fn step(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Record {
        Record {
            name,
            log: Arc::clone(log),
            outcome: None,
            cancel_after: false,
        }
    }

    fn context(reporter: Arc<RecordingReporter>) -> ExecutionContext {
        ExecutionContext::new(
            InvocationArgs {
                query: Some("editor".into()),
                ..Default::default()
            },
            services(std::path::Path::new("/tmp/pim-wf"), Vec::new()),
            reporter,
            CancellationToken::new(),
        )
    }

    fn ambiguous() -> WorkflowError {
        let candidate = |id: &str| Candidate {
            id: PackageId::new(id),
            name: "Editor".into(),
            version: Version::new("1.0"),
            source: "main".into(),
            match_kind: MatchKind::Partial,
        };
        ResolutionError::AmbiguousQuery {
            query: "query 'editor'".into(),
            candidates: vec![candidate("A.Editor"), candidate("B.Editor")],
        }
        .into()
    }

    #[tokio::test]
    async fn steps_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .then(step("a", &log))
            .then(step("b", &log))
            .extend(Pipeline::new().then(step("c", &log)));
        let mut ctx = context(Arc::new(RecordingReporter::default()));
        pipeline.run(&mut ctx).await;

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(ctx.exit_code(), exit_code::SUCCESS);
        assert_eq!(pipeline.step_names(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failure_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .then(Record {
                outcome: Some(|| WorkflowError::context("test", "boom")),
                ..step("a", &log)
            })
            .then(step("b", &log));
        let mut ctx = context(Arc::new(RecordingReporter::default()));
        pipeline.run(&mut ctx).await;

        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(ctx.exit_code(), exit_code::INFRASTRUCTURE);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .then(Record {
                cancel_after: true,
                ..step("a", &log)
            })
            .then(step("b", &log));
        let mut ctx = context(Arc::new(RecordingReporter::default()));
        pipeline.run(&mut ctx).await;

        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert!(matches!(ctx.status(), Status::Cancelled));
    }

    #[tokio::test]
    async fn partial_failure_shows_candidates_only_when_flagged() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new().then(Record {
            outcome: Some(ambiguous),
            ..step("resolve", &log)
        });

        let reporter = Arc::new(RecordingReporter::default());
        let mut ctx = context(reporter.clone());
        ctx.set_flag(ContextFlag::ShowSearchResultsOnPartialFailure);
        pipeline.run(&mut ctx).await;
        assert!(reporter.events().contains(&ReportEvent::SearchResults(vec![
            "A.Editor".into(),
            "B.Editor".into()
        ])));
        assert_eq!(ctx.exit_code(), exit_code::AMBIGUOUS_QUERY);

        let reporter = Arc::new(RecordingReporter::default());
        let mut ctx = context(reporter.clone());
        pipeline.run(&mut ctx).await;
        assert!(
            !reporter
                .events()
                .iter()
                .any(|e| matches!(e, ReportEvent::SearchResults(_)))
        );
        assert_eq!(ctx.exit_code(), exit_code::AMBIGUOUS_QUERY);
    }

    #[tokio::test]
    async fn batch_contexts_are_independent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ok = Pipeline::new().then(step("ok", &log));
        let failing = Pipeline::new().then(Record {
            outcome: Some(|| WorkflowError::Cancelled),
            ..step("fail", &log)
        });

        let results = run_batch(vec![
            (&ok, context(Arc::new(RecordingReporter::default()))),
            (&failing, context(Arc::new(RecordingReporter::default()))),
            (&ok, context(Arc::new(RecordingReporter::default()))),
        ])
        .await;

        let codes: Vec<i32> = results.iter().map(ExecutionContext::exit_code).collect();
        assert_eq!(
            codes,
            vec![exit_code::SUCCESS, exit_code::CANCELLED, exit_code::SUCCESS]
        );
    }
}
