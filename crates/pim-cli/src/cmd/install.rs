//! Install command

use std::sync::Arc;

use pim_core::workflow::install_pipeline;
use pim_core::{ContextFlag, ExecutionContext, Reporter};
use tokio_util::sync::CancellationToken;

use super::{Session, fail_early, finish};
use crate::PackageArgs;

/// Resolve, verify and run the installer for one package.
pub async fn install(
    session: &Session,
    args: PackageArgs,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
) -> i32 {
    let mut ctx =
        match ExecutionContext::prepare(args.into(), session.services(), reporter.clone(), cancel)
        {
            Ok(ctx) => ctx,
            Err(e) => return fail_early(reporter.as_ref(), e),
        };
    ctx.set_flag(ContextFlag::ShowSearchResultsOnPartialFailure);

    install_pipeline().run(&mut ctx).await;
    finish(&ctx)
}
