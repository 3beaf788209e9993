//! Complete command: values for shell tab-completion scripts.

use std::io::Write;

use pim_core::args::{ArgKind, InvocationArgs};
use pim_core::complete::{Completion, complete as completion_for};
use pim_core::validate::ValidationError;
use pim_core::{Reporter, exit_code};

use super::{Session, fail_early};

/// Print completion values for `arg`, one per line.
///
/// An explicit empty set prints a single blank line so the shell offers
/// nothing; [`Completion::NoOutput`] prints nothing at all so the shell falls
/// back to its own path completion. `context` narrows manifest values to the
/// packages the rest of the command line already selects.
pub async fn complete(
    session: &Session,
    arg: &str,
    word: &str,
    context: &InvocationArgs,
    reporter: &dyn Reporter,
) -> i32 {
    let Some(kind) = ArgKind::from_name(arg) else {
        let valid = ArgKind::ALL.iter().map(|k| k.name().to_string()).collect();
        return fail_early(reporter, ValidationError::InvalidArgumentValue {
            argument: "arg".into(),
            value: arg.to_string(),
            valid,
        });
    };

    let completion = match completion_for(
        kind,
        word,
        context,
        &session.sources,
        session.host.as_ref(),
    )
    .await
    {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("Completion failed: {e}");
            reporter.error(&e.to_string());
            return exit_code::INFRASTRUCTURE;
        }
    };

    let mut out = std::io::stdout().lock();
    match completion {
        Completion::Values(values) => {
            for v in values {
                let _ = writeln!(out, "{v}");
            }
        }
        Completion::Empty => {
            let _ = writeln!(out);
        }
        Completion::NoOutput => {}
    }
    exit_code::SUCCESS
}
