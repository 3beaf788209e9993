//! Search command

use pim_core::args::{ArgKind, InvocationArgs};
use pim_core::validate::validate_arguments;
use pim_core::search::{self, Candidate, PackageQuery};
use pim_core::{Reporter, exit_code};

use super::{Session, fail_early};
use crate::SearchArgs;
use crate::ui::console::print_candidates;

/// List every package matching the query, without requiring a unique hit.
pub async fn search(session: &Session, args: SearchArgs, reporter: &dyn Reporter) -> i32 {
    let mut sources = match &args.source {
        Some(name) => match session.sources.restrict(ArgKind::Source, name) {
            Ok(s) => s,
            Err(e) => return fail_early(reporter, e),
        },
        None => session.sources.clone(),
    };
    if let Some(header) = &args.custom_header {
        let header_only = InvocationArgs {
            custom_header: Some(header.clone()),
            ..InvocationArgs::default()
        };
        if let Err(e) = validate_arguments(&header_only, session.host.as_ref()) {
            return fail_early(reporter, e);
        }
        sources = sources.with_custom_header(header);
    }

    let query = PackageQuery {
        query: args.query,
        id: args.id,
        name: args.name,
        moniker: args.moniker,
        exact: args.exact,
        ..PackageQuery::default()
    };

    let start = std::time::Instant::now();
    let mut candidates: Vec<Candidate> = match search::search(&sources, &query).await {
        Ok(matches) => matches.into_iter().map(|m| m.candidate).collect(),
        Err(e) => return fail_early(reporter, e),
    };

    if candidates.is_empty() {
        reporter.info(&format!("No packages found matching {}", query.describe()));
        return exit_code::NO_MATCH_FOUND;
    }

    candidates.sort_by(|a, b| a.match_kind.cmp(&b.match_kind).then_with(|| a.id.cmp(&b.id)));
    print_candidates(&mut std::io::stdout().lock(), &candidates);

    tracing::debug!(
        "Search for {} returned {} in {:.2}s",
        query.describe(),
        candidates.len(),
        start.elapsed().as_secs_f64()
    );
    reporter.info(&format!("{} package(s) found", candidates.len()));
    exit_code::SUCCESS
}
