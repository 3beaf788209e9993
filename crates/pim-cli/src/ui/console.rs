//! Terminal implementation of the engine's [`Reporter`].

use std::io::{IsTerminal, Write};
use std::sync::{Mutex, PoisonError};

use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use pim_core::ExecutionStage;
use pim_core::Reporter;
use pim_core::search::Candidate;
use pim_schema::{PackageId, Version};

use super::progress::format_download_progress;
use super::theme::Theme;

/// Prints stages, progress and messages to the terminal.
///
/// Normal output goes to stdout, warnings and errors to stderr. In quiet mode
/// only warnings, errors, search results and final outcomes are printed.
#[derive(Debug)]
pub struct ConsoleReporter {
    theme: Theme,
    quiet: bool,
    live: bool,
    /// Serializes writes and remembers whether a progress line is open.
    progress_open: Mutex<bool>,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            theme: Theme::default(),
            quiet,
            live: std::io::stdout().is_terminal(),
            progress_open: Mutex::new(false),
        }
    }

    fn with_stdout(&self, f: impl FnOnce(&mut std::io::StdoutLock<'_>)) {
        let mut open = self.progress_open.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = std::io::stdout().lock();
        if *open {
            let _ = writeln!(out);
            *open = false;
        }
        f(&mut out);
        let _ = out.flush();
    }

    fn with_stderr(&self, f: impl FnOnce(&mut std::io::StderrLock<'_>)) {
        let mut open = self.progress_open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            let _ = writeln!(std::io::stdout());
            *open = false;
        }
        let mut err = std::io::stderr().lock();
        f(&mut err);
        let _ = err.flush();
    }
}

/// Print one row per candidate: id, newest version, source.
pub fn print_candidates(out: &mut impl Write, candidates: &[Candidate]) {
    let width = candidates
        .iter()
        .map(|c| c.id.len())
        .max()
        .unwrap_or(0)
        .max(10);
    for c in candidates {
        let _ = writeln!(
            out,
            "  {}  {:<12}  {}",
            format!("{:<width$}", c.id.as_str()).cyan(),
            c.version.as_str(),
            c.source.as_str().dark_grey()
        );
    }
}

impl Reporter for ConsoleReporter {
    fn stage(&self, stage: ExecutionStage) {
        if self.quiet || stage <= ExecutionStage::ParseArgs {
            return;
        }
        tracing::debug!("Stage {stage}");
        self.with_stdout(|out| {
            let _ = writeln!(
                out,
                "{} {}",
                self.theme.icons.active.with(self.theme.colors.stage),
                stage.as_str().with(self.theme.colors.secondary)
            );
        });
    }

    fn downloading(&self, id: &PackageId, _version: &Version, current: u64, total: Option<u64>) {
        if self.quiet || !self.live {
            return;
        }
        let mut open = self.progress_open.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = std::io::stdout().lock();
        let _ = write!(
            out,
            "\r{}  {}  {}",
            Clear(ClearType::CurrentLine),
            id.as_str().with(self.theme.colors.package),
            format_download_progress(current, total)
        );
        let _ = out.flush();
        *open = true;
    }

    fn installing(&self, id: &PackageId, version: &Version) {
        if self.quiet {
            return;
        }
        self.with_stdout(|out| {
            let _ = writeln!(
                out,
                "  {} Installing {} {}",
                self.theme.icons.active.with(self.theme.colors.stage),
                id.as_str().with(self.theme.colors.package),
                version.as_str().with(self.theme.colors.secondary)
            );
        });
    }

    fn done(&self, id: &PackageId, version: &Version, detail: &str) {
        self.with_stdout(|out| {
            let _ = writeln!(
                out,
                "  {} {} {} {}",
                self.theme.icons.success.with(self.theme.colors.success),
                id.as_str().with(self.theme.colors.package),
                version.as_str().with(self.theme.colors.secondary),
                detail
            );
        });
    }

    fn failed(&self, id: &PackageId, version: &Version, reason: &str) {
        self.with_stderr(|err| {
            let _ = writeln!(
                err,
                "  {} {} {} {}",
                self.theme.icons.error.with(self.theme.colors.error),
                id.as_str().with(self.theme.colors.package),
                version.as_str().with(self.theme.colors.secondary),
                reason
            );
        });
    }

    fn search_results(&self, candidates: &[Candidate]) {
        self.with_stdout(|out| {
            let _ = writeln!(out, "The following packages match; refine the query:");
            print_candidates(out, candidates);
        });
    }

    fn info(&self, msg: &str) {
        if self.quiet {
            return;
        }
        self.with_stdout(|out| {
            let _ = writeln!(out, "{msg}");
        });
    }

    fn success(&self, msg: &str) {
        self.with_stdout(|out| {
            let _ = writeln!(
                out,
                "{} {}",
                self.theme.icons.success.with(self.theme.colors.success),
                msg.bold()
            );
        });
    }

    fn warning(&self, msg: &str) {
        self.with_stderr(|err| {
            let _ = writeln!(
                err,
                "{} {}",
                self.theme.icons.warning.with(self.theme.colors.warning),
                msg.with(self.theme.colors.warning)
            );
        });
    }

    fn error(&self, msg: &str) {
        self.with_stderr(|err| {
            let _ = writeln!(
                err,
                "{} {}",
                self.theme.icons.error.with(self.theme.colors.error),
                msg.with(self.theme.colors.error)
            );
        });
    }
}
