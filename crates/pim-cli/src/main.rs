//! pim - a package installer client

use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use pim_core::{Reporter, exit_code};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pim_cli::cmd::{self, Session};
use pim_cli::ui::ConsoleReporter;
use pim_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("{e:#}");
        return ExitCode::from(exit_code_byte(exit_code::INFRASTRUCTURE));
    }

    let code = run(cli).await;
    tracing::debug!("Exiting with code {code}");
    ExitCode::from(exit_code_byte(code))
}

/// `RUST_LOG` decides the level (default `warn`); output goes to stderr or,
/// with `--log-file`, to that file without colors.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn exit_code_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

async fn run(cli: Cli) -> i32 {
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(cli.quiet));

    let cancel = CancellationToken::new();
    {
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling");
                token.cancel();
            }
        });
    }

    match cli.command {
        Commands::Install(args) => match load_session(reporter.as_ref()) {
            Ok(session) => cmd::install::install(&session, args, reporter, cancel).await,
            Err(code) => code,
        },
        Commands::Show(args) => match load_session(reporter.as_ref()) {
            Ok(session) => cmd::show::show(&session, args, reporter, cancel).await,
            Err(code) => code,
        },
        Commands::Search(args) => match load_session(reporter.as_ref()) {
            Ok(session) => cmd::search::search(&session, args, reporter.as_ref()).await,
            Err(code) => code,
        },
        Commands::Complete { word, arg, context } => match load_session(reporter.as_ref()) {
            Ok(session) => {
                let context = pim_core::args::InvocationArgs::from(context);
                cmd::complete::complete(&session, &arg, &word, &context, reporter.as_ref()).await
            }
            Err(code) => code,
        },
        Commands::Hash { files } => match cmd::hash::hash(&files) {
            Ok(()) => exit_code::SUCCESS,
            Err(e) => {
                reporter.error(&format!("{e:#}"));
                exit_code::INFRASTRUCTURE
            }
        },
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            exit_code::SUCCESS
        }
    }
}

fn load_session(reporter: &dyn Reporter) -> Result<Session, i32> {
    Session::load().map_err(|e| {
        reporter.error(&format!("{e:#}"));
        exit_code::INFRASTRUCTURE
    })
}
