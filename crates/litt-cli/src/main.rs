use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use litt_cli::commands::{Context, Session, alias, config, ls, status, stopwatch, track};
use litt_cli::exit::{DryRun, exit_code};
use litt_cli::hooks::ScriptHooks;
use litt_cli::{Cli, Commands, Config, LedgerCommand};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if !err.is::<DryRun>() {
                eprintln!("error: {err:#}");
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let ctx = Context::new(config, cli.output_format, Utc::now());
    let hooks = ScriptHooks::new(&ctx.config);
    let mut stdout = io::stdout().lock();

    let command = match cli.command {
        Some(Commands::Config) => {
            config::run(&mut stdout, &ctx, &hooks, cli.output_format)?;
            stdout.flush()?;
            return Ok(());
        }
        Some(Commands::Ledger(command)) => Some(command),
        None => None,
    };

    let mut session = Session::open(&ctx.config.data_dir, hooks)?;
    let ledger = session.ledger_mut();
    match &command {
        None => status::run(&mut stdout, &ctx, ledger)?,
        Some(LedgerCommand::Alias { key, fields }) => {
            alias::run(&mut stdout, &ctx, ledger, key.as_deref(), fields)?;
        }
        Some(LedgerCommand::Start { fields, start_time }) => {
            stopwatch::start(&ctx, ledger, fields, start_time.as_deref())?;
        }
        Some(LedgerCommand::Stop {
            fields,
            commit,
            end_time,
        }) => stopwatch::stop(
            &mut stdout,
            &ctx,
            ledger,
            fields,
            commit,
            end_time.as_deref(),
        )?,
        Some(LedgerCommand::Sw {
            fields,
            commit,
            start_time,
            end_time,
        }) => stopwatch::toggle(
            &mut stdout,
            &ctx,
            ledger,
            fields,
            commit,
            start_time.as_deref(),
            end_time.as_deref(),
        )?,
        Some(LedgerCommand::Cancel) => stopwatch::cancel(&mut stdout, &ctx, ledger)?,
        Some(LedgerCommand::Interrupt { fields }) => stopwatch::interrupt(&ctx, ledger, fields)?,
        Some(LedgerCommand::Resume { fields, commit }) => {
            stopwatch::resume(&mut stdout, &ctx, ledger, fields, commit)?;
        }
        Some(LedgerCommand::Track {
            fields,
            commit,
            interval,
            dryrun,
        }) => track::track(&mut stdout, &ctx, ledger, fields, commit, interval, *dryrun)?,
        Some(LedgerCommand::Amend {
            id,
            fields,
            untags,
            interval,
            dryrun,
        }) => track::amend(
            &mut stdout,
            &ctx,
            ledger,
            id,
            fields,
            untags,
            interval,
            *dryrun,
        )?,
        Some(LedgerCommand::Ls(args)) => ls::run(&mut stdout, &ctx, ledger, args)?,
    }
    stdout.flush()?;

    if session.commit()? {
        tracing::debug!("ledger persisted");
    }
    Ok(())
}
