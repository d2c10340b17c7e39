//! procvisor - process supervisor

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use procvisor::{RunReport, StopCause, Subscribe, Supervisor, calc, fanin};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands, FaninArgs, SuperviseArgs};

/// Parses arguments, dispatches the subcommand, and prints the error chain on failure.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Worker => calc::worker_main(),
        Commands::Supervise(args) => cmd_supervise(args),
        Commands::Fanin(args) => cmd_fanin(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Single-threaded runtime: the event loop is one task.
fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the tokio runtime")
}

fn cmd_supervise(args: &SuperviseArgs) -> Result<()> {
    let cfg = args.to_config();
    let rt = runtime()?;

    let result = rt.block_on(async {
        let subs = subscribers(args.quiet);
        let sup = Supervisor::builder(cfg).with_subscribers(subs).build();

        let token = CancellationToken::new();
        procvisor::cancel_on_signal(token.clone());

        sup.run(tokio::io::stdin(), tokio::io::stdout(), token).await
    });
    // A pending stdin read lives on a blocking thread; do not wait for it.
    rt.shutdown_background();

    let report = result.context("supervisor stopped")?;
    if !args.quiet {
        eprintln!("{}", summary(&report));
    }
    Ok(())
}

fn cmd_fanin(args: &FaninArgs) -> Result<()> {
    let rt = runtime()?;
    let report = rt
        .block_on(fanin::run(args.producers, args.count, tokio::io::stdout()))
        .context("fan-in failed")?;
    eprintln!(
        "[fanin] producers={} total={}",
        report.per_producer.len(),
        report.total()
    );
    Ok(())
}

#[cfg(feature = "logging")]
fn subscribers(quiet: bool) -> Vec<Arc<dyn Subscribe>> {
    if quiet {
        Vec::new()
    } else {
        vec![Arc::new(procvisor::LogWriter::new())]
    }
}

#[cfg(not(feature = "logging"))]
fn subscribers(_quiet: bool) -> Vec<Arc<dyn Subscribe>> {
    Vec::new()
}

fn summary(report: &RunReport) -> String {
    let cause = match report.cause {
        StopCause::InputClosed => "input-closed",
        StopCause::Cancelled => "cancelled",
    };
    format!(
        "[summary] cause={cause} dispatched={} relayed={} dropped={} crashes={} restarts={}",
        report.lines_dispatched,
        report.lines_relayed,
        report.lines_dropped,
        report.crashes,
        report.restarts
    )
}
