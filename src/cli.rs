//! Command line interface definitions.

use std::ffi::OsString;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use procvisor::{SupervisorConfig, WorkerCommand};

/// Process supervisor: a fixed pool of line-oriented workers, restarted one-for-one.
#[derive(Parser, Debug)]
#[command(name = "procvisor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Supervise a worker pool: lines on stdin are spread across workers,
    /// worker output lines are written to stdout
    Supervise(SuperviseArgs),

    /// Run producer tasks that feed one collector over private channels
    Fanin(FaninArgs),

    /// Run the bundled calculator worker on stdin/stdout
    #[command(hide = true)]
    Worker,
}

/// Arguments for the supervise command.
#[derive(Args, Debug)]
pub struct SuperviseArgs {
    /// Number of worker slots
    #[arg(short, long, env = "PROCVISOR_WORKERS", default_value_t = 2,
          value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Upper bound of one readiness wait, in milliseconds
    #[arg(long, env = "PROCVISOR_TICK_MS", default_value_t = 1000)]
    pub tick_ms: u64,

    /// Longest line passed through, in bytes (terminator excluded)
    #[arg(long, env = "PROCVISOR_MAX_LINE", default_value_t = 255)]
    pub max_line: usize,

    /// Input bytes that may wait for one worker, lines beyond it are dropped
    #[arg(long, env = "PROCVISOR_WRITE_BUFFER", default_value_t = 64 * 1024)]
    pub write_buffer: usize,

    /// Do not log events to stderr
    #[arg(short, long, env = "PROCVISOR_QUIET")]
    pub quiet: bool,

    /// Worker program and its arguments (default: the bundled calculator)
    #[arg(last = true, value_name = "PROGRAM")]
    pub program: Vec<OsString>,
}

impl SuperviseArgs {
    /// Maps the arguments onto a supervisor configuration.
    pub fn to_config(&self) -> SupervisorConfig {
        let worker = match self.program.split_first() {
            Some((program, args)) => WorkerCommand::program(program).args(args.iter().cloned()),
            None => WorkerCommand::default(),
        };
        SupervisorConfig {
            pool_size: usize::from(self.workers),
            tick: Duration::from_millis(self.tick_ms),
            max_line: self.max_line,
            write_buffer: self.write_buffer,
            worker,
            ..SupervisorConfig::default()
        }
    }
}

/// Arguments for the fanin command.
#[derive(Args, Debug)]
pub struct FaninArgs {
    /// Number of producers
    #[arg(short, long, default_value_t = 4)]
    pub producers: usize,

    /// Values sent by each producer
    #[arg(short = 'n', long, default_value_t = 1000)]
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trailing_program_becomes_the_worker() {
        let cli = Cli::parse_from(["procvisor", "supervise", "-w", "3", "--", "sh", "-c", "cat"]);
        let Commands::Supervise(args) = cli.command else {
            panic!("expected supervise");
        };
        let cfg = args.to_config();
        assert_eq!(cfg.pool_size, 3);
        assert_eq!(cfg.worker, WorkerCommand::program("sh").args(["-c", "cat"]));
    }

    #[test]
    fn defaults_run_the_bundled_worker() {
        let cli = Cli::parse_from(["procvisor", "supervise"]);
        let Commands::Supervise(args) = cli.command else {
            panic!("expected supervise");
        };
        let cfg = args.to_config();
        assert_eq!(cfg.worker, WorkerCommand::default());
        assert_eq!(cfg.tick, Duration::from_secs(1));
        assert_eq!(cfg.max_line, 255);
        assert_eq!(cfg.write_buffer, 64 * 1024);
    }

    #[test]
    fn zero_workers_is_a_usage_error() {
        assert!(Cli::try_parse_from(["procvisor", "supervise", "-w", "0"]).is_err());
    }
}
