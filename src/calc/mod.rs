//! # Bundled worker: a stack-based integer calculator.
//!
//! Run by the hidden `worker` subcommand. Reads lines of whitespace separated
//! tokens from stdin and writes results to stdout, one line each.
//!
//! ```text
//! 3 4 +        →  7
//! 1 2 . 5      →  2, 5
//! 2 foo 3 *    →  invalid token: "foo", 6
//! 10 0 /       →  (process aborts)
//! ```
//!
//! Faults end the process without writing anything for the faulting line:
//! stack underflow and overflow exit with status 1, division by zero aborts.
//! The supervisor observes either as a worker exit and restarts the slot.

mod machine;

use std::io::{self, BufRead, Write};

pub use machine::{Fault, Machine, STACK_DEPTH};

/// Why the calculator loop stopped before end of input.
#[derive(Debug, thiserror::Error)]
pub enum Stop {
    /// The machine hit an unrecoverable condition.
    #[error(transparent)]
    Fault(#[from] Fault),
    /// Reading input or writing output failed.
    #[error("calculator i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl Stop {
    /// Ends the process the way the fault demands.
    pub fn terminate(self) -> ! {
        match self {
            Stop::Fault(Fault::DivideByZero) => std::process::abort(),
            Stop::Fault(Fault::Underflow | Fault::Overflow) | Stop::Io(_) => {
                std::process::exit(1)
            }
        }
    }
}

/// Evaluates `input` line by line until end-of-stream.
///
/// Every result line is flushed as soon as its input line is done.
pub fn run<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<(), Stop> {
    let mut machine = Machine::new();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if input.read_until(b'\n', &mut raw)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&raw);
        let printed = machine.eval_line(&line)?;
        if printed.is_empty() {
            continue;
        }
        for p in printed {
            writeln!(output, "{p}")?;
        }
        output.flush()?;
    }
}

/// Entry point of the `worker` subcommand: runs on the process's stdio.
pub fn worker_main() -> ! {
    match run(io::stdin().lock(), io::stdout().lock()) {
        Ok(()) => std::process::exit(0),
        Err(stop) => stop.terminate(),
    }
}
