//! # Exit status analysis.
//!
//! Turns an [`ExitStatus`] into a [`TerminationReason`] for events and logs.
//! The supervisor restarts regardless of the reason; the classification only
//! tells a crash apart from a clean exit.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

/// Why a worker process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Normal exit with status code.
    Exited(i32),
    /// Killed by a known signal.
    Signaled(Signal),
    /// Killed by a signal number nix does not know.
    SignaledRaw(i32),
    /// The status could not be determined (e.g. `try_wait` failed).
    Unknown,
}

impl TerminationReason {
    /// Classifies an exit status.
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return TerminationReason::Exited(code);
        }
        match status.signal() {
            Some(raw) => match Signal::try_from(raw) {
                Ok(sig) => TerminationReason::Signaled(sig),
                Err(_) => TerminationReason::SignaledRaw(raw),
            },
            None => TerminationReason::Unknown,
        }
    }

    /// True for anything but a zero exit code.
    pub fn is_crash(&self) -> bool {
        !matches!(self, TerminationReason::Exited(0))
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Exited(code) => write!(f, "exited with code {code}"),
            TerminationReason::Signaled(sig) => write!(f, "killed by {}", sig.as_str()),
            TerminationReason::SignaledRaw(raw) => write!(f, "killed by signal {raw}"),
            TerminationReason::Unknown => f.write_str("terminated for an unknown reason"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_preserved() {
        let reason = TerminationReason::from_status(ExitStatus::from_raw(3 << 8));
        assert_eq!(reason, TerminationReason::Exited(3));
        assert!(reason.is_crash());

        let clean = TerminationReason::from_status(ExitStatus::from_raw(0));
        assert!(!clean.is_crash());
        assert_eq!(clean.to_string(), "exited with code 0");
    }

    #[test]
    fn signals_are_named() {
        let reason = TerminationReason::from_status(ExitStatus::from_raw(Signal::SIGABRT as i32));
        assert_eq!(reason, TerminationReason::Signaled(Signal::SIGABRT));
        assert_eq!(reason.to_string(), "killed by SIGABRT");
        assert!(reason.is_crash());
    }
}
