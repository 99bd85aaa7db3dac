//! Router status probing.
//!
//! A probe runs the router's `status` subcommand against one instance's
//! config file. Every failure mode is folded into a [`ProbeOutcome`] so one
//! unresponsive instance never aborts a probing round.

use crate::process::{run_bounded, BoundedRun, RouterCommand};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result of one status query, always renderable as a status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// `status` exited 0; carries its stdout
    Reported(String),
    /// `status` exited non-zero; carries its error text
    CommandFailed(String),
    /// `status` did not finish within the timeout
    TimedOut(Duration),
    /// `status` could not be launched
    QueryFailed(String),
    /// The instance was never started
    NotRunning,
    /// The router process is gone; carries its exit status and last stderr
    RouterExited(String),
}

impl ProbeOutcome {
    /// Whether the query produced a healthy status report
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeOutcome::Reported(_))
    }

    /// Short machine-friendly name of the outcome
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeOutcome::Reported(_) => "reported",
            ProbeOutcome::CommandFailed(_) => "command_failed",
            ProbeOutcome::TimedOut(_) => "timed_out",
            ProbeOutcome::QueryFailed(_) => "query_failed",
            ProbeOutcome::NotRunning => "not_running",
            ProbeOutcome::RouterExited(_) => "router_exited",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Reported(text) => f.write_str(text),
            ProbeOutcome::CommandFailed(text) => f.write_str(text),
            ProbeOutcome::TimedOut(timeout) => write!(f, "status query timed out after {:?}", timeout),
            ProbeOutcome::QueryFailed(reason) => write!(f, "status query failed: {}", reason),
            ProbeOutcome::NotRunning => f.write_str("not running"),
            ProbeOutcome::RouterExited(detail) => write!(f, "router exited: {}", detail),
        }
    }
}

/// Runs bounded `status` queries against router config files
#[derive(Debug, Clone)]
pub struct StatusProbe {
    command: RouterCommand,
    working_dir: PathBuf,
    timeout: Duration,
}

impl StatusProbe {
    pub fn new(command: RouterCommand, working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command,
            working_dir: working_dir.into(),
            timeout,
        }
    }

    /// Query with the probe's configured timeout
    pub fn query_default(&self, config_path: &Path) -> ProbeOutcome {
        self.query(config_path, self.timeout)
    }

    /// Run `status -c <config_path>` and interpret the result.
    ///
    /// Returns within roughly `timeout`; never propagates an error.
    pub fn query(&self, config_path: &Path, timeout: Duration) -> ProbeOutcome {
        let line = self.command.status(config_path, &self.working_dir);
        match run_bounded(&line, timeout) {
            BoundedRun::Completed { status, stdout, .. } if status.success() => {
                ProbeOutcome::Reported(stdout.trim_end().to_string())
            }
            BoundedRun::Completed { status, stdout, stderr } => {
                let text = if stderr.trim().is_empty() { stdout } else { stderr };
                ProbeOutcome::CommandFailed(format!("{}: {}", status, text.trim_end()))
            }
            BoundedRun::TimedOut => ProbeOutcome::TimedOut(timeout),
            BoundedRun::SpawnFailed(reason) => ProbeOutcome::QueryFailed(reason),
        }
    }
}
