//! Supervised external processes.
//!
//! [`ControlledSubprocess`] owns one long-running child: it launches it without
//! waiting for any readiness signal, keeps its output drained in the
//! background, and stops it with a termination request that escalates to a
//! forced kill once the grace period runs out. [`run_bounded`] covers the
//! one-shot subcommands, where the harness waits for completion but never
//! longer than a fixed timeout.

use super::capture::{StreamCapture, DEFAULT_CAPTURE_LIMIT};
use super::command::CommandLine;
use log::{debug, info, warn};
use std::fmt;
use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

/// How often liveness is polled while waiting on a child
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Extra time given to reader threads to hit end-of-file after the child exits
const OUTPUT_SETTLE: Duration = Duration::from_millis(200);

/// How a [`ControlledSubprocess::stop`] call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process had already exited before the stop request
    AlreadyExited(ExitStatus),
    /// The process exited within the grace period after the termination request
    Graceful(ExitStatus),
    /// The grace period expired and the process was killed
    Forced(Option<ExitStatus>),
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::AlreadyExited(status) => write!(f, "already exited ({})", status),
            StopOutcome::Graceful(status) => write!(f, "stopped gracefully ({})", status),
            StopOutcome::Forced(Some(status)) => write!(f, "killed after grace period ({})", status),
            StopOutcome::Forced(None) => write!(f, "killed after grace period"),
        }
    }
}

/// One external process under harness control
pub struct ControlledSubprocess {
    label: String,
    grace: Duration,
    child: Option<Child>,
    stdout: Option<StreamCapture>,
    stderr: Option<StreamCapture>,
    exit_status: Option<ExitStatus>,
}

impl ControlledSubprocess {
    /// Create an idle handle; `grace` bounds how long `stop` waits before killing
    pub fn new(label: impl Into<String>, grace: Duration) -> Self {
        Self {
            label: label.into(),
            grace,
            child: None,
            stdout: None,
            stderr: None,
            exit_status: None,
        }
    }

    /// Launch the process and return its pid immediately.
    ///
    /// Fails with `AlreadyExists` if this handle already owns a process.
    pub fn start(&mut self, command: &CommandLine) -> io::Result<u32> {
        if self.child.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is already running", self.label),
            ));
        }

        debug!("Spawning {}: {}", self.label, command);
        let mut child = command.to_command().spawn()?;
        let pid = child.id();

        self.stdout = child
            .stdout
            .take()
            .map(|out| StreamCapture::spawn(out, format!("{}-stdout", self.label), DEFAULT_CAPTURE_LIMIT));
        self.stderr = child
            .stderr
            .take()
            .map(|err| StreamCapture::spawn(err, format!("{}-stderr", self.label), DEFAULT_CAPTURE_LIMIT));
        self.exit_status = None;
        self.child = Some(child);

        Ok(pid)
    }

    /// Pid of the owned process, if one is running or awaiting a stop
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Report liveness without blocking
    pub fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                false
            }
            Err(e) => {
                warn!("Could not poll {}: {}", self.label, e);
                false
            }
        }
    }

    /// Exit status observed so far, if the process has exited
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Captured standard output so far
    pub fn stdout_tail(&self) -> String {
        self.stdout.as_ref().map(StreamCapture::contents).unwrap_or_default()
    }

    /// Captured standard error so far
    pub fn stderr_tail(&self) -> String {
        self.stderr.as_ref().map(StreamCapture::contents).unwrap_or_default()
    }

    /// Request termination and wait for the process to exit.
    ///
    /// Blocks for at most the grace period before escalating to a kill.
    /// Returns `None` when there is nothing to stop.
    pub fn stop(&mut self) -> Option<StopOutcome> {
        let mut child = self.child.take()?;

        if let Ok(Some(status)) = child.try_wait() {
            self.exit_status = Some(status);
            return Some(StopOutcome::AlreadyExited(status));
        }

        request_termination(&mut child, &self.label);

        let deadline = Instant::now() + self.grace;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.exit_status = Some(status);
                    return Some(StopOutcome::Graceful(status));
                }
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(e) => {
                    warn!("Could not poll {} while stopping: {}", self.label, e);
                    break;
                }
            }
        }

        info!("{} did not exit within {:?}, killing it", self.label, self.grace);
        force_kill(&mut child, &self.label);
        let status = child.wait().ok();
        self.exit_status = status;
        Some(StopOutcome::Forced(status))
    }
}

impl Drop for ControlledSubprocess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            force_kill(&mut child, &self.label);
            let _ = child.wait();
        }
    }
}

/// Send `signal` to the child's process group.
///
/// Children are spawned as group leaders (see [`CommandLine::to_command`]), so
/// this also reaches processes started by a wrapper such as `cargo run`.
#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) -> io::Result<()> {
    // SAFETY: kill(2) has no memory-safety preconditions; the group is led by a child we have not reaped.
    let rc = unsafe { libc::kill(-(child.id() as libc::pid_t), signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child, label: &str) {
    if let Err(e) = signal_group(child, libc::SIGTERM) {
        warn!("SIGTERM to {} failed: {}", label, e);
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child, label: &str) {
    force_kill(child, label);
}

#[cfg(unix)]
fn force_kill(child: &mut Child, label: &str) {
    if let Err(e) = signal_group(child, libc::SIGKILL) {
        debug!("SIGKILL to group of {} failed: {}", label, e);
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn force_kill(child: &mut Child, label: &str) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill {}: {}", label, e);
    }
}

/// Result of a one-shot command run under a timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundedRun {
    Completed {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    TimedOut,
    SpawnFailed(String),
}

/// Run a one-shot command, killing it if it is still running after `timeout`
pub fn run_bounded(command: &CommandLine, timeout: Duration) -> BoundedRun {
    debug!("Running {} with timeout {:?}", command, timeout);
    let mut child = match command.to_command().spawn() {
        Ok(child) => child,
        Err(e) => return BoundedRun::SpawnFailed(e.to_string()),
    };

    let label = command.subcommand.as_str().to_string();
    let stdout = child
        .stdout
        .take()
        .map(|out| StreamCapture::spawn(out, format!("{}-stdout", label), DEFAULT_CAPTURE_LIMIT));
    let stderr = child
        .stderr
        .take()
        .map(|err| StreamCapture::spawn(err, format!("{}-stderr", label), DEFAULT_CAPTURE_LIMIT));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                let now = Instant::now();
                if now >= deadline {
                    force_kill(&mut child, &label);
                    let _ = child.wait();
                    return BoundedRun::TimedOut;
                }
                thread::sleep(POLL_INTERVAL.min(deadline - now));
            }
            Err(e) => {
                force_kill(&mut child, &label);
                let _ = child.wait();
                return BoundedRun::SpawnFailed(e.to_string());
            }
        }
    };

    // A grandchild may still hold the pipes open; bound the wait for output by what is left of the timeout
    let settle = deadline.saturating_duration_since(Instant::now()).max(OUTPUT_SETTLE);
    let collect = |capture: Option<StreamCapture>| {
        capture
            .map(|c| {
                c.wait_closed(settle);
                c.contents()
            })
            .unwrap_or_default()
    };

    BoundedRun::Completed {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process::types::RouterSubcommand;
    use std::path::PathBuf;

    fn sh(script: &str, subcommand: RouterSubcommand) -> CommandLine {
        CommandLine {
            subcommand,
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: PathBuf::from("/"),
        }
    }

    #[test]
    fn test_stop_on_idle_handle_is_noop() {
        let mut process = ControlledSubprocess::new("idle", Duration::from_secs(1));
        assert!(!process.is_running());
        assert!(process.stop().is_none());
        assert!(process.stop().is_none());
    }

    #[test]
    fn test_graceful_stop() {
        let mut process = ControlledSubprocess::new("sleeper", Duration::from_secs(5));
        process.start(&sh("exec sleep 30", RouterSubcommand::Start)).unwrap();
        assert!(process.is_running());
        assert!(process.pid().is_some());

        let outcome = process.stop().unwrap();
        assert!(matches!(outcome, StopOutcome::Graceful(_)));
        assert!(!process.is_running());
        assert!(process.stop().is_none());
    }

    #[test]
    fn test_forced_stop_after_grace() {
        let mut process = ControlledSubprocess::new("stubborn", Duration::from_millis(200));
        process
            .start(&sh("trap '' TERM; while true; do sleep 1; done", RouterSubcommand::Start))
            .unwrap();
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        let outcome = process.stop().unwrap();
        assert!(matches!(outcome, StopOutcome::Forced(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_output_flood_does_not_block_child() {
        let mut process = ControlledSubprocess::new("flood", Duration::from_secs(1));
        process
            .start(&sh("yes flood | head -c 1000000; echo done >&2", RouterSubcommand::Start))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while process.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!process.is_running());
        // stderr is written after the flood, so the child was never blocked on stdout
        assert!(process.stderr_tail().contains("done"));
        assert!(process.stdout_tail().len() <= DEFAULT_CAPTURE_LIMIT);
        assert!(matches!(process.stop(), Some(StopOutcome::AlreadyExited(_))));
    }

    #[test]
    fn test_run_bounded_completes() {
        match run_bounded(&sh("echo up; echo warn >&2; exit 3", RouterSubcommand::Status), Duration::from_secs(5)) {
            BoundedRun::Completed { status, stdout, stderr } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stdout, "up\n");
                assert_eq!(stderr, "warn\n");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_run_bounded_times_out() {
        let started = Instant::now();
        let result = run_bounded(&sh("exec sleep 30", RouterSubcommand::Status), Duration::from_millis(200));
        assert_eq!(result, BoundedRun::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_run_bounded_spawn_failure() {
        let mut line = sh("true", RouterSubcommand::Test);
        line.program = "/nonexistent/router-binary".to_string();
        assert!(matches!(run_bounded(&line, Duration::from_secs(1)), BoundedRun::SpawnFailed(_)));
    }
}
