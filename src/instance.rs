//! Router instance lifecycle.
//!
//! A [`RouterInstance`] ties together one router's identity, its generated
//! configuration and the subprocess running it. Its lifecycle only moves
//! forward:
//!
//! ```text
//! Created ──configure──▶ Configured ──spawn──▶ Started ──stop──▶ Stopped
//! ```
//!
//! Restarting a stopped instance is not supported; build a new one instead.

use crate::cleanup::CleanupManager;
use crate::descriptor::{ConfigurationDescriptor, RouterDefaults};
use crate::generator::{missing_dirs, write_descriptor, ConfigWriteError};
use crate::probe::{ProbeOutcome, StatusProbe};
use crate::process::{ControlledSubprocess, RouterCommand, StopOutcome};
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lifecycle states, in the only order they can be visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Created,
    Configured,
    Started,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Configured => "configured",
            LifecycleState::Started => "started",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Failures scoped to a single instance; they never abort the whole run
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("{instance}: {source}")]
    ConfigWrite {
        instance: String,
        #[source]
        source: ConfigWriteError,
    },

    #[error("{instance}: failed to spawn `{command}`: {source}")]
    ProcessSpawn {
        instance: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{instance}: cannot start from state {state}")]
    InvalidState { instance: String, state: LifecycleState },

    #[error("{instance}: run is shutting down, not starting")]
    Cancelled { instance: String },
}

/// One router process under test
pub struct RouterInstance {
    name: String,
    address: String,
    port: u16,
    config_path: PathBuf,
    log_path: PathBuf,
    descriptor: ConfigurationDescriptor,
    process: ControlledSubprocess,
    state: LifecycleState,
}

impl RouterInstance {
    /// Create an instance whose files will live in `dir` as `<name>.json` and `<name>.log`.
    ///
    /// Nothing is written until [`RouterInstance::configure`] or [`RouterInstance::start`].
    pub fn new(
        name: &str,
        address: &str,
        port: u16,
        dir: &Path,
        participates: bool,
        defaults: &RouterDefaults,
        stop_grace: Duration,
    ) -> Self {
        let config_path = dir.join(format!("{}.json", name));
        let log_path = dir.join(format!("{}.log", name));
        let descriptor = ConfigurationDescriptor::for_instance(name, address, port, &log_path, participates, defaults);

        Self {
            name: name.to_string(),
            address: address.to_string(),
            port,
            config_path,
            log_path,
            descriptor,
            process: ControlledSubprocess::new(name, stop_grace),
            state: LifecycleState::Created,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn descriptor(&self) -> &ConfigurationDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Write the configuration file: `Created | Configured -> Configured`.
    ///
    /// Both scratch paths, and any directory created to hold them, are
    /// registered for cleanup before anything is written.
    pub fn configure(&mut self, cleanup: &CleanupManager) -> Result<(), InstanceError> {
        if self.state > LifecycleState::Configured {
            return Err(InstanceError::InvalidState {
                instance: self.name.clone(),
                state: self.state,
            });
        }

        let registered = missing_dirs(&self.config_path)
            .into_iter()
            .all(|dir| cleanup.register_dir(dir))
            && cleanup.register(&self.config_path)
            && cleanup.register(&self.log_path);
        if !registered {
            return Err(InstanceError::Cancelled {
                instance: self.name.clone(),
            });
        }

        write_descriptor(&self.descriptor, &self.config_path).map_err(|source| InstanceError::ConfigWrite {
            instance: self.name.clone(),
            source,
        })?;

        // Cleanup may have run while the file was being written
        if cleanup.has_run() {
            let _ = std::fs::remove_file(&self.config_path);
            return Err(InstanceError::Cancelled {
                instance: self.name.clone(),
            });
        }

        self.state = LifecycleState::Configured;
        info!("{} configured at {}", self.name, self.config_path.display());
        Ok(())
    }

    /// Configure if needed, then launch the router: `-> Started`.
    ///
    /// Returns the router's pid without waiting for it to become ready.
    pub fn start(
        &mut self,
        command: &RouterCommand,
        working_dir: &Path,
        cleanup: &CleanupManager,
    ) -> Result<u32, InstanceError> {
        match self.state {
            LifecycleState::Created => self.configure(cleanup)?,
            LifecycleState::Configured => {}
            state => {
                return Err(InstanceError::InvalidState {
                    instance: self.name.clone(),
                    state,
                })
            }
        }

        let line = command.start(&self.config_path, working_dir);
        let pid = self.process.start(&line).map_err(|source| InstanceError::ProcessSpawn {
            instance: self.name.clone(),
            command: line.to_string(),
            source,
        })?;

        self.state = LifecycleState::Started;
        info!(
            "Started router {} (IP: {}, Port: {}, pid {})",
            self.name, self.address, self.port, pid
        );
        Ok(pid)
    }

    /// Stop the router: `Started -> Stopped`.
    ///
    /// A no-op returning `None` in any other state.
    pub fn stop(&mut self) -> Option<StopOutcome> {
        if self.state != LifecycleState::Started {
            return None;
        }
        let outcome = self.process.stop();
        self.state = LifecycleState::Stopped;
        if let Some(outcome) = &outcome {
            info!("Stopped router {}: {}", self.name, outcome);
        }
        outcome
    }

    /// Query the router's status.
    ///
    /// Before `Started` this is the `not running` sentinel. A router that
    /// already died is reported with its exit status and last line of output,
    /// stderr first.
    pub fn status(&mut self, probe: &StatusProbe) -> ProbeOutcome {
        let state = self.state;
        match state {
            LifecycleState::Created | LifecycleState::Configured => ProbeOutcome::NotRunning,
            LifecycleState::Started if !self.process.is_running() => {
                let status = self
                    .process
                    .exit_status()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown status".to_string());
                let mut output = self.process.stderr_tail();
                if output.trim().is_empty() {
                    output = self.process.stdout_tail();
                }
                let last = output.lines().last().unwrap_or("").trim().to_string();
                warn!("{} exited before probing ({})", self.name, status);
                if last.is_empty() {
                    ProbeOutcome::RouterExited(status)
                } else {
                    ProbeOutcome::RouterExited(format!("{}: {}", status, last))
                }
            }
            LifecycleState::Started | LifecycleState::Stopped => probe.query_default(&self.config_path),
        }
    }
}

impl fmt::Debug for RouterInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterInstance")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("config_path", &self.config_path)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::generator::read_descriptor;
    use tempfile::TempDir;

    fn sh_router(script: &str) -> RouterCommand {
        RouterCommand {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "router".to_string()],
            verbose: true,
            interval: None,
            detailed_status: false,
        }
    }

    fn instance(dir: &Path) -> RouterInstance {
        RouterInstance::new(
            "router-A",
            "192.168.1.10",
            5200,
            dir,
            true,
            &RouterDefaults::default(),
            Duration::from_secs(2),
        )
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let dir = TempDir::new().unwrap();
        let cleanup = CleanupManager::new();
        let mut router = instance(dir.path());

        assert!(router.stop().is_none());
        assert_eq!(router.state(), LifecycleState::Created);

        router.configure(&cleanup).unwrap();
        assert!(router.stop().is_none());
        assert_eq!(router.state(), LifecycleState::Configured);
    }

    #[test]
    fn test_status_before_start_is_not_running() {
        let dir = TempDir::new().unwrap();
        let probe = StatusProbe::new(sh_router("echo ok"), "/", Duration::from_secs(2));
        let mut router = instance(dir.path());
        assert_eq!(router.status(&probe), ProbeOutcome::NotRunning);
    }

    #[test]
    fn test_full_lifecycle() {
        let dir = TempDir::new().unwrap();
        let cleanup = CleanupManager::new();
        let command = sh_router("case \"$1\" in start) exec sleep 30;; status) echo \"up $3\";; esac");
        let probe = StatusProbe::new(command.clone(), "/", Duration::from_secs(5));
        let mut router = instance(dir.path());

        router.start(&command, Path::new("/"), &cleanup).unwrap();
        assert_eq!(router.state(), LifecycleState::Started);
        assert!(router.pid().is_some());
        assert_eq!(read_descriptor(router.config_path()).unwrap(), *router.descriptor());
        assert_eq!(
            cleanup.registered(),
            vec![router.config_path().to_path_buf(), router.log_path().to_path_buf()]
        );

        let status = router.status(&probe);
        assert!(status.is_ok(), "{}", status);
        assert!(status.to_string().contains("router-A.json"));

        assert!(router.stop().is_some());
        assert_eq!(router.state(), LifecycleState::Stopped);
        assert!(router.stop().is_none());

        // Restart is not supported
        assert!(matches!(
            router.start(&command, Path::new("/"), &cleanup),
            Err(InstanceError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_spawn_failure_leaves_instance_configured() {
        let dir = TempDir::new().unwrap();
        let cleanup = CleanupManager::new();
        let mut command = RouterCommand::default();
        command.program = "/nonexistent/rust-route".to_string();
        let mut router = instance(dir.path());

        let err = router.start(&command, Path::new("/"), &cleanup).unwrap_err();
        assert!(matches!(err, InstanceError::ProcessSpawn { .. }));
        assert_eq!(router.state(), LifecycleState::Configured);
    }

    #[test]
    fn test_config_write_failure_leaves_instance_created() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let cleanup = CleanupManager::new();
        let mut router = instance(&blocker.join("sub"));

        let err = router.start(&sh_router("true"), Path::new("/"), &cleanup).unwrap_err();
        assert!(matches!(err, InstanceError::ConfigWrite { .. }));
        assert_eq!(router.state(), LifecycleState::Created);
    }

    #[test]
    fn test_router_that_died_is_reported() {
        let dir = TempDir::new().unwrap();
        let cleanup = CleanupManager::new();
        let command = sh_router("echo 'bind failed' >&2; exit 4");
        let probe = StatusProbe::new(command.clone(), "/", Duration::from_secs(2));
        let mut router = instance(dir.path());
        router.start(&command, Path::new("/"), &cleanup).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut outcome = router.status(&probe);
        while !outcome.to_string().contains("bind failed") && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
            outcome = router.status(&probe);
        }
        assert_eq!(outcome.kind(), "router_exited");
        assert!(outcome.to_string().contains("bind failed"));
    }

    #[test]
    fn test_exited_router_without_stderr_reports_stdout() {
        let dir = TempDir::new().unwrap();
        let cleanup = CleanupManager::new();
        let command = sh_router("echo 'loaded 0 interfaces'; exit 0");
        let probe = StatusProbe::new(command.clone(), "/", Duration::from_secs(2));
        let mut router = instance(dir.path());
        router.start(&command, Path::new("/"), &cleanup).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut outcome = router.status(&probe);
        while !outcome.to_string().contains("loaded 0 interfaces") && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
            outcome = router.status(&probe);
        }
        assert_eq!(outcome.kind(), "router_exited");
        assert!(outcome.to_string().contains("loaded 0 interfaces"));
    }

    #[test]
    fn test_configure_after_cleanup_is_cancelled() {
        let dir = TempDir::new().unwrap();
        let cleanup = CleanupManager::new();
        cleanup.run();
        let mut router = instance(dir.path());

        assert!(matches!(router.configure(&cleanup), Err(InstanceError::Cancelled { .. })));
        assert!(!router.config_path().exists());
    }
}
