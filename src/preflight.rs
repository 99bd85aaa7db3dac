//! Preflight checks of the router CLI.
//!
//! Before the convergence run, the harness exercises the router's one-shot
//! subcommands (`configure` and `test`). Results are reported alongside the
//! run; a failing check never stops it.

use crate::process::{run_bounded, BoundedRun, CommandLine, RouterCommand};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Parameters of the preflight checks, from the `preflight:` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    pub enabled: bool,
    pub interface: String,
    pub ip_address: String,
    pub subnet_mask: String,
    pub test_target: String,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interface: "test0".to_string(),
            ip_address: "192.168.100.1".to_string(),
            subnet_mask: "255.255.255.0".to_string(),
            test_target: "127.0.0.1".to_string(),
        }
    }
}

/// Outcome of one preflight check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightCheck {
    pub name: String,
    pub command: String,
    pub passed: bool,
    pub detail: String,
}

fn check(name: &str, command: &CommandLine, timeout: Duration) -> PreflightCheck {
    let (passed, detail) = match run_bounded(command, timeout) {
        BoundedRun::Completed { status, .. } if status.success() => (true, "ok".to_string()),
        BoundedRun::Completed { status, stderr, .. } => (false, format!("{}: {}", status, stderr.trim_end())),
        BoundedRun::TimedOut => (false, format!("timed out after {:?}", timeout)),
        BoundedRun::SpawnFailed(reason) => (false, format!("could not run: {}", reason)),
    };

    if passed {
        info!("Preflight {} passed", name);
    } else {
        warn!("Preflight {} failed: {}", name, detail);
    }

    PreflightCheck {
        name: name.to_string(),
        command: command.to_string(),
        passed,
        detail,
    }
}

/// Run the interface configuration and connectivity checks
pub fn run_preflight(
    command: &RouterCommand,
    working_dir: &Path,
    config: &PreflightConfig,
    timeout: Duration,
) -> Vec<PreflightCheck> {
    if !config.enabled {
        return Vec::new();
    }

    let configure = command.configure(&config.interface, &config.ip_address, &config.subnet_mask, working_dir);
    let test = command.test(&config.test_target, working_dir);

    vec![
        check("interface configuration", &configure, timeout),
        check("connectivity test", &test, timeout),
    ]
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh_router(script: &str) -> RouterCommand {
        RouterCommand {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "router".to_string()],
            ..RouterCommand::default()
        }
    }

    #[test]
    fn test_checks_pass_and_fail_independently() {
        let router = sh_router("case \"$1\" in configure) exit 0;; test) echo unreachable >&2; exit 1;; esac");
        let checks = run_preflight(&router, Path::new("/"), &PreflightConfig::default(), Duration::from_secs(5));

        assert_eq!(checks.len(), 2);
        assert!(checks[0].passed);
        assert!(checks[0].command.contains("configure -i test0 -a 192.168.100.1 -m 255.255.255.0"));
        assert!(!checks[1].passed);
        assert!(checks[1].detail.contains("unreachable"));
    }

    #[test]
    fn test_disabled_preflight_runs_nothing() {
        let config = PreflightConfig {
            enabled: false,
            ..PreflightConfig::default()
        };
        assert!(run_preflight(&sh_router("exit 1"), Path::new("/"), &config, Duration::from_secs(1)).is_empty());
    }
}
