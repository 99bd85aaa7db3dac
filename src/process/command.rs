//! External router command lines.
//!
//! Builds the argument vectors for each router subcommand. The router is
//! reached through a program plus an optional argument prefix (for example
//! `cargo run --`), and always runs with its working directory set to the
//! router project's root so its own relative lookups resolve.

use super::types::RouterSubcommand;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// How to reach the external router executable.
///
/// Deserialized from the `router:` section of the harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterCommand {
    /// Executable to run
    pub program: String,
    /// Arguments placed before the subcommand
    pub args: Vec<String>,
    /// Pass `-v` to `start`
    pub verbose: bool,
    /// Optional `--interval <seconds>` for `start`
    pub interval: Option<u64>,
    /// Pass `--detailed` to `status`
    pub detailed_status: bool,
}

impl Default for RouterCommand {
    fn default() -> Self {
        Self {
            program: "cargo".to_string(),
            args: vec!["run".to_string(), "--".to_string()],
            verbose: true,
            interval: None,
            detailed_status: false,
        }
    }
}

/// A fully resolved invocation: program, arguments and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub subcommand: RouterSubcommand,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl RouterCommand {
    fn invocation(&self, subcommand: RouterSubcommand, working_dir: &Path, tail: Vec<String>) -> CommandLine {
        let mut args = self.args.clone();
        args.push(subcommand.as_str().to_string());
        args.extend(tail);
        CommandLine {
            subcommand,
            program: self.program.clone(),
            args,
            working_dir: working_dir.to_path_buf(),
        }
    }

    /// `start -c <path> [-v] [--interval <secs>]`
    pub fn start(&self, config_path: &Path, working_dir: &Path) -> CommandLine {
        let mut tail = vec!["-c".to_string(), config_path.to_string_lossy().to_string()];
        if self.verbose {
            tail.push("-v".to_string());
        }
        if let Some(interval) = self.interval {
            tail.push("--interval".to_string());
            tail.push(interval.to_string());
        }
        self.invocation(RouterSubcommand::Start, working_dir, tail)
    }

    /// `status -c <path> [--detailed]`
    pub fn status(&self, config_path: &Path, working_dir: &Path) -> CommandLine {
        let mut tail = vec!["-c".to_string(), config_path.to_string_lossy().to_string()];
        if self.detailed_status {
            tail.push("--detailed".to_string());
        }
        self.invocation(RouterSubcommand::Status, working_dir, tail)
    }

    /// `configure -i <interface> -a <ip> -m <mask>`
    pub fn configure(&self, interface: &str, ip_address: &str, subnet_mask: &str, working_dir: &Path) -> CommandLine {
        let tail = vec![
            "-i".to_string(),
            interface.to_string(),
            "-a".to_string(),
            ip_address.to_string(),
            "-m".to_string(),
            subnet_mask.to_string(),
        ];
        self.invocation(RouterSubcommand::Configure, working_dir, tail)
    }

    /// `test <target>`
    pub fn test(&self, target: &str, working_dir: &Path) -> CommandLine {
        self.invocation(RouterSubcommand::Test, working_dir, vec![target.to_string()])
    }
}

impl CommandLine {
    /// Build a [`Command`] with piped output and no stdin.
    ///
    /// On unix the child leads a new process group, so signals sent to the
    /// group also reach whatever a wrapper like `cargo run` launched.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        write!(f, " (cwd {})", self.working_dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_arguments() {
        let cmd = RouterCommand::default();
        let line = cmd.start(Path::new("/tmp/router-A.json"), Path::new("/root/rust-route"));
        assert_eq!(line.program, "cargo");
        assert_eq!(line.args, vec!["run", "--", "start", "-c", "/tmp/router-A.json", "-v"]);
        assert_eq!(line.working_dir, PathBuf::from("/root/rust-route"));
    }

    #[test]
    fn test_start_with_interval_and_quiet() {
        let cmd = RouterCommand {
            program: "rust-route".to_string(),
            args: Vec::new(),
            verbose: false,
            interval: Some(5),
            detailed_status: false,
        };
        let line = cmd.start(Path::new("a.json"), Path::new("."));
        assert_eq!(line.args, vec!["start", "-c", "a.json", "--interval", "5"]);
    }

    #[test]
    fn test_status_arguments() {
        let mut cmd = RouterCommand::default();
        let line = cmd.status(Path::new("/tmp/r.json"), Path::new("."));
        assert_eq!(line.args, vec!["run", "--", "status", "-c", "/tmp/r.json"]);

        cmd.detailed_status = true;
        let line = cmd.status(Path::new("/tmp/r.json"), Path::new("."));
        assert_eq!(line.args.last().map(String::as_str), Some("--detailed"));
    }

    #[test]
    fn test_one_shot_arguments() {
        let cmd = RouterCommand::default();
        let configure = cmd.configure("test0", "192.168.100.1", "255.255.255.0", Path::new("."));
        assert_eq!(
            configure.args,
            vec!["run", "--", "configure", "-i", "test0", "-a", "192.168.100.1", "-m", "255.255.255.0"]
        );
        assert_eq!(configure.subcommand, RouterSubcommand::Configure);

        let test = cmd.test("127.0.0.1", Path::new("."));
        assert_eq!(test.args, vec!["run", "--", "test", "127.0.0.1"]);
    }
}
