//! Process control module.
//!
//! This module handles the external router executable: building its command
//! lines, supervising long-running instances, capturing their output and
//! running bounded one-shot subcommands.

pub mod capture;
pub mod command;
pub mod subprocess;
pub mod types;

// Re-export commonly used items for convenience
pub use command::{CommandLine, RouterCommand};
pub use subprocess::{run_bounded, BoundedRun, ControlledSubprocess, StopOutcome};
pub use types::RouterSubcommand;
