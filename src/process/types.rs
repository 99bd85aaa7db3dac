//! Router subcommand definitions.
//!
//! This file contains the subcommands of the external router CLI that the
//! harness knows how to invoke.

/// Subcommands of the external router executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterSubcommand {
    /// Long-running router bound to a config file
    Start,
    /// One-shot routing state query
    Status,
    /// One-shot interface configuration
    Configure,
    /// One-shot connectivity probe
    Test,
}

impl RouterSubcommand {
    /// Get the string representation used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            RouterSubcommand::Start => "start",
            RouterSubcommand::Status => "status",
            RouterSubcommand::Configure => "configure",
            RouterSubcommand::Test => "test",
        }
    }
}

impl std::fmt::Display for RouterSubcommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
