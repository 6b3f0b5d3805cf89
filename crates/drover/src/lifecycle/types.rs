//! Command models, exit verdicts, and the output wrapper shared by lifecycle
//! commands.

use std::fmt;
use std::io::Write;
use std::process::ExitCode;

use super::LifecycleError;
use crate::cli::{Expectation, PoolCommand};

/// Supported lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    Start,
    Stop,
    Restart,
    Status { expect: Option<Expectation> },
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => formatter.write_str("start"),
            Self::Stop => formatter.write_str("stop"),
            Self::Restart => formatter.write_str("restart"),
            Self::Status { .. } => formatter.write_str("status"),
        }
    }
}

impl LifecycleCommand {
    /// Whether the command spawns workers and therefore needs launch settings.
    #[must_use]
    pub const fn launches_workers(self) -> bool {
        matches!(self, Self::Start | Self::Restart)
    }
}

impl From<PoolCommand> for LifecycleCommand {
    fn from(command: PoolCommand) -> Self {
        match command {
            PoolCommand::Start => Self::Start,
            PoolCommand::Stop => Self::Stop,
            PoolCommand::Restart => Self::Restart,
            PoolCommand::Status { expect } => Self::Status { expect },
        }
    }
}

/// Process exit status produced by a lifecycle command.
///
/// Kept as a plain byte so `restart` can combine verdicts and tests can compare
/// them; converted into [`ExitCode`] at the binary boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandExit(u8);

impl CommandExit {
    pub const SUCCESS: Self = Self(0);
    pub const FAILURE: Self = Self(1);

    #[must_use]
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Success only when both verdicts succeed.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        if self.is_success() && other.is_success() {
            Self::SUCCESS
        } else {
            Self::FAILURE
        }
    }

    pub(crate) const fn from_bool(success: bool) -> Self {
        if success { Self::SUCCESS } else { Self::FAILURE }
    }
}

impl From<CommandExit> for ExitCode {
    fn from(exit: CommandExit) -> Self {
        Self::from(exit.0)
    }
}

/// Destination for command summaries; diagnostics go through `tracing`.
pub struct LifecycleOutput<W: Write> {
    pub stdout: W,
}

impl<W: Write> LifecycleOutput<W> {
    pub const fn new(stdout: W) -> Self {
        Self { stdout }
    }

    pub fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        self.stdout.write_fmt(args).map_err(LifecycleError::Io)?;
        self.stdout.write_all(b"\n").map_err(LifecycleError::Io)?;
        self.stdout.flush().map_err(LifecycleError::Io)
    }
}
