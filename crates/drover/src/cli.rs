//! Command-line interface definitions shared by the runtime parser and the
//! build script that renders the manual page.

use clap::{Parser, Subcommand, ValueEnum};

/// Supervises a fixed pool of HTTP worker processes.
///
/// Configuration flags (for example `--port`, `--workers-count`,
/// `--pidfile-template`) precede the command and may also come from the file
/// named by `--config-path` or from `DROVER_*` environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "drover",
    version,
    disable_help_subcommand = true,
    after_help = "Exit status follows LSB init script conventions: 0 success, 1 failure, \
                  3 when `status` finds every worker stopped."
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: PoolCommand,
}

/// Pool lifecycle commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolCommand {
    /// Launches every free worker slot and waits until the pool settles.
    Start,
    /// Stops configured and stale workers, escalating to SIGKILL.
    Stop,
    /// Stops then starts the pool.
    Restart,
    /// Reports how many workers answer their health endpoint.
    Status {
        /// Turns an unexpected pool state into a failure exit code.
        #[arg(long, value_enum)]
        expect: Option<Expectation>,
    },
}

/// Pool state a caller expects `status` to find.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Expectation {
    /// Every worker answers its health probe.
    Started,
    /// No worker answers its health probe.
    Stopped,
}
