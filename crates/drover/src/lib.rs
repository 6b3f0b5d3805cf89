//! Worker-pool supervisor with init.d semantics.
//!
//! `drover` starts, stops, restarts, and reports on a fixed pool of HTTP
//! worker processes listening on a contiguous port range. Liveness combines
//! the worker's pidfile with the OS process table and an HTTP health probe;
//! exit codes follow LSB init script conventions.
//!
//! The runtime is usable from the binary and from tests, where configuration
//! loading, the lifecycle handler, and the output streams can be substituted.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use drover_config::PoolSettings;

mod cli;
mod config;
mod errors;
mod lifecycle;
mod telemetry;

use cli::Cli;
#[cfg(test)]
pub(crate) use cli::Expectation;
use config::split_config_arguments;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use lifecycle::{CommandExit, LifecycleCommand, LifecycleError, LifecycleOutput, SystemLifecycle};

/// Long flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `drover_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--port",
    "--workers-count",
    "--pidfile-template",
    "--logfile-template",
    "--worker-script",
    "--worker-config",
    "--sigterm-timeout-ms",
    "--settle-delay-ms",
    "--start-grace-ms",
    "--start-poll-interval-ms",
    "--start-timeout-ms",
    "--probe-timeout-ms",
    "--probe-host",
    "--health-path",
    "--stop-path",
    "--status-convention",
    "--log-filter",
    "--log-format",
];

/// Short aliases of [`CONFIG_CLI_FLAGS`]; each takes a separate value.
const CONFIG_SHORT_FLAGS: &[&str] = &[
    "-p", "-w", "-i", "-L", "-s", "-k", "-t", "-d", "-g", "-n", "-T", "-o", "-H", "-e", "-x", "-u",
    "-F", "-m",
];

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    stdout: &'a mut W,
    stderr: &'a mut E,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(stdout: &'a mut W, stderr: &'a mut E, loader: &'a L) -> Self {
        Self {
            stdout,
            stderr,
            loader,
        }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut lifecycle = SystemLifecycle;
        self.run_with_handler(args, |command, settings, output| {
            lifecycle.handle(command, settings, output)
        })
    }

    fn run_with_handler<I, F>(&mut self, args: I, mut handler: F) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
        F: FnMut(
            LifecycleCommand,
            &PoolSettings,
            &mut LifecycleOutput<&mut W>,
        ) -> Result<CommandExit, LifecycleError>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli = match Cli::try_parse_from(&split.command_arguments) {
            Ok(cli) => cli,
            Err(error) => return self.report_usage(&error),
        };
        let command = LifecycleCommand::from(cli.command);

        let result = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| {
                telemetry::initialise(&config)?;
                Ok(PoolSettings::from_config(&config)?)
            })
            .and_then(|settings| {
                if command.launches_workers() {
                    settings.launch()?;
                }
                let mut output = LifecycleOutput::new(&mut *self.stdout);
                handler(command, &settings, &mut output)
                    .map_err(|source| AppError::Lifecycle { command, source })
            });

        match result {
            Ok(exit) => exit.into(),
            Err(error) => {
                let _ = writeln!(self.stderr, "{error}");
                ExitCode::FAILURE
            }
        }
    }

    /// Writes clap's rendering of `error`: help and version go to stdout
    /// with success, usage errors to stderr with status 2.
    fn report_usage(&mut self, error: &clap::Error) -> ExitCode {
        let rendered = error.render().to_string();
        let written = if error.use_stderr() {
            write!(self.stderr, "{rendered}")
        } else {
            write!(self.stdout, "{rendered}")
        };
        if written.is_err() {
            return ExitCode::FAILURE;
        }
        u8::try_from(error.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from)
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    CliRunner::new(stdout, stderr, &OrthoConfigLoader).run(args)
}

/// Runs the CLI with a custom configuration loader and lifecycle handler.
#[cfg(test)]
pub(crate) fn run_with_handler<I, W, E, L, F>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
    handler: F,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
    F: FnMut(
        LifecycleCommand,
        &PoolSettings,
        &mut LifecycleOutput<&mut W>,
    ) -> Result<CommandExit, LifecycleError>,
{
    CliRunner::new(stdout, stderr, loader).run_with_handler(args, handler)
}
