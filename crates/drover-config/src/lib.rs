//! Shared configuration for the `drover` worker-pool supervisor.
//!
//! Settings are layered with `ortho_config`: built-in defaults, then the file
//! named by `--config-path` (or `DROVER_CONFIG_PATH`), then `DROVER_*`
//! environment variables, then command-line flags. The raw [`Config`] is
//! validated into immutable [`PoolSettings`] before any worker is touched, so
//! template and pool-size mistakes abort the run up front.

mod defaults;
mod logging;
mod settings;
mod status;
mod template;

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_BASE_PORT, DEFAULT_HEALTH_PATH, DEFAULT_LOG_FILTER, DEFAULT_PROBE_HOST,
    DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_SETTLE_DELAY_MS, DEFAULT_SIGTERM_TIMEOUT_MS,
    DEFAULT_START_GRACE_MS, DEFAULT_START_POLL_INTERVAL_MS, DEFAULT_START_TIMEOUT_MS,
    DEFAULT_WORKERS_COUNT, default_health_path, default_log_filter, default_log_filter_string,
    default_log_format, default_probe_host, default_status_convention,
};
pub use logging::LogFormat;
pub use settings::{LaunchSettings, PoolSettings, PoolSettingsError, ProbeSettings, Timings};
pub use status::{LSB_NOT_RUNNING, StatusConvention};
pub use template::{PORT_PLACEHOLDER, PathTemplate, TemplateError, TemplateParts, resolve};

/// Raw supervisor configuration as merged from every source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "DROVER")]
pub struct Config {
    /// First port of the pool; worker `i` listens on `port + i`.
    #[ortho_config(default = DEFAULT_BASE_PORT, cli_short = 'p')]
    pub port: u16,
    /// Number of workers in the pool.
    #[ortho_config(default = DEFAULT_WORKERS_COUNT, cli_short = 'w')]
    pub workers_count: u16,
    /// Pidfile path template containing `%(port)s`.
    #[ortho_config(cli_short = 'i')]
    pub pidfile_template: Option<String>,
    /// Optional logfile path template containing `%(port)s`.
    #[ortho_config(cli_short = 'L')]
    pub logfile_template: Option<String>,
    /// Executable launched once per worker slot.
    #[ortho_config(cli_short = 's')]
    pub worker_script: Option<Utf8PathBuf>,
    /// Configuration file handed to every worker through `--config`.
    #[ortho_config(cli_short = 'k')]
    pub worker_config: Option<Utf8PathBuf>,
    /// Grace window between SIGTERM and SIGKILL, in milliseconds.
    #[ortho_config(default = DEFAULT_SIGTERM_TIMEOUT_MS, cli_short = 't')]
    pub sigterm_timeout_ms: u64,
    /// Per-worker settle delay after SIGKILL, in milliseconds.
    #[ortho_config(default = DEFAULT_SETTLE_DELAY_MS, cli_short = 'd')]
    pub settle_delay_ms: u64,
    /// Delay before the first readiness poll after spawning, in milliseconds.
    #[ortho_config(default = DEFAULT_START_GRACE_MS, cli_short = 'g')]
    pub start_grace_ms: u64,
    /// Interval between readiness polls, in milliseconds.
    #[ortho_config(default = DEFAULT_START_POLL_INTERVAL_MS, cli_short = 'n')]
    pub start_poll_interval_ms: u64,
    /// Upper bound on readiness polling, in milliseconds.
    #[ortho_config(default = DEFAULT_START_TIMEOUT_MS, cli_short = 'T')]
    pub start_timeout_ms: u64,
    /// Timeout applied to each HTTP probe, in milliseconds.
    #[ortho_config(default = DEFAULT_PROBE_TIMEOUT_MS, cli_short = 'o')]
    pub probe_timeout_ms: u64,
    /// Host used to reach worker endpoints.
    #[ortho_config(default = default_probe_host(), cli_short = 'H')]
    pub probe_host: String,
    /// Health endpoint path answered by ready workers.
    #[ortho_config(default = default_health_path(), cli_short = 'e')]
    pub health_path: String,
    /// Optional endpoint asking a worker to shut itself down.
    #[ortho_config(cli_short = 'x')]
    pub stop_path: Option<String>,
    /// Exit-code convention for `status` on a stopped pool.
    #[ortho_config(default = default_status_convention(), cli_short = 'u')]
    pub status_convention: StatusConvention,
    /// Tracing filter expression.
    #[ortho_config(default = default_log_filter_string(), cli_short = 'F')]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format(), cli_short = 'm')]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_BASE_PORT,
            workers_count: DEFAULT_WORKERS_COUNT,
            pidfile_template: None,
            logfile_template: None,
            worker_script: None,
            worker_config: None,
            sigterm_timeout_ms: DEFAULT_SIGTERM_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            start_grace_ms: DEFAULT_START_GRACE_MS,
            start_poll_interval_ms: DEFAULT_START_POLL_INTERVAL_MS,
            start_timeout_ms: DEFAULT_START_TIMEOUT_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            probe_host: default_probe_host(),
            health_path: default_health_path(),
            stop_path: None,
            status_convention: default_status_convention(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, files, environment, and `args`.
    ///
    /// `args` must start with the program name, as `std::env::args_os` does.
    pub fn load_from_args<I>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        Self::load_from_iter(args)
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
