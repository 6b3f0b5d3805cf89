//! Validated, immutable pool settings derived from [`Config`].

use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::status::StatusConvention;
use crate::template::{PathTemplate, TemplateError};
use crate::Config;

/// Timing budget for one command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Grace window between SIGTERM and SIGKILL, applied once per batch.
    pub sigterm_timeout: Duration,
    /// Settle delay per configured worker after SIGKILL.
    pub settle_delay: Duration,
    /// Delay between spawning and the first readiness poll.
    pub start_grace: Duration,
    /// Interval between readiness polls.
    pub start_poll_interval: Duration,
    /// Upper bound on readiness polling.
    pub start_timeout: Duration,
}

/// HTTP probe configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Host used to reach worker endpoints.
    pub host: String,
    /// Health endpoint path.
    pub health_path: String,
    /// Optional cooperative stop endpoint path.
    pub stop_path: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Launch inputs needed by `start`; absent for stop/status-only deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Worker executable.
    pub script: Utf8PathBuf,
    /// Worker configuration file.
    pub config: Utf8PathBuf,
}

/// Immutable description of the supervised pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    base_port: u16,
    workers_count: u16,
    pidfile_template: PathTemplate,
    logfile_template: Option<PathTemplate>,
    worker_script: Option<Utf8PathBuf>,
    worker_config: Option<Utf8PathBuf>,
    timings: Timings,
    probe: ProbeSettings,
    status_convention: StatusConvention,
}

impl PoolSettings {
    /// Validates raw configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolSettingsError`] when the pool is empty, overflows the
    /// port range, lacks a pidfile template, shares paths between workers, or
    /// configures a zero polling interval or malformed endpoint path.
    pub fn from_config(config: &Config) -> Result<Self, PoolSettingsError> {
        if config.workers_count == 0 {
            return Err(PoolSettingsError::EmptyPool);
        }
        let last_offset = config.workers_count - 1;
        if config.port.checked_add(last_offset).is_none() {
            return Err(PoolSettingsError::PortRangeOverflow {
                base_port: config.port,
                workers: config.workers_count,
            });
        }

        let raw_pidfile = config
            .pidfile_template
            .as_deref()
            .ok_or(PoolSettingsError::MissingPidfileTemplate)?;
        let pidfile_template = PathTemplate::parse("pidfile_template", raw_pidfile)?;
        pidfile_template.ensure_distinct_for("pidfile_template", config.workers_count)?;

        let logfile_template = config
            .logfile_template
            .as_deref()
            .map(|raw| PathTemplate::parse("logfile_template", raw))
            .transpose()?;
        if let Some(template) = &logfile_template {
            template.ensure_distinct_for("logfile_template", config.workers_count)?;
        }

        if config.start_poll_interval_ms == 0 {
            return Err(PoolSettingsError::ZeroInterval {
                field: "start_poll_interval_ms",
            });
        }
        if config.probe_timeout_ms == 0 {
            return Err(PoolSettingsError::ZeroInterval {
                field: "probe_timeout_ms",
            });
        }
        ensure_endpoint_path("health_path", &config.health_path)?;
        if let Some(stop_path) = &config.stop_path {
            ensure_endpoint_path("stop_path", stop_path)?;
        }
        if config.probe_host.trim().is_empty() {
            return Err(PoolSettingsError::EmptyProbeHost);
        }

        Ok(Self {
            base_port: config.port,
            workers_count: config.workers_count,
            pidfile_template,
            logfile_template,
            worker_script: config.worker_script.clone(),
            worker_config: config.worker_config.clone(),
            timings: Timings {
                sigterm_timeout: Duration::from_millis(config.sigterm_timeout_ms),
                settle_delay: Duration::from_millis(config.settle_delay_ms),
                start_grace: Duration::from_millis(config.start_grace_ms),
                start_poll_interval: Duration::from_millis(config.start_poll_interval_ms),
                start_timeout: Duration::from_millis(config.start_timeout_ms),
            },
            probe: ProbeSettings {
                host: config.probe_host.clone(),
                health_path: config.health_path.clone(),
                stop_path: config.stop_path.clone(),
                timeout: Duration::from_millis(config.probe_timeout_ms),
            },
            status_convention: config.status_convention,
        })
    }

    /// First port of the pool.
    #[must_use]
    pub const fn base_port(&self) -> u16 {
        self.base_port
    }

    /// Number of configured workers; always at least one.
    #[must_use]
    pub const fn workers_count(&self) -> u16 {
        self.workers_count
    }

    /// Pidfile template.
    #[must_use]
    pub const fn pidfile_template(&self) -> &PathTemplate {
        &self.pidfile_template
    }

    /// Optional logfile template.
    #[must_use]
    pub const fn logfile_template(&self) -> Option<&PathTemplate> {
        self.logfile_template.as_ref()
    }

    /// Launch inputs, or the first missing field name.
    ///
    /// # Errors
    ///
    /// Returns [`PoolSettingsError::MissingLaunchSetting`] naming the absent
    /// field when `worker_script` or `worker_config` is unset.
    pub fn launch(&self) -> Result<LaunchSettings, PoolSettingsError> {
        let script = self
            .worker_script
            .clone()
            .ok_or(PoolSettingsError::MissingLaunchSetting {
                field: "worker_script",
            })?;
        let config = self
            .worker_config
            .clone()
            .ok_or(PoolSettingsError::MissingLaunchSetting {
                field: "worker_config",
            })?;
        Ok(LaunchSettings { script, config })
    }

    /// Timing budget.
    #[must_use]
    pub const fn timings(&self) -> Timings {
        self.timings
    }

    /// Probe configuration.
    #[must_use]
    pub const fn probe(&self) -> &ProbeSettings {
        &self.probe
    }

    /// Exit-code convention for `status` on a stopped pool.
    #[must_use]
    pub const fn status_convention(&self) -> StatusConvention {
        self.status_convention
    }
}

fn ensure_endpoint_path(field: &'static str, path: &str) -> Result<(), PoolSettingsError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(PoolSettingsError::InvalidEndpointPath {
            field,
            path: path.to_owned(),
        })
    }
}

/// Fatal configuration problems detected before any worker is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolSettingsError {
    /// `workers_count` was zero.
    #[error("workers_count must be at least 1")]
    EmptyPool,
    /// The pool would extend past port 65535.
    #[error("{workers} workers starting at port {base_port} exceed the port range")]
    PortRangeOverflow {
        /// Configured base port.
        base_port: u16,
        /// Configured pool size.
        workers: u16,
    },
    /// No pidfile template was configured.
    #[error("pidfile_template must be configured to track worker processes")]
    MissingPidfileTemplate,
    /// A path template was malformed.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// A polling interval or timeout was zero.
    #[error("{field} must be greater than zero")]
    ZeroInterval {
        /// Offending field.
        field: &'static str,
    },
    /// An endpoint path did not start with `/`.
    #[error("{field} '{path}' must start with '/'")]
    InvalidEndpointPath {
        /// Offending field.
        field: &'static str,
        /// Configured path.
        path: String,
    },
    /// The probe host was blank.
    #[error("probe_host must not be empty")]
    EmptyProbeHost,
    /// A setting required to launch workers was missing.
    #[error("{field} must be configured to start workers")]
    MissingLaunchSetting {
        /// Missing field.
        field: &'static str,
    },
}
