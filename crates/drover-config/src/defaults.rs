//! Built-in defaults applied beneath file, environment, and CLI layers.

use crate::logging::LogFormat;
use crate::status::StatusConvention;

/// First port of the pool when none is configured.
pub const DEFAULT_BASE_PORT: u16 = 8000;

/// Number of workers started when none is configured.
pub const DEFAULT_WORKERS_COUNT: u16 = 4;

/// Grace window between SIGTERM and SIGKILL, in milliseconds.
pub const DEFAULT_SIGTERM_TIMEOUT_MS: u64 = 4_000;

/// Per-worker settle delay after forceful termination, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;

/// Delay between spawning the pool and the first readiness poll.
pub const DEFAULT_START_GRACE_MS: u64 = 1_000;

/// Interval between readiness polls during `start`.
pub const DEFAULT_START_POLL_INTERVAL_MS: u64 = 1_000;

/// Upper bound on the readiness polling window during `start`.
pub const DEFAULT_START_TIMEOUT_MS: u64 = 30_000;

/// Timeout applied to each HTTP probe.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Host used when probing worker endpoints.
pub const DEFAULT_PROBE_HOST: &str = "127.0.0.1";

/// Health endpoint exposed by every worker.
pub const DEFAULT_HEALTH_PATH: &str = "/status/";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default convention for `status` on a stopped pool.
#[must_use]
pub fn default_status_convention() -> StatusConvention {
    StatusConvention::Lsb
}

/// Owned probe host.
#[must_use]
pub fn default_probe_host() -> String {
    DEFAULT_PROBE_HOST.to_owned()
}

/// Owned health endpoint path.
#[must_use]
pub fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_owned()
}
