//! Exit-code conventions for `status` when every worker is stopped.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Exit code reported by LSB init scripts when the service is not running.
pub const LSB_NOT_RUNNING: u8 = 3;

/// Selects what `status` reports when the whole pool is stopped and the
/// caller expressed no expectation.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatusConvention {
    /// Report `3` ("program is not running") as LSB init scripts do.
    #[default]
    Lsb,
    /// Treat a stopped pool as a successful inspection and report `0`.
    Success,
}

impl StatusConvention {
    /// Exit code reported for a fully stopped pool.
    #[must_use]
    pub const fn stopped_exit_code(self) -> u8 {
        match self {
            Self::Lsb => LSB_NOT_RUNNING,
            Self::Success => 0,
        }
    }
}
