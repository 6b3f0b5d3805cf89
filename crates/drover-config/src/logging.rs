//! Log output selection for the supervisor's `tracing` subscriber.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How diagnostics are rendered on stderr.
///
/// Configuration layers accept the snake_case names; `FromStr` also accepts
/// any letter case.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One line per event; the default for init scripts and terminals.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}
