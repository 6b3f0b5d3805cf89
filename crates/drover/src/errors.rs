//! Error types for the CLI runtime.

use std::sync::Arc;

use drover_config::PoolSettingsError;
use thiserror::Error;

use crate::lifecycle::LifecycleError;
use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("invalid configuration: {0}")]
    Settings(#[from] PoolSettingsError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("{command} failed: {source}")]
    Lifecycle {
        command: crate::lifecycle::LifecycleCommand,
        #[source]
        source: LifecycleError,
    },
}
