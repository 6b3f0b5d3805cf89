//! Test support for lifecycle and CLI coverage.
//!
//! [`FakePool`] emulates a pool of workers behind the supervisor's seams:
//! pidfiles are real files in a temporary directory while processes, health
//! endpoints, launches, and pauses are scripted in memory.

mod pool;

use std::ffi::OsString;

use drover_config::Config;

use crate::{AppError, ConfigLoader};

pub(crate) use pool::{FakePool, WorkerBehaviour};

/// A config loader that returns a fixed configuration.
pub(crate) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(crate) const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}
