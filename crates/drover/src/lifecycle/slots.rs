//! Worker addressing: ports and per-worker file paths.

use camino::Utf8PathBuf;
use drover_config::PoolSettings;

/// One position in the pool, recomputed on every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkerSlot {
    pub index: u16,
    pub port: u16,
}

/// Enumerates the configured slots, `base_port + index` for each worker.
#[must_use]
pub fn worker_slots(settings: &PoolSettings) -> Vec<WorkerSlot> {
    (0..settings.workers_count())
        .filter_map(|index| {
            settings
                .base_port()
                .checked_add(index)
                .map(|port| WorkerSlot { index, port })
        })
        .collect()
}

/// Pidfile location for the worker bound to `port`.
#[must_use]
pub fn pidfile_path(settings: &PoolSettings, port: u16) -> Utf8PathBuf {
    settings.pidfile_template().resolve(port)
}

/// Logfile location for the worker bound to `port`, when logfiles are enabled.
#[must_use]
pub fn logfile_path(settings: &PoolSettings, port: u16) -> Option<Utf8PathBuf> {
    settings
        .logfile_template()
        .map(|template| template.resolve(port))
}

pub(crate) fn configured_ports(settings: &PoolSettings) -> Vec<u16> {
    worker_slots(settings).iter().map(|slot| slot.port).collect()
}
