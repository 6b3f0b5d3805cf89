//! Discovery of workers left behind by a previous pool configuration.
//!
//! Stale workers are found through their pidfiles: names in the template's
//! directory shaped `prefix + digits + suffix` whose port is not configured.

use std::fs;

use camino::Utf8PathBuf;
use drover_config::PathTemplate;
use tracing::{debug, warn};

use super::LIFECYCLE_TARGET;

/// Ports of pidfiles matching `template` that are not in `configured`.
///
/// Every failure (no placeholder, placeholder inside a directory component,
/// unreadable directory) degrades to an empty result. The output is sorted and
/// free of duplicates.
#[must_use]
pub fn find_stale_ports(template: &PathTemplate, configured: &[u16]) -> Vec<u16> {
    let Some(parts) = template.split_placeholder() else {
        debug!(
            target: LIFECYCLE_TARGET,
            template = template.as_str(),
            "pidfile template has no port placeholder; skipping stale discovery"
        );
        return Vec::new();
    };
    if parts.suffix.contains('/') {
        debug!(
            target: LIFECYCLE_TARGET,
            template = template.as_str(),
            "port placeholder sits in a directory component; skipping stale discovery"
        );
        return Vec::new();
    }

    let (directory, name_prefix) = match parts.prefix.rsplit_once('/') {
        Some(("", name)) => (Utf8PathBuf::from("/"), name),
        Some((dir, name)) => (Utf8PathBuf::from(dir), name),
        None => (Utf8PathBuf::from("."), parts.prefix),
    };

    let entries = match fs::read_dir(&directory) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(
                target: LIFECYCLE_TARGET,
                directory = %directory,
                error = %error,
                "cannot list pidfile directory; assuming no stale workers"
            );
            return Vec::new();
        }
    };

    let mut stale: Vec<u16> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| {
            let port = port_from_name(&name, name_prefix, parts.suffix)?;
            // Zero-padded digits or a repeated placeholder only look like a match.
            let canonical = template.resolve(port);
            (canonical.file_name() == Some(name.as_str())).then_some(port)
        })
        .filter(|port| !configured.contains(port))
        .collect();
    stale.sort_unstable();
    stale.dedup();
    stale
}

fn port_from_name(name: &str, prefix: &str, suffix: &str) -> Option<u16> {
    let digits = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
