//! Pidfile reading and reconciliation.
//!
//! A pidfile is written by the worker after it binds its port and holds a
//! decimal pid. The supervisor never trusts its existence alone and only
//! deletes it once the recorded process is confirmed gone.

use std::fs;
use std::io;

use camino::Utf8Path;
use tracing::{debug, warn};

use super::TERMINATE_TARGET;

/// Reads the pid recorded at `path`.
///
/// Missing, unreadable, or malformed pidfiles yield `None`; pid `0` is
/// rejected because signalling it would target the whole process group.
pub(crate) fn read_pid(path: &Utf8Path) -> Option<u32> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(target: TERMINATE_TARGET, file = %path, "pidfile absent");
            return None;
        }
        Err(error) => {
            warn!(
                target: TERMINATE_TARGET,
                file = %path,
                error = %error,
                "failed to read pidfile"
            );
            return None;
        }
    };

    match content.trim().parse::<u32>() {
        Ok(0) | Err(_) => {
            warn!(
                target: TERMINATE_TARGET,
                file = %path,
                content = content.trim(),
                "pidfile does not hold a valid pid"
            );
            None
        }
        Ok(pid) => Some(pid),
    }
}

/// Removes the pidfile at `path`. An absent file is fine; any other failure
/// is logged and left in place.
pub(crate) fn remove_pidfile(path: &Utf8Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(target: TERMINATE_TARGET, file = %path, "removed pidfile"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => warn!(
            target: TERMINATE_TARGET,
            file = %path,
            error = %error,
            "failed to remove pidfile"
        ),
    }
}
