//! Blocking waits and the clock used by the start and stop sequences.

use std::thread;
use std::time::{Duration, Instant};

/// Blocks the supervisor for a fixed duration and reads the time deadlines
/// are measured against.
#[cfg_attr(test, mockall::automock)]
pub trait Pause {
    fn pause(&self, duration: Duration);

    fn now(&self) -> Instant;
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
