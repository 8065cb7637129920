use std::time::{Duration, Instant};

use crate::traits::MonotonicClock;

/// Monotonic clock backed by `Instant`, measured from a resettable origin.
pub struct InstantClock {
    origin: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        InstantClock {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for InstantClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn reset(&mut self) {
        self.origin = Instant::now();
    }
}

/// Render a duration as `HH:MM:SS` (hours do not wrap).
pub fn format_uptime(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}
