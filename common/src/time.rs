// Millis/seconds helpers used for timers, retry scheduling and logging.
//
// Non-deterministic (SystemTime-backed) by design: the synchronizer's
// delivery timeouts and sync-broadcast ticks are wall-clock concerns,
// never consensus-critical inputs.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type TimestampMillis = u64;
pub type TimestampSeconds = u64;

#[inline]
pub fn get_current_time() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
}

pub fn get_current_time_in_seconds() -> TimestampSeconds {
    get_current_time().as_secs()
}

pub fn get_current_time_in_millis() -> TimestampMillis {
    get_current_time().as_millis() as TimestampMillis
}
