//! Millisecond epoch timestamps.
//!
//! Every persisted timestamp in the engine is an `i64` of milliseconds
//! since the Unix epoch; `chrono` is only used to read the wall clock.

use chrono::Utc;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// One hour, in milliseconds. Used by temporal context windows.
pub const HOUR_MS: i64 = 60 * 60 * 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        // Sanity: after 2020, before 2100.
        assert!(a > 1_577_836_800_000);
        assert!(a < 4_102_444_800_000);
    }
}
