//! Wall-clock helpers.
//!
//! Persisted domain timestamps (`lastStartTime`, `startTime`, ...) are Unix
//! epoch milliseconds so every window agrees on them. Process-local timing
//! (debounce, cooldowns, animation) uses `Instant` instead.

use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Millis {
    Utc::now().timestamp_millis()
}

/// Whole seconds elapsed between two epoch-millisecond stamps.
///
/// Negative spans (clock skew between windows) count as zero.
pub fn elapsed_secs(from: Millis, to: Millis) -> u64 {
    if to <= from {
        return 0;
    }
    ((to - from) / 1000) as u64
}
