//! Retry delay arithmetic shared by the liveness loops

use std::time::Duration;

/// Wait before the next heartbeat after `failures` consecutive failures
///
/// `min(max, initial * 2^failures)`, saturating at `max` on overflow.
pub fn heartbeat_backoff(initial: Duration, max: Duration, failures: u32) -> Duration {
    2u32.checked_pow(failures)
        .and_then(|factor| initial.checked_mul(factor))
        .map(|delay| delay.min(max))
        .unwrap_or(max)
}

/// Delay after the `attempt`-th failed registration attempt (1-based)
///
/// `base`, `2 * base`, `4 * base`, ...
pub fn registration_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    2u32.checked_pow(exponent)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}
