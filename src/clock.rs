//! Monotonic clock helpers and the pacing arithmetic shared by every rate-limited loop.

use std::time::Instant;

/// Nanoseconds since an arbitrary but fixed reference point, backed by [`Instant`].
///
/// Only differences between two [`now_ns`] calls are meaningful.
pub fn now_ns(epoch: Instant) -> u64 {
    epoch.elapsed().as_nanos() as u64
}

/// Elapsed nanoseconds between two timestamps, saturating to zero instead of underflowing.
///
/// Clock readings on different cores can occasionally appear out of order; every histogram
/// sample must carry a non-negative delta.
pub fn elapsed_ns(start_ns: u64, end_ns: u64) -> u64 {
    end_ns.saturating_sub(start_ns)
}

/// Target cumulative microseconds after `k` iterations of a loop running at `rate_per_sec`,
/// optionally divided across `divisor` peers (large-block loops split the aggregate rate across
/// devices; the producer uses `divisor = 1`).
///
/// Computed in `u128` so that multi-day runs at extreme configured rates don't overflow before
/// narrowing back down to microseconds.
pub fn target_us(k: u64, rate_per_sec: u64, divisor: u64) -> u64 {
    if rate_per_sec == 0 {
        return 0;
    }
    let k = k as u128;
    let rate = rate_per_sec as u128;
    let divisor = divisor.max(1) as u128;
    ((k * 1_000_000u128 * divisor) / rate) as u64
}

/// How far behind (in microseconds) `current_us` is relative to `target_us`.
///
/// Zero or negative means the loop is on schedule or ahead; callers sleep the positive
/// difference and declare overload once it exceeds [`crate::run::OVERLOAD_LAG_US`].
pub fn lag_us(target_us: u64, current_us: u64) -> i64 {
    current_us as i64 - target_us as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_us_single_device() {
        // 8 ops/sec, no division: iteration 8 should land at 1 second.
        assert_eq!(target_us(8, 8, 1), 1_000_000);
    }

    #[test]
    fn target_us_divided_across_devices() {
        // Aggregate rate of 8 ops/sec spread over 2 devices: each device's iteration 4
        // should land at 1 second (4 * 1e6 * 2 / 8).
        assert_eq!(target_us(4, 8, 2), 1_000_000);
    }

    #[test]
    fn target_us_zero_rate_never_advances() {
        assert_eq!(target_us(1_000, 0, 1), 0);
    }

    #[test]
    fn elapsed_ns_saturates_instead_of_underflowing() {
        assert_eq!(elapsed_ns(100, 40), 0);
        assert_eq!(elapsed_ns(40, 100), 60);
    }

    #[test]
    fn lag_us_sign() {
        assert!(lag_us(1_000, 500) < 0);
        assert!(lag_us(500, 1_000) > 0);
    }
}
