//! Exponential backoff with optional jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before retry number `retry` (0-based).
///
/// `min(base * 2^retry, max)`, plus up to `jitter_ratio` of that delay, never
/// exceeding `max`.
pub fn calculate_backoff(retry: u32, base: Duration, max: Duration, jitter_ratio: f64) -> Duration {
    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let exponential_base = 2u64.saturating_pow(retry);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = (capped_delay as f64 * jitter_ratio.clamp(0.0, 1.0)) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay.saturating_add(jitter).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(1000);
    const MAX: Duration = Duration::from_millis(8000);

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, BASE, MAX, 0.0), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(1, BASE, MAX, 0.0), Duration::from_millis(2000));
        assert_eq!(calculate_backoff(2, BASE, MAX, 0.0), Duration::from_millis(4000));
        assert_eq!(calculate_backoff(3, BASE, MAX, 0.0), Duration::from_millis(8000));
        assert_eq!(calculate_backoff(4, BASE, MAX, 0.0), Duration::from_millis(8000));
    }

    #[test]
    fn test_huge_attempt_saturates_to_cap() {
        assert_eq!(calculate_backoff(200, BASE, MAX, 0.0), MAX);
    }

    #[test]
    fn test_jitter_stays_within_cap() {
        for retry in 0..6 {
            let d = calculate_backoff(retry, BASE, MAX, 0.5);
            let floor = calculate_backoff(retry, BASE, MAX, 0.0);
            assert!(d >= floor);
            assert!(d <= MAX);
        }
    }
}
