use std::time::Duration;

/// Exponential backoff w/ "full jitter": sleep for a random duration in
/// `[0, min(cap, base * 2^attempt)]`.
///
/// This tends to behave well under contention and avoids lockstep retries.
/// Used by the Record Store's optimistic-conflict retry (§4.2).
pub fn backoff_full_jitter(base: Duration, cap: Duration, attempt: usize) -> Duration {
    let base_ms = base.as_millis() as u64;
    let cap_ms = cap.as_millis() as u64;

    let pow = if attempt >= 63 {
        u64::MAX
    } else {
        1u64 << attempt
    };

    let exp_ms = base_ms.saturating_mul(pow);
    let upper = exp_ms.min(cap_ms).max(1);

    let jitter_ms = rand::random_range(0..=upper);
    Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_cap_across_many_attempts() {
        let base = Duration::from_millis(50);
        let cap = Duration::from_secs(2);
        for attempt in 0..10 {
            for _ in 0..50 {
                let d = backoff_full_jitter(base, cap, attempt);
                assert!(d <= cap, "attempt {attempt} produced {d:?} > cap {cap:?}");
            }
        }
    }

    #[test]
    fn never_negative_and_bounded_by_base_on_first_attempt() {
        let base = Duration::from_millis(10);
        let cap = Duration::from_secs(5);
        for _ in 0..50 {
            let d = backoff_full_jitter(base, cap, 0);
            assert!(d <= base);
        }
    }

    #[test]
    fn huge_attempt_count_saturates_instead_of_overflowing() {
        let base = Duration::from_millis(10);
        let cap = Duration::from_millis(500);
        let d = backoff_full_jitter(base, cap, 100);
        assert!(d <= cap);
    }
}
