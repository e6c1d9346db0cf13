use std::time::Duration;

/// Exponential backoff delay for attempt `n` (0-indexed), spec.md §4.1.3:
/// `min(base * 2^attempt, max_delay)`. Delegates to the shared
/// implementation in `pvs_types::config` so the steady-state reconnect loop
/// here and the initial RTSP candidate resolution in `pvs-frame-source`
/// can't drift apart.
pub fn reconnect_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    pvs_types::backoff_delay(attempt, base, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_each_attempt_until_capped() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);
        assert_eq!(reconnect_delay(0, base, max), Duration::from_secs(1));
        assert_eq!(reconnect_delay(1, base, max), Duration::from_secs(2));
        assert_eq!(reconnect_delay(2, base, max), Duration::from_secs(4));
        assert_eq!(reconnect_delay(6, base, max), Duration::from_secs(60));
        assert_eq!(reconnect_delay(20, base, max), Duration::from_secs(60));
    }
}
