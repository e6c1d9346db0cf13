use std::future::Future;

/// Runs `op` once, and on failure retries exactly once (spec.md §7: "bus:
/// caught; one retry; on second failure the message is dropped (frames) or
/// logged (events)"). The caller decides what to do with a second failure;
/// this helper only owns the "try twice" shape.
pub async fn with_one_retry<F, Fut, T, E>(mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match op().await {
        Ok(v) => Ok(v),
        Err(_first) => op().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_second_attempt() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), &'static str> = with_one_retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { Err("transient") } else { Ok(()) } }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_failure() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), &'static str> = with_one_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err("still failing") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
