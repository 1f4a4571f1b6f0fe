use std::future::Future;
use std::time::Duration;

use anyhow::Result;

/// Sleeps `step`, then fetches, up to `attempts` times. Stops at the first
/// value for which `done` holds and returns it; otherwise returns the last
/// fetched value (or `None` when `attempts` is 0).
///
/// # Errors
/// Returns the first fetch error.
pub async fn poll_until<T, F, Fut, P>(
    step: Duration,
    attempts: u32,
    mut fetch: F,
    done: P,
) -> Result<Option<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    let mut last = None;
    for attempt in 1..=attempts {
        tokio::time::sleep(step).await;
        let value = fetch(attempt).await?;
        if done(&value) {
            return Ok(Some(value));
        }
        last = Some(value);
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_poll_until_stops_on_match() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let value = poll_until(
            Duration::ZERO,
            5,
            move |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(attempt) }
            },
            |value| *value == 3,
        )
        .await
        .unwrap();
        assert_eq!(value, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_returns_last_value() {
        let value = poll_until(
            Duration::ZERO,
            4,
            |attempt| async move { Ok(attempt * 10) },
            |_| false,
        )
        .await
        .unwrap();
        assert_eq!(value, Some(40));
    }

    #[tokio::test]
    async fn test_poll_until_propagates_errors() {
        let result: Result<Option<u32>> = poll_until(
            Duration::ZERO,
            3,
            |_| async { Err(anyhow::anyhow!("fetch failed")) },
            |_| true,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_poll_until_zero_attempts() {
        let value: Option<u32> =
            poll_until(Duration::ZERO, 0, |_| async { Ok(1) }, |_| true)
                .await
                .unwrap();
        assert!(value.is_none());
    }
}
