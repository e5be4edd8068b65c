//! Jittered exponential backoff for transient upstream failures. Permanent
//! errors are never retried -- the caller decides by returning the right
//! `EngineError` variant from the closure.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::EngineError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 200;

/// Runs `op` up to `MAX_ATTEMPTS` times, retrying only on
/// `EngineError::TransientUpstream`. Delay doubles each attempt plus up to
/// 50% jitter. The final attempt's error (transient or not) is returned as-is.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(EngineError::TransientUpstream(msg)) if attempt < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, %msg, "transient upstream error, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(other) => return Err(other),
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = BASE_DELAY_MS * 2u64.pow(attempt.saturating_sub(1));
    let jitter_frac = rand::rng().random_range(0.0..0.5);
    let jittered = base as f64 * (1.0 + jitter_frac);
    Duration::from_millis(jittered as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_up_to_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, EngineError> = with_retry(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(EngineError::TransientUpstream("rpc timeout".into()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, EngineError> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::PermanentUpstream("bad schema".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
