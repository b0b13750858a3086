//! Exponential backoff for throttled caption requests.
//!
//! Wait for retry `n` (starting at 1) is `2^n * base` plus an additive
//! jitter drawn uniformly from 100..600 ms.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::captions::CaptionError;

/// Lower bound of the additive jitter
pub const JITTER_MIN: Duration = Duration::from_millis(100);

/// Upper bound of the additive jitter
pub const JITTER_MAX: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max_retries: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self { base, max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Deterministic part of the wait before retry `attempt`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1u32 << attempt.min(31))
    }

    /// Full wait before retry `attempt`, jitter included
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay(attempt) + jitter()
    }

    /// Run `op`, retrying it while it fails with [`CaptionError::RateLimited`].
    ///
    /// Any other error is returned at once. Once `max_retries` retries have
    /// been spent the last rate-limit error is returned.
    pub async fn retry<T, F, Fut>(&self, video_id: &str, mut op: F) -> Result<T, CaptionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CaptionError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(CaptionError::RateLimited(reason)) if attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.delay(attempt);
                    warn!(
                        video_id,
                        attempt,
                        max_retries = self.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited ({}), backing off",
                        reason
                    );
                    tokio::time::sleep(wait).await;
                }
                result => return result,
            }
        }
    }
}

fn jitter() -> Duration {
    let span = (JITTER_MAX - JITTER_MIN).as_secs_f64();
    JITTER_MIN + Duration::from_secs_f64(fastrand::f64() * span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_base_delay_doubles() {
        let backoff = Backoff::new(Duration::from_millis(800), 6);
        let delays: Vec<_> = (1..=6).map(|n| backoff.base_delay(n)).collect();

        assert_eq!(delays[0], Duration::from_millis(1600));
        assert_eq!(delays[5], Duration::from_millis(51_200));
        for (n, delay) in (1..=6u32).zip(&delays) {
            assert_eq!(*delay, Duration::from_millis(800) * 2u32.pow(n));
        }
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_jitter_is_additive_and_bounded() {
        let backoff = Backoff::new(Duration::from_secs(1), 3);
        for _ in 0..200 {
            let extra = backoff.delay(2) - backoff.base_delay(2);
            assert!(extra >= JITTER_MIN && extra <= JITTER_MAX, "{extra:?}");
        }
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let backoff = Backoff::new(Duration::from_secs(1), 3);
        assert!(backoff.base_delay(200) >= backoff.base_delay(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_rate_limit() {
        let backoff = Backoff::new(Duration::from_millis(800), 6);
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();

        let result = backoff
            .retry("vid", move || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(CaptionError::RateLimited("HTTP 429".to_string())),
                    _ => Ok("text"),
                }
            })
            .await;

        assert_eq!(result, Ok("text"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1.6s + 3.2s of backoff, plus two jitters
        assert!(started.elapsed() >= Duration::from_millis(4800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_budget() {
        let backoff = Backoff::new(Duration::from_millis(10), 2);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = backoff
            .retry("vid", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CaptionError::RateLimited("HTTP 429".to_string()))
            })
            .await;

        assert!(matches!(result, Err(CaptionError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let backoff = Backoff::new(Duration::from_secs(60), 6);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = backoff
            .retry("vid", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CaptionError::TranscriptsDisabled)
            })
            .await;

        assert_eq!(result, Err(CaptionError::TranscriptsDisabled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
