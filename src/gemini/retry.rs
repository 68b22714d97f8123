use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use super::queue::QueueError;
use crate::config::RetryConfig;

/// Outer retry for transient failures (transport errors, 5xx).
///
/// Delay before retry `n` (0-based) is `min(initial * 2^n, max)` plus up to
/// `jitter` of random slack.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            jitter: Duration::from_millis(cfg.jitter_ms),
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay)
    }

    pub fn delay<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let slack = if jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..jitter_ms)
        };
        self.base_delay(retry) + Duration::from_millis(slack)
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, QueueError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QueueError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && retry + 1 < self.max_attempts => {
                    let delay = self.delay(retry, &mut rand::thread_rng());
                    retry += 1;
                    warn!(
                        error = %e,
                        attempt = retry,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transient completion failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::gemini::error::GeminiError;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(30_000),
            jitter: Duration::from_millis(1000),
        }
    }

    #[test]
    fn base_delay_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.base_delay(0), Duration::from_millis(2000));
        assert_eq!(p.base_delay(1), Duration::from_millis(4000));
        assert_eq!(p.base_delay(3), Duration::from_millis(16_000));
        assert_eq!(p.base_delay(4), Duration::from_millis(30_000));
        assert_eq!(p.base_delay(20), Duration::from_millis(30_000));
    }

    #[test]
    fn jitter_stays_below_bound() {
        let p = policy();
        let mut rng = StdRng::seed_from_u64(7);
        for retry in 0..5 {
            let d = p.delay(retry, &mut rng);
            assert!(d >= p.base_delay(retry));
            assert!(d < p.base_delay(retry) + Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_use_every_attempt() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(QueueError::Request(GeminiError::Transport("reset".into()))) }
            })
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_a_transient_failure() {
        let calls = AtomicU32::new(0);
        let res = policy()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(QueueError::Request(GeminiError::Server {
                            status: 502,
                            message: "bad gateway".into(),
                        }))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(res.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_and_rate_limit_are_not_retried() {
        for err in [
            QueueError::Request(GeminiError::Auth {
                status: 401,
                message: "no".into(),
            }),
            QueueError::RateLimited("Rate limit exceeded.".into()),
        ] {
            let calls = AtomicU32::new(0);
            let res: Result<(), _> = policy()
                .run(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let err = err.clone();
                    async move { Err(err) }
                })
                .await;
            assert_eq!(res.unwrap_err(), err);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }
}
