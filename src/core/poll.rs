//! Polling until an asynchronous store job reaches a terminal state
//!
//! The store reports upload processing as `IN_PROGRESS` until it is done.
//! [`Poller`] waits a fixed interval between status checks, bounded by an
//! optional attempt count and an optional deadline, and gives up early when
//! its cancellation token fires.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default delay between status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default upper bound on total wait time
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Options for polling behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay before each status check
    pub interval: Duration,
    /// Maximum number of status checks (`None` = unlimited)
    pub max_attempts: Option<u32>,
    /// Maximum total time spent polling (`None` = unlimited)
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }
}

/// Why polling stopped before reaching a terminal state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("still pending after {attempts} checks")]
    Exhausted { attempts: u32 },

    #[error("still pending after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    #[error("polling cancelled")]
    Cancelled,
}

/// Delay source, injectable so tests don't wait in real time
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer; yields to the runtime while waiting
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Final value of a poll loop and how many checks it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polled<T> {
    pub value: T,
    pub checks: u32,
}

/// Fixed-interval poller
///
/// # Examples
///
/// ```no_run
/// use webstore_publisher::core::{PollOptions, Poller};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let poller = Poller::new(PollOptions::default());
///     let cancel = CancellationToken::new();
///
///     let polled = poller
///         .poll_until(0u32, |n| *n < 3, || async { Ok::<_, anyhow::Error>(3) }, &cancel)
///         .await?;
///
///     assert_eq!(polled.checks, 1);
///     Ok(())
/// }
/// ```
pub struct Poller {
    options: PollOptions,
    sleeper: Box<dyn Sleeper>,
}

impl Poller {
    /// Create a poller that sleeps on the tokio timer
    pub fn new(options: PollOptions) -> Self {
        Self::with_sleeper(options, Box::new(TokioSleeper))
    }

    pub fn with_sleeper(options: PollOptions, sleeper: Box<dyn Sleeper>) -> Self {
        Self { options, sleeper }
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Re-run `check` until `is_pending` is false for its result
    ///
    /// `initial` is the value already in hand; if it is not pending, no check
    /// is made. Errors from `check` propagate unchanged. Bounds and
    /// cancellation surface as `E::from(PollError)`.
    pub async fn poll_until<T, E, F, Fut, P>(
        &self,
        initial: T,
        is_pending: P,
        mut check: F,
        cancel: &CancellationToken,
    ) -> Result<Polled<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
        E: From<PollError>,
    {
        let started = Instant::now();
        let mut current = initial;
        let mut checks = 0u32;

        while is_pending(&current) {
            if let Some(max_attempts) = self.options.max_attempts
                && checks >= max_attempts
            {
                return Err(PollError::Exhausted { attempts: checks }.into());
            }

            let elapsed = started.elapsed();
            let wait = match self.options.timeout {
                Some(timeout) if elapsed >= timeout => {
                    return Err(PollError::TimedOut { elapsed }.into());
                }
                // The last check lands on the deadline
                Some(timeout) => self.options.interval.min(timeout - elapsed),
                None => self.options.interval,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled.into()),
                _ = self.sleeper.sleep(wait) => {}
            }

            checks += 1;
            current = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled.into()),
                result = check() => result?,
            };
        }

        Ok(Polled {
            value: current,
            checks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct NoopSleeper;

    #[async_trait]
    impl Sleeper for NoopSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn instant_poller(max_attempts: Option<u32>) -> Poller {
        Poller::with_sleeper(
            PollOptions {
                interval: Duration::from_secs(10),
                max_attempts,
                timeout: None,
            },
            Box::new(NoopSleeper),
        )
    }

    #[tokio::test]
    async fn test_terminal_initial_value_skips_checks() {
        let poller = instant_poller(None);
        let cancel = CancellationToken::new();

        let polled = poller
            .poll_until(
                "done",
                |s| *s == "pending",
                || async { Err::<&str, _>(PollError::Cancelled) },
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(polled.value, "done");
        assert_eq!(polled.checks, 0);
    }

    #[tokio::test]
    async fn test_polls_until_terminal() {
        let poller = instant_poller(None);
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let polled = poller
            .poll_until(
                0u32,
                |n| *n < 4,
                move || {
                    let count = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok::<_, PollError>(count) }
                },
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(polled.value, 4);
        assert_eq!(polled.checks, 4);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_max_attempts_reached() {
        let poller = instant_poller(Some(3));
        let cancel = CancellationToken::new();

        let result = poller
            .poll_until(true, |p| *p, || async { Ok::<_, PollError>(true) }, &cancel)
            .await;

        assert_eq!(result.unwrap_err(), PollError::Exhausted { attempts: 3 });
    }

    #[tokio::test]
    async fn test_check_error_propagates() {
        let poller = instant_poller(None);
        let cancel = CancellationToken::new();

        let result: Result<Polled<bool>, anyhow::Error> = poller
            .poll_until(
                true,
                |p| *p,
                || async { Err(anyhow::anyhow!("connection reset")) },
                &cancel,
            )
            .await;

        assert!(result.unwrap_err().to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_check() {
        let poller = Poller::new(PollOptions::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = poller
            .poll_until(true, |p| *p, || async { Ok::<_, PollError>(true) }, &cancel)
            .await;

        assert_eq!(result.unwrap_err(), PollError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_with_real_interval() {
        let poller = Poller::new(PollOptions {
            interval: Duration::from_secs(10),
            max_attempts: None,
            timeout: Some(Duration::from_secs(25)),
        });
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = poller
            .poll_until(
                true,
                |p| *p,
                move || {
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, PollError>(true) }
                },
                &cancel,
            )
            .await;

        // Checks at 10s, 20s and 25s
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        match result {
            Err(PollError::TimedOut { elapsed }) => {
                assert!(elapsed >= Duration::from_secs(25));
                assert!(elapsed < Duration::from_secs(30));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shorter_than_interval_still_checks_once() {
        let poller = Poller::new(PollOptions {
            interval: Duration::from_secs(10),
            max_attempts: None,
            timeout: Some(Duration::from_secs(4)),
        });
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let polled = poller
            .poll_until(true, |p| *p, || async { Ok::<_, PollError>(false) }, &cancel)
            .await
            .unwrap();

        assert_eq!(polled.checks, 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_inflight_check() {
        let poller = instant_poller(None);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            poller.poll_until(
                true,
                |p| *p,
                || std::future::pending::<Result<bool, PollError>>(),
                &cancel,
            ),
        )
        .await
        .expect("cancellation ends the check");

        assert_eq!(result.unwrap_err(), PollError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_interval_between_checks() {
        let poller = Poller::new(PollOptions {
            interval: Duration::from_secs(10),
            max_attempts: None,
            timeout: None,
        });
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let mut n = 0u32;

        let polled = poller
            .poll_until(
                0u32,
                |v| *v < 2,
                || {
                    n += 1;
                    let value = n;
                    async move { Ok::<_, PollError>(value) }
                },
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(polled.checks, 2);
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[test]
    fn test_poll_options_default() {
        let options = PollOptions::default();

        assert_eq!(options.interval, Duration::from_secs(10));
        assert_eq!(options.max_attempts, None);
        assert_eq!(options.timeout, Some(Duration::from_secs(1800)));
    }
}
