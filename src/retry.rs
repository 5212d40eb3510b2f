//! Bounded retry with exponential backoff around a single external call.
//!
//! The invoker is an explicit state machine (Idle, Calling, BackingOff,
//! Succeeded, Failed) so attempt counts and delays are testable without
//! real network calls or real timers. Sleeping goes through the injected
//! [`Sleeper`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::InventoryError;

/// Maximum attempts for one external call.
pub const MAX_ATTEMPTS: u32 = 3;

/// Sleep abstraction so retry timing is testable.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// States of the retry machine. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Calling,
    BackingOff,
    Succeeded,
    Failed,
}

/// Drives one external call through up to [`MAX_ATTEMPTS`] attempts.
///
/// The delay after failed attempt `i` (0-based) is `2^i` seconds, so three
/// straight failures back off 1s, 2s, 4s. The backoff runs after every
/// failed attempt, the last one included, matching the collection loop the
/// scripts used before giving up. The caller gets a parsed value or a
/// terminal failure, never a partial result.
pub struct Invoker<'a> {
    sleeper: &'a dyn Sleeper,
    state: RetryState,
}

impl<'a> Invoker<'a> {
    pub fn new(sleeper: &'a dyn Sleeper) -> Self {
        Self {
            sleeper,
            state: RetryState::Idle,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Run `call` until it succeeds or attempts are exhausted.
    ///
    /// Non-retryable errors (config, not-found) propagate immediately
    /// without consuming further attempts.
    pub async fn invoke<T, F, Fut>(
        &mut self,
        label: &str,
        mut call: F,
    ) -> Result<T, InventoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InventoryError>>,
    {
        let mut last_error = InventoryError::Transient(format!("{label}: no attempt made"));

        for attempt in 0..MAX_ATTEMPTS {
            self.state = RetryState::Calling;
            match call().await {
                Ok(value) => {
                    self.state = RetryState::Succeeded;
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    let delay = Duration::from_secs(1 << attempt);
                    warn!(
                        call = label,
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "call failed, backing off"
                    );
                    self.state = RetryState::BackingOff;
                    self.sleeper.sleep(delay).await;
                    last_error = err;
                }
                Err(err) => {
                    self.state = RetryState::Failed;
                    return Err(err);
                }
            }
        }

        self.state = RetryState::Failed;
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records requested delays instead of sleeping.
    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn delays_secs(&self) -> Vec<u64> {
            self.delays
                .lock()
                .unwrap()
                .iter()
                .map(Duration::as_secs)
                .collect()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    #[tokio::test]
    async fn three_failures_back_off_one_two_four_then_fail() {
        let sleeper = RecordingSleeper::default();
        let mut invoker = Invoker::new(&sleeper);
        let attempts = Mutex::new(0u32);

        let result: Result<(), _> = invoker
            .invoke("describe-load-balancers", || {
                *attempts.lock().unwrap() += 1;
                async { Err(InventoryError::Transient("exit status 255".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(invoker.state(), RetryState::Failed);
        assert_eq!(*attempts.lock().unwrap(), 3);
        assert_eq!(sleeper.delays_secs(), vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn success_on_second_attempt_sleeps_once() {
        let sleeper = RecordingSleeper::default();
        let mut invoker = Invoker::new(&sleeper);
        let attempts = Mutex::new(0u32);

        let result = invoker
            .invoke("list-hosted-zones", || {
                let n = {
                    let mut guard = attempts.lock().unwrap();
                    *guard += 1;
                    *guard
                };
                async move {
                    if n < 2 {
                        Err(InventoryError::Parse("malformed body".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(invoker.state(), RetryState::Succeeded);
        assert_eq!(*attempts.lock().unwrap(), 2);
        // One backoff between attempt 1 and attempt 2, 2^0 seconds.
        assert_eq!(sleeper.delays_secs(), vec![1]);
    }

    #[tokio::test]
    async fn non_retryable_error_propagates_immediately() {
        let sleeper = RecordingSleeper::default();
        let mut invoker = Invoker::new(&sleeper);
        let attempts = Mutex::new(0u32);

        let result: Result<(), _> = invoker
            .invoke("describe-network-acls", || {
                *attempts.lock().unwrap() += 1;
                async { Err(InventoryError::NotFound("no such vpc".into())) }
            })
            .await;

        assert!(matches!(result, Err(InventoryError::NotFound(_))));
        assert_eq!(invoker.state(), RetryState::Failed);
        assert_eq!(*attempts.lock().unwrap(), 1);
        assert!(sleeper.delays_secs().is_empty());
    }

    #[tokio::test]
    async fn first_attempt_success_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let mut invoker = Invoker::new(&sleeper);

        let result = invoker.invoke("list-hosted-zones", || async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(invoker.state(), RetryState::Succeeded);
        assert!(sleeper.delays_secs().is_empty());
    }
}
