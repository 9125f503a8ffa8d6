//! Bounded retry with a fixed delay
//!
//! [`Retry::run`] wraps any fallible async operation; [`Retry::run_blocking`]
//! does the same for synchronous ones. Every failed attempt is logged with the
//! call site that asked for the retry. Fatal errors (see
//! [`ScrapeError::is_fatal`]) are returned immediately.

use crate::config::CrawlerConfig;
use crate::{Result, ScrapeError};
use std::future::Future;
use std::panic::Location as CallSite;
use std::time::Duration;

/// Retry policy shared by every network-bound step of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    max_attempts: u32,
    delay: Duration,
}

impl Retry {
    /// Creates a policy making at most `max_attempts` attempts (at least one)
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_secs(config.retry_delay_secs),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `op` until it succeeds or the attempt budget is spent
    ///
    /// `target` describes what is being attempted and appears in every log
    /// line and in the final [`ScrapeError::RetryExhausted`].
    #[track_caller]
    pub fn run<'a, T, F, Fut>(
        &'a self,
        target: &'a str,
        mut op: F,
    ) -> impl Future<Output = Result<T>> + 'a
    where
        T: 'a,
        F: FnMut() -> Fut + 'a,
        Fut: Future<Output = Result<T>> + 'a,
    {
        let caller = CallSite::caller();

        async move {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match op().await {
                    Ok(value) => return Ok(value),
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        if let Some(exhausted) = self.after_failure(target, caller, attempt, err) {
                            return Err(exhausted);
                        }
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
    }

    /// Blocking counterpart of [`Retry::run`]
    #[track_caller]
    pub fn run_blocking<T, F>(&self, target: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let caller = CallSite::caller();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    if let Some(exhausted) = self.after_failure(target, caller, attempt, err) {
                        return Err(exhausted);
                    }
                    std::thread::sleep(self.delay);
                }
            }
        }
    }

    /// Logs a failed attempt; returns the terminal error once the budget is spent
    fn after_failure(
        &self,
        target: &str,
        caller: &CallSite<'_>,
        attempt: u32,
        err: ScrapeError,
    ) -> Option<ScrapeError> {
        if attempt >= self.max_attempts {
            tracing::error!(
                attempts = attempt,
                target = %target,
                caller = %caller,
                error = %err,
                "Giving up"
            );
            return Some(ScrapeError::RetryExhausted {
                target: target.to_string(),
                attempts: attempt,
                last: Box::new(err),
            });
        }

        tracing::warn!(
            attempt,
            max_attempts = self.max_attempts,
            target = %target,
            caller = %caller,
            error = %err,
            delay_ms = self.delay.as_millis() as u64,
            "Attempt failed, retrying"
        );
        None
    }
}
