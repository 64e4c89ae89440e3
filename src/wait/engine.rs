/// Bounded polling of an eventually-consistent remote predicate.
///
/// The predicate is invoked until it yields a usable value, fails with a kind
/// outside the ignore set, or the deadline passes. There is no cancel handle:
/// dropping the returned future is the only way to abandon a wait early.
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::WaitConfig;
use crate::errors::{DriverError, DriverResult, ErrorKind};
use crate::wait::usable::Usable;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Wait {
    timeout: Duration,
    interval: Duration,
    ignored: HashSet<ErrorKind>,
    message: Option<String>,
}

impl Wait {
    /// A wait with no ignored failure kinds: every predicate error is fatal.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: DEFAULT_INTERVAL,
            ignored: HashSet::new(),
            message: None,
        }
    }

    pub fn from_config(config: &WaitConfig) -> Self {
        Self::new(Duration::from_millis(config.timeout_ms))
            .interval(Duration::from_millis(config.interval_ms))
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn ignoring(mut self, kind: ErrorKind) -> Self {
        self.ignored.insert(kind);
        self
    }

    pub fn ignoring_all(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.ignored.extend(kinds);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.interval
    }

    pub async fn until<T, F, Fut>(&self, mut predicate: F) -> DriverResult<T>
    where
        T: Usable,
        F: FnMut() -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        let start = Instant::now();
        // A timeout too large for the clock means no deadline at all.
        let deadline = start.checked_add(self.timeout);
        let mut attempts: u32 = 0;
        let mut last_error: Option<DriverError> = None;

        loop {
            attempts += 1;
            match predicate().await {
                Ok(value) if value.is_usable() => {
                    tracing::debug!(attempts, elapsed = ?start.elapsed(), "wait condition met");
                    return Ok(value);
                }
                Ok(_) => {
                    tracing::trace!(attempt = attempts, "condition not met yet");
                }
                Err(e) if self.ignored.contains(&e.kind()) => {
                    tracing::debug!(attempt = attempts, error = %e, "ignoring transient failure");
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::debug!(attempt = attempts, error = %e, "predicate failed, aborting wait");
                    return Err(e);
                }
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                let elapsed = now - start;
                let message = self
                    .message
                    .clone()
                    .unwrap_or_else(|| "Condition was not met".to_string());
                tracing::warn!(
                    attempts,
                    elapsed = ?elapsed,
                    timeout = ?self.timeout,
                    message = %message,
                    "wait timed out"
                );
                return Err(DriverError::WaitTimeout {
                    message,
                    timeout: self.timeout,
                    interval: self.interval,
                    elapsed,
                    attempts,
                    last_error: last_error.map(Box::new),
                });
            }

            if self.interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                // Never sleep past the deadline so the last attempt lands on it.
                let pause = match deadline {
                    Some(deadline) => self.interval.min(deadline - now),
                    None => self.interval,
                };
                tokio::time::sleep(pause).await;
            }
        }
    }
}

/// Function form of [`Wait`].
pub async fn wait<T, F, Fut>(
    predicate: F,
    timeout: Duration,
    interval: Duration,
    ignored: &[ErrorKind],
    message: Option<&str>,
) -> DriverResult<T>
where
    T: Usable,
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<T>>,
{
    let mut w = Wait::new(timeout)
        .interval(interval)
        .ignoring_all(ignored.iter().copied());
    if let Some(m) = message {
        w = w.message(m);
    }
    w.until(predicate).await
}
