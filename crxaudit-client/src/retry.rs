use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors that may go away if the same request is simply sent again.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for reqwest::Error {
    fn is_transient(&self) -> bool {
        self.is_connect() || self.is_timeout() || (self.is_request() && dropped_connection(self))
    }
}

/// True when the peer accepted the connection and then closed or reset it
/// before answering.
fn dropped_connection(err: &(dyn StdError + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>()
            && (hyper_err.is_incomplete_message() || hyper_err.is_closed())
        {
            return true;
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// How hard to keep trying when the service cannot be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until the request goes through.
    pub max_attempts: Option<u32>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        // zero attempts would never send anything; treat it as "no cap"
        self.max_attempts = max_attempts.filter(|n| *n > 0);
        self
    }

    pub fn unbounded() -> Self {
        Self::default().with_max_attempts(None)
    }

    /// Delay after the given (1-based) failed attempt: doubles each time,
    /// capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    fn allows_another(&self, attempts_made: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts_made < max)
    }
}

/// Why a retried operation stopped without producing a value.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a transient error.
    Exhausted { attempts: u32, last: E },
    /// A non-transient error; not retried.
    Failed(E),
    Cancelled,
}

/// Run `op` until it succeeds, fails permanently, runs out of attempts or
/// `cancel` fires. `on_transient` sees every transient failure before the
/// backoff sleep.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
    mut on_transient: impl FnMut(u32, &E),
) -> Result<T, RetryError<E>>
where
    E: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;

        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => err,
            Err(err) => return Err(RetryError::Failed(err)),
        };

        on_transient(attempt, &err);
        if !policy.allows_another(attempt) {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        let delay = policy.backoff_for(attempt);
        debug!("Attempt {} failed, retrying in {:?}", attempt, delay);
        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
