//! Error returned by `Effect::retry`.

use std::fmt;

use crate::duration::Duration;

/// Every attempt failed, or the policy stopped retrying.
///
/// ```rust
/// use eddy::{Duration, Effect, Either, RetryPolicy, Runtime};
///
/// let effect = Effect::<(), &str>::fail("always fails")
///     .retry(RetryPolicy::constant(Duration::ZERO).with_max_retries(2));
///
/// match Runtime::default().run_sync(&effect) {
///     Either::Left(exhausted) => {
///         assert_eq!(exhausted.final_error, "always fails");
///         assert_eq!(exhausted.attempts, 3);
///     }
///     Either::Right(_) => panic!("expected failure"),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// The error from the last attempt.
    pub final_error: E,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Time spent sleeping between attempts.
    pub total_duration: Duration,
}

impl<E> RetryExhausted<E> {
    /// Create a new `RetryExhausted`.
    pub fn new(final_error: E, attempts: u32, total_duration: Duration) -> Self {
        Self {
            final_error,
            attempts,
            total_duration,
        }
    }

    /// Extract the final error, discarding metadata.
    pub fn into_error(self) -> E {
        self.final_error
    }

    /// The final error.
    pub fn error(&self) -> &E {
        &self.final_error
    }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "retry exhausted after {} attempts ({}): {}",
            self.attempts, self.total_duration, self.final_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.final_error)
    }
}
