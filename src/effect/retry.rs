//! Re-running failed effects according to a [`RetryPolicy`].

use std::sync::Arc;

use crate::duration::Duration;
use crate::exit::{Cause, Defect};
use crate::retry::{RetryExhausted, RetryPolicy};

use super::primitive::{boxed, unbox, ErasedCause, Instruction, Primitive};
use super::Effect;

type Retryable<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

struct Attempt<A, E, R> {
    effect: Effect<A, E, R>,
    policy: Arc<RetryPolicy>,
    retryable: Retryable<E>,
}

impl<A, E, R> Clone for Attempt<A, E, R> {
    fn clone(&self) -> Self {
        Attempt {
            effect: self.effect.clone(),
            policy: self.policy.clone(),
            retryable: self.retryable.clone(),
        }
    }
}

impl<A, E, R> Attempt<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Run attempt number `attempt` (0-indexed). Each retry is built only
    /// after the previous attempt failed, so the interpreter stack stays flat.
    fn run(self, attempt: u32, prev_delay: Option<Duration>, waited: Duration) -> Instruction {
        let effect = self.effect.instruction();
        Instruction::build(Primitive::Fold {
            effect,
            on_failure: Box::new(move |cause| {
                let error = match cause {
                    Cause::Fail(error) => unbox::<E>(error),
                    other => return Err(other),
                };
                let exhausted = |error: E| -> Result<Instruction, ErasedCause> {
                    Err(Cause::Fail(boxed(RetryExhausted::new(
                        error,
                        attempt + 1,
                        waited,
                    ))))
                };
                if !(self.retryable)(&error) {
                    return exhausted(error);
                }
                match self.policy.delay_with_jitter(attempt, prev_delay) {
                    Some(delay) => {
                        tracing::debug!(attempt = attempt + 1, delay = %delay, "retrying failed effect");
                        Ok(Instruction::build(Primitive::Sleep(delay)).flat_map(move |_| {
                            self.run(attempt + 1, Some(delay), waited.sum(delay))
                        }))
                    }
                    None => exhausted(error),
                }
            }),
            on_success: None,
        })
    }
}

impl<A, E, R> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Re-run the effect on expected failure, sleeping between attempts as
    /// `policy` dictates.
    ///
    /// Defects and interruptions are never retried. When the policy gives
    /// up, the last error is wrapped in [`RetryExhausted`]. A policy with no
    /// bound at all (see [`RetryPolicy::validate`]) makes the effect die.
    ///
    /// ```rust
    /// use eddy::{Duration, Effect, Either, RetryPolicy, Runtime};
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::sync::Arc;
    ///
    /// let calls = Arc::new(AtomicU32::new(0));
    /// let counter = calls.clone();
    /// let flaky = Effect::<&str, String>::try_sync(move || {
    ///     if counter.fetch_add(1, Ordering::SeqCst) < 2 {
    ///         Err("transient".to_string())
    ///     } else {
    ///         Ok("done")
    ///     }
    /// });
    ///
    /// let effect = flaky.retry(RetryPolicy::constant(Duration::ZERO).with_max_retries(5));
    /// assert_eq!(Runtime::default().run_sync(&effect), Either::right("done"));
    /// assert_eq!(calls.load(Ordering::SeqCst), 3);
    /// ```
    pub fn retry(self, policy: RetryPolicy) -> Effect<A, RetryExhausted<E>, R> {
        self.retry_if(policy, |_| true)
    }

    /// Like [`retry`](Effect::retry), but stop at the first error for which
    /// `retryable` returns `false`.
    pub fn retry_if<P>(self, policy: RetryPolicy, retryable: P) -> Effect<A, RetryExhausted<E>, R>
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let attempt = Attempt {
            effect: self,
            policy: Arc::new(policy),
            retryable: Arc::new(retryable),
        };
        Effect::from_node(move || match attempt.policy.validate() {
            Ok(()) => Primitive::FlatMap(
                Instruction::unit(),
                Box::new({
                    let attempt = attempt.clone();
                    move |_| attempt.run(0, None, Duration::ZERO)
                }),
            ),
            Err(reason) => Primitive::Fail(Cause::Die(Defect::new(reason))),
        })
    }
}
