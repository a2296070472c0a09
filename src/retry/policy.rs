//! Retry policy types and configuration.

use crate::duration::Duration;

/// How to retry a failed effect.
///
/// Policies are pure data: they describe retry behavior but don't execute
/// it, which makes them easy to test, clone, and inspect.
///
/// # Bounds
///
/// An effect retried with a policy that has neither `max_retries` nor
/// `max_delay` set would retry forever, so [`Effect::retry`] treats such a
/// policy as a defect. See [`validate`](RetryPolicy::validate).
///
/// [`Effect::retry`]: crate::Effect::retry
///
/// ```rust
/// use eddy::{Duration, RetryPolicy};
///
/// let policy = RetryPolicy::exponential(Duration::millis(100)).with_max_retries(5);
/// assert_eq!(policy.max_retries(), Some(5));
///
/// let capped = RetryPolicy::constant(Duration::millis(500)).with_max_delay(Duration::seconds(30));
/// assert!(capped.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    max_retries: Option<u32>,
    max_delay: Option<Duration>,
    jitter: JitterStrategy,
}

/// The backoff strategy for retry delays.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Fixed delay between attempts.
    Constant(Duration),
    /// `base * (attempt + 1)`.
    Linear {
        /// Base delay.
        base: Duration,
    },
    /// `base * 2^attempt`.
    Exponential {
        /// Base delay.
        base: Duration,
    },
    /// `base * fib(attempt + 1)`.
    Fibonacci {
        /// Base delay.
        base: Duration,
    },
}

/// Randomness added to computed delays.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JitterStrategy {
    /// No jitter.
    #[default]
    None,
    /// Up to ±factor of the delay.
    Proportional(f64),
    /// Anywhere between zero and the delay.
    Full,
    /// Between the delay and three times the previous delay.
    Decorrelated,
}

impl RetryPolicy {
    fn with_strategy(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            max_retries: None,
            max_delay: None,
            jitter: JitterStrategy::None,
        }
    }

    /// The same delay before every retry.
    ///
    /// ```rust
    /// use eddy::{Duration, RetryPolicy};
    ///
    /// let policy = RetryPolicy::constant(Duration::millis(500)).with_max_retries(3);
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::millis(500)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::millis(500)));
    /// assert_eq!(policy.delay_for_attempt(3), None);
    /// ```
    pub fn constant(delay: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Constant(delay))
    }

    /// Linearly increasing delay.
    pub fn linear(base: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Linear { base })
    }

    /// Doubling delay.
    pub fn exponential(base: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Exponential { base })
    }

    /// Fibonacci delay: 1, 1, 2, 3, 5, ... times `base`.
    ///
    /// ```rust
    /// use eddy::{Duration, RetryPolicy};
    ///
    /// let policy = RetryPolicy::fibonacci(Duration::millis(100)).with_max_retries(5);
    ///
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::millis(100)));
    /// assert_eq!(policy.delay_for_attempt(4), Some(Duration::millis(500)));
    /// ```
    pub fn fibonacci(base: Duration) -> Self {
        Self::with_strategy(RetryStrategy::Fibonacci { base })
    }

    /// Maximum number of retries, not counting the first attempt.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Cap every delay at `d`.
    ///
    /// A capped policy with no retry limit keeps retrying at the cap.
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Add up to ±`factor` (clamped to `0.0..=1.0`) of randomness to each
    /// delay. Needs the `jitter` feature to have any effect.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = JitterStrategy::Proportional(factor.clamp(0.0, 1.0));
        self
    }

    /// Pick each delay uniformly between zero and the computed delay.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Full;
        self
    }

    /// Pick each delay between the computed delay and three times the
    /// previous one.
    pub fn with_decorrelated_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Decorrelated;
        self
    }

    /// The retry limit, if any.
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// The delay cap, if any.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// The jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// The backoff strategy.
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// The delay before retry number `attempt` (0-indexed), or `None` once
    /// the retry limit is reached. Jitter is not applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_retries {
            if attempt >= max {
                return None;
            }
        }

        let base_delay = match &self.strategy {
            RetryStrategy::Constant(d) => *d,
            RetryStrategy::Linear { base } => base.times(u64::from(attempt) + 1),
            RetryStrategy::Exponential { base } => base.times(2u64.saturating_pow(attempt)),
            RetryStrategy::Fibonacci { base } => base.times(fibonacci(attempt + 1)),
        };

        Some(match self.max_delay {
            Some(max) => base_delay.min(max),
            None => base_delay,
        })
    }

    pub(crate) fn delay_with_jitter(
        &self,
        attempt: u32,
        prev_delay: Option<Duration>,
    ) -> Option<Duration> {
        let base_delay = self.delay_for_attempt(attempt)?;
        Some(self.jitter.apply(base_delay, prev_delay, self.max_delay))
    }

    /// Check that the policy eventually stops retrying.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_retries.is_none() && self.max_delay.is_none() {
            Err("RetryPolicy must have at least one bound (max_retries or max_delay)")
        } else {
            Ok(())
        }
    }
}

impl JitterStrategy {
    /// Apply jitter to `base_delay`, then cap the result at `max_delay`.
    pub fn apply(
        &self,
        base_delay: Duration,
        #[cfg_attr(not(feature = "jitter"), allow(unused_variables))] prev_delay: Option<Duration>,
        max_delay: Option<Duration>,
    ) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let base_millis = base_delay.to_millis() as f64;
                let range = base_millis * factor;
                let min = (base_millis - range).max(0.0);
                let max = base_millis + range;
                if max <= min {
                    base_delay
                } else {
                    Duration::millis(rand::rng().random_range(min..=max) as u64)
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                match base_delay.to_millis() {
                    0 => Duration::ZERO,
                    max => Duration::millis(rand::rng().random_range(0..=max)),
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Decorrelated => {
                use rand::Rng;
                let prev = prev_delay.unwrap_or(base_delay);
                let low = base_delay.to_millis();
                let high = prev.times(3).to_millis();
                if high <= low {
                    base_delay
                } else {
                    Duration::millis(rand::rng().random_range(low..=high))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Decorrelated => base_delay,
        };

        match max_delay {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}

fn fibonacci(n: u32) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut a = 0u64;
    let mut b = 1u64;
    for _ in 1..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    b
}
