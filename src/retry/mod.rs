//! Retry policies for effects.
//!
//! A [`RetryPolicy`] is plain data describing how long to wait between
//! attempts and when to give up. [`Effect::retry`](crate::Effect::retry)
//! consumes it, sleeping on the runtime clock between attempts.
//!
//! ```rust
//! use eddy::{Duration, RetryPolicy};
//!
//! let policy = RetryPolicy::exponential(Duration::millis(100)).with_max_retries(3);
//!
//! assert_eq!(policy.delay_for_attempt(0), Some(Duration::millis(100)));
//! assert_eq!(policy.delay_for_attempt(2), Some(Duration::millis(400)));
//! assert_eq!(policy.delay_for_attempt(3), None);
//! ```
//!
//! # Strategies
//!
//! - **Constant**: the same delay every time
//! - **Linear**: 100ms, 200ms, 300ms, ...
//! - **Exponential**: 100ms, 200ms, 400ms, ...
//! - **Fibonacci**: 100ms, 100ms, 200ms, 300ms, 500ms, ...
//!
//! # Jitter
//!
//! Randomized delays need the `jitter` feature. Without it, every jitter
//! strategy returns the unjittered delay.

mod error;
mod policy;

pub use error::RetryExhausted;
pub use policy::{JitterStrategy, RetryPolicy, RetryStrategy};
