//! # Eddy
//!
//! Lazy, reusable effects run by a cooperative fiber runtime.
//!
//! An [`Effect<A, E, R>`](Effect) is a value that *describes* a computation:
//! it may need an environment `R`, succeed with an `A`, fail with an `E`,
//! die with a [`Defect`], or be interrupted. Nothing happens until a
//! [`Runtime`] runs it, and the same effect can be run again and again.
//!
//! ## Quick Example
//!
//! ```rust
//! use eddy::prelude::*;
//!
//! fn parse(input: &'static str) -> Effect<i32, String> {
//!     Effect::try_catch(move || input.parse::<i32>(), |e| e.to_string())
//! }
//!
//! let program = parse("20")
//!     .zip_with(parse("22"), |a, b| a + b)
//!     .tap(|total| log_info(format!("total is {total}")))
//!     .log_span("parsing");
//!
//! let runtime = Runtime::builder().loggers(LoggerSet::empty()).build();
//! assert_eq!(runtime.run_sync(&program), Either::right(42));
//!
//! let broken = parse("x").or_else_succeed::<String>(0);
//! assert_eq!(runtime.run_sync(&broken), Either::right(0));
//! ```
//!
//! ## What's inside
//!
//! - [`effect`]: the effect value, its constructors and combinators,
//!   do-notation, resource scoping and retry.
//! - [`runtime`]: the [`Runtime`], fibers, interruption and the [`Clock`]
//!   boundary.
//! - [`logger`]: leveled, structured logging with spans, annotations and
//!   pluggable sinks, plus a bridge to `tracing`.
//! - [`Either`], [`Duration`], [`Exit`] and [`Cause`]: the value types the
//!   rest of the crate speaks.
//! - [`retry`]: backoff policies.
//! - [`testing`]: capture loggers, a manual clock and exit assertions.
//!
//! [`Clock`]: runtime::Clock

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod duration;
pub mod effect;
pub mod either;
pub mod exit;
pub mod logger;
pub mod retry;
pub mod runtime;
pub mod testing;

// Re-exports
pub use duration::{Duration, DurationParseError};
pub use effect::{
    log, log_debug, log_error, log_fatal, log_info, log_trace, log_warning, log_with, Bindings,
    Effect, Resource,
};
pub use either::Either;
pub use exit::{Cause, Defect, Exit};
pub use retry::{RetryExhausted, RetryPolicy};
pub use runtime::{Fiber, FiberId, Runtime, RuntimeBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::duration::Duration;
    pub use crate::effect::prelude::*;
    pub use crate::either::Either;
    pub use crate::exit::{Cause, Defect, Exit};
    pub use crate::logger::{LogLevel, LoggerPatch, LoggerSet};
    pub use crate::retry::{RetryExhausted, RetryPolicy};
    pub use crate::runtime::{Fiber, FiberId, Runtime};
}
