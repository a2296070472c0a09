//! Effects as values.
//!
//! An [`Effect<A, E, R>`](Effect) describes a computation that, when run by
//! a [`Runtime`](crate::Runtime), needs an environment `R`, and either
//! succeeds with an `A`, fails with an expected error `E`, dies with a
//! [`Defect`](crate::Defect), or is interrupted.
//!
//! Building an effect runs nothing. Effects are cheap to clone and can be
//! run any number of times; every run starts from the same description.
//!
//! ```rust
//! use eddy::{Effect, Either, Runtime};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let calls = Arc::new(AtomicUsize::new(0));
//! let counter = calls.clone();
//! let effect = Effect::<usize, String>::sync(move || counter.fetch_add(1, Ordering::SeqCst) + 1);
//!
//! assert_eq!(calls.load(Ordering::SeqCst), 0, "nothing runs until asked");
//!
//! let runtime = Runtime::default();
//! assert_eq!(runtime.run_sync(&effect), Either::right(1));
//! assert_eq!(runtime.run_sync(&effect), Either::right(2));
//! ```
//!
//! # Failure channels
//!
//! - `E` is the expected, typed failure. `catch_all`, `map_err`, `fold`,
//!   `either` and `retry` work on it.
//! - A panic inside any closure given to an effect is a defect. Defects are
//!   never routed into `E`; only `catch_all_cause` and `exit` observe them.
//! - Interruption is observed by finalizers (`ensuring`, `on_interrupt`,
//!   `acquire_use_release`) and by whoever awaits the fiber.
//!
//! # Type parameters
//!
//! `E` defaults to [`Infallible`] (cannot fail) and `R` to `()` (needs no
//! environment). Runtimes run effects with `R = ()`; use
//! [`provide`](Effect::provide) to eliminate any other environment first.

mod bind;
mod combinators;
mod constructors;
mod control;
mod logging;
pub(crate) mod primitive;
mod retry;


pub use bind::Bindings;
pub use constructors::{die, fail, fiber_id, interrupt, never, sleep, succeed, sync, unit, yield_now};
pub use control::{AllTuple, Resource};
pub use logging::{log, log_debug, log_error, log_fatal, log_info, log_trace, log_warning, log_with};

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;

use primitive::{Instruction, Node, Primitive};

/// A lazy, reusable description of a computation.
///
/// See the [module documentation](self) for an overview.
pub struct Effect<A, E = Infallible, R = ()> {
    node: Node,
    _marker: PhantomData<fn() -> (A, E, R)>,
}

impl<A, E, R> Effect<A, E, R> {
    pub(crate) fn from_node<F>(build: F) -> Self
    where
        F: Fn() -> Primitive + Send + Sync + 'static,
    {
        Effect {
            node: std::sync::Arc::new(build),
            _marker: PhantomData,
        }
    }

    /// The instruction that runs this effect within a larger one.
    pub(crate) fn instruction(&self) -> Instruction {
        Instruction::Node(self.node.clone())
    }

    /// Reinterpret the type parameters without changing the description.
    ///
    /// Only sound when the values flowing through the effect already have the
    /// target types, e.g. an error type that can never be produced.
    fn retype<A2, E2, R2>(self) -> Effect<A2, E2, R2> {
        Effect {
            node: self.node,
            _marker: PhantomData,
        }
    }
}

impl<A, R> Effect<A, Infallible, R> {
    /// Use an effect that cannot fail where another error type is expected.
    pub fn widen_err<E2>(self) -> Effect<A, E2, R> {
        self.retype()
    }
}

impl<A, E, R> Clone for Effect<A, E, R> {
    fn clone(&self) -> Self {
        Effect {
            node: self.node.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A, E, R> fmt::Debug for Effect<A, E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("success", &std::any::type_name::<A>())
            .field("error", &std::any::type_name::<E>())
            .field("env", &std::any::type_name::<R>())
            .finish()
    }
}

/// Commonly used items.
pub mod prelude {
    pub use super::{
        die, fail, fiber_id, interrupt, log, log_debug, log_error, log_fatal, log_info, log_trace,
        log_warning, log_with, never, sleep, succeed, sync, unit, yield_now, AllTuple, Bindings,
        Effect, Resource,
    };
    pub use crate::effect_do;
}
