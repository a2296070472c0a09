//! Sequencing, transformation and failure handling.

use std::convert::Infallible;
use std::sync::Arc;

use crate::either::Either;
use crate::exit::{Cause, Exit};
use crate::runtime::Fiber;

use super::primitive::{boxed, unbox, unerase_cause, Env, ExitKind, Instruction, Primitive};
use super::Effect;

impl<A, E, R> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Transform the success value.
    pub fn map<B, F>(self, f: F) -> Effect<B, E, R>
    where
        B: Send + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::Map(
                self.instruction(),
                Box::new(move |value| boxed(f(unbox::<A>(value)))),
            )
        })
    }

    /// Run the effect produced by `f` from the success value.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// let effect = Effect::<i32, String>::succeed(20).flat_map(|x| Effect::succeed(x + 1));
    /// assert_eq!(Runtime::default().run_sync(&effect), Either::right(21));
    /// ```
    pub fn flat_map<B, F>(self, f: F) -> Effect<B, E, R>
    where
        B: Send + 'static,
        F: Fn(A) -> Effect<B, E, R> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::FlatMap(
                self.instruction(),
                Box::new(move |value| f(unbox::<A>(value)).instruction()),
            )
        })
    }

    /// Alias for [`flat_map`](Effect::flat_map).
    pub fn and_then<B, F>(self, f: F) -> Effect<B, E, R>
    where
        B: Send + 'static,
        F: Fn(A) -> Effect<B, E, R> + Send + Sync + 'static,
    {
        self.flat_map(f)
    }

    /// Run the effect produced by `f` for its side effects, keeping the
    /// original value. A failure of that effect fails the whole.
    pub fn tap<B, F>(self, f: F) -> Effect<A, E, R>
    where
        B: Send + 'static,
        F: Fn(&A) -> Effect<B, E, R> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::FlatMap(
                self.instruction(),
                Box::new(move |value| {
                    let value = unbox::<A>(value);
                    f(&value)
                        .instruction()
                        .map(move |_| boxed(value))
                }),
            )
        })
    }

    /// Transform the expected failure. Defects and interruptions pass through.
    pub fn map_err<E2, F>(self, f: F) -> Effect<A, E2, R>
    where
        E2: Send + 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::Fold {
                effect: self.instruction(),
                on_failure: Box::new(move |cause| {
                    Err(cause.map(|error| boxed(f(unbox::<E>(error)))))
                }),
                on_success: None,
            }
        })
    }

    /// Replace the success value.
    pub fn as_<B>(self, value: B) -> Effect<B, E, R>
    where
        B: Clone + Send + Sync + 'static,
    {
        self.map(move |_| value.clone())
    }

    /// Discard the success value.
    pub fn unit(self) -> Effect<(), E, R> {
        self.map(|_| ())
    }

    /// Run `self` then `other`, pairing their values.
    pub fn zip<B>(self, other: Effect<B, E, R>) -> Effect<(A, B), E, R>
    where
        B: Send + 'static,
    {
        self.zip_with(other, |a, b| (a, b))
    }

    /// Run `self` then `other`, combining their values with `f`.
    pub fn zip_with<B, C, F>(self, other: Effect<B, E, R>, f: F) -> Effect<C, E, R>
    where
        B: Send + 'static,
        C: Send + 'static,
        F: Fn(A, B) -> C + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            let other = other.clone();
            Primitive::FlatMap(
                self.instruction(),
                Box::new(move |a| {
                    other
                        .instruction()
                        .map(move |b| boxed(f(unbox::<A>(a), unbox::<B>(b))))
                }),
            )
        })
    }

    /// Run `self` then `other`, keeping the value of `other`.
    pub fn zip_right<B>(self, other: Effect<B, E, R>) -> Effect<B, E, R>
    where
        B: Send + 'static,
    {
        Effect::from_node(move || {
            let other = other.clone();
            Primitive::FlatMap(self.instruction(), Box::new(move |_| other.instruction()))
        })
    }

    /// Run `self` then `other`, keeping the value of `self`.
    pub fn zip_left<B>(self, other: Effect<B, E, R>) -> Effect<A, E, R>
    where
        B: Send + 'static,
    {
        Effect::from_node(move || {
            let other = other.clone();
            Primitive::FlatMap(
                self.instruction(),
                Box::new(move |a| other.instruction().map(move |_| a)),
            )
        })
    }

    /// Recover from an expected failure.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// let effect = Effect::<i32, String>::fail("missing".to_string())
    ///     .catch_all(|e| Effect::<i32, String>::succeed(e.len() as i32));
    /// assert_eq!(Runtime::default().run_sync(&effect), Either::right(7));
    /// ```
    pub fn catch_all<E2, F>(self, f: F) -> Effect<A, E2, R>
    where
        E2: Send + 'static,
        F: Fn(E) -> Effect<A, E2, R> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::Fold {
                effect: self.instruction(),
                on_failure: Box::new(move |cause| match cause {
                    Cause::Fail(error) => Ok(f(unbox::<E>(error)).instruction()),
                    other => Err(other),
                }),
                on_success: None,
            }
        })
    }

    /// Recover from an expected failure or a defect. Interruptions are never
    /// handed to `f`.
    pub fn catch_all_cause<E2, F>(self, f: F) -> Effect<A, E2, R>
    where
        E2: Send + 'static,
        F: Fn(Cause<E>) -> Effect<A, E2, R> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::Fold {
                effect: self.instruction(),
                on_failure: Box::new(move |cause| {
                    if cause.is_interrupted() {
                        Err(cause)
                    } else {
                        Ok(f(unerase_cause::<E>(cause)).instruction())
                    }
                }),
                on_success: None,
            }
        })
    }

    /// Succeed with `fallback` if the effect fails.
    pub fn or_else_succeed<E2>(self, fallback: A) -> Effect<A, E2, R>
    where
        A: Clone + Sync,
        E2: Send + 'static,
    {
        self.catch_all(move |_| Effect::succeed(fallback.clone()))
    }

    /// Handle both outcomes, producing a value. Defects and interruptions
    /// still propagate.
    pub fn fold<B, F, G>(self, on_failure: F, on_success: G) -> Effect<B, Infallible, R>
    where
        B: Send + 'static,
        F: Fn(E) -> B + Send + Sync + 'static,
        G: Fn(A) -> B + Send + Sync + 'static,
    {
        let on_failure = Arc::new(on_failure);
        let on_success = Arc::new(on_success);
        Effect::from_node(move || {
            let on_failure = on_failure.clone();
            let on_success = on_success.clone();
            Primitive::Fold {
                effect: self.instruction(),
                on_failure: Box::new(move |cause| match cause {
                    Cause::Fail(error) => {
                        Ok(Instruction::value(boxed(on_failure(unbox::<E>(error)))))
                    }
                    other => Err(other),
                }),
                on_success: Some(Box::new(move |value| {
                    Instruction::value(boxed(on_success(unbox::<A>(value))))
                })),
            }
        })
    }

    /// Expose the expected failure as a value.
    pub fn either(self) -> Effect<Either<E, A>, Infallible, R> {
        self.fold(Either::Left, Either::Right)
    }

    /// Expose the outcome, including defects, as a value.
    ///
    /// Interruption of the running fiber still propagates.
    pub fn exit(self) -> Effect<Exit<A, E>, Infallible, R> {
        Effect::from_node(move || Primitive::Fold {
            effect: self.instruction(),
            on_failure: Box::new(|cause| {
                if cause.is_interrupted() {
                    Err(cause)
                } else {
                    Ok(Instruction::value(boxed(Exit::<A, E>::Failure(
                        unerase_cause(cause),
                    ))))
                }
            }),
            on_success: Some(Box::new(|value| {
                Instruction::value(boxed(Exit::<A, E>::Success(unbox(value))))
            })),
        })
    }

    /// Run `finalizer` after the effect, however it ends: success, failure,
    /// defect or interruption. The finalizer runs exactly once and cannot be
    /// interrupted.
    pub fn ensuring<X>(self, finalizer: Effect<X, Infallible, R>) -> Effect<A, E, R>
    where
        X: Send + 'static,
    {
        Effect::from_node(move || {
            let finalizer = finalizer.clone();
            Primitive::Ensuring(self.instruction(), Box::new(move |_| finalizer.instruction()))
        })
    }

    /// Run `cleanup` only if the effect is interrupted.
    pub fn on_interrupt<X>(self, cleanup: Effect<X, Infallible, R>) -> Effect<A, E, R>
    where
        X: Send + 'static,
    {
        Effect::from_node(move || {
            let cleanup = cleanup.clone();
            Primitive::Ensuring(
                self.instruction(),
                Box::new(move |kind| match kind {
                    ExitKind::Interrupt => cleanup.instruction(),
                    _ => Instruction::unit(),
                }),
            )
        })
    }

    /// Run the effect with interruption deferred until it completes.
    pub fn uninterruptible(self) -> Effect<A, E, R> {
        Effect::from_node(move || Primitive::Uninterruptible(self.instruction()))
    }

    /// Start the effect on a new fiber and return a handle immediately.
    ///
    /// The child inherits the parent's log level, loggers, spans,
    /// annotations and environment. When the parent finishes, children that
    /// are still running are interrupted.
    pub fn fork(self) -> Effect<Fiber<A, E>, E, R> {
        Effect::from_node(move || {
            Primitive::Map(
                Instruction::build(Primitive::Fork(self.instruction())),
                Box::new(|shared| {
                    boxed(Fiber::<A, E>::new(unbox::<Arc<crate::runtime::FiberShared>>(
                        shared,
                    )))
                }),
            )
        })
    }

    /// Supply the environment, producing an effect that needs a different
    /// one (usually `()`).
    pub fn provide<R2>(self, env: R) -> Effect<A, E, R2>
    where
        R2: Send + Sync + 'static,
    {
        let env: Env = Arc::new(env);
        Effect::from_node(move || Primitive::Provide(env.clone(), self.instruction()))
    }
}

impl<E, R> Effect<bool, E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Run `on_true` or `on_false` depending on the value.
    pub fn if_effect<A>(
        self,
        on_true: Effect<A, E, R>,
        on_false: Effect<A, E, R>,
    ) -> Effect<A, E, R>
    where
        A: Send + 'static,
    {
        Effect::from_node(move || {
            let on_true = on_true.clone();
            let on_false = on_false.clone();
            Primitive::FlatMap(
                self.instruction(),
                Box::new(move |flag| {
                    if unbox::<bool>(flag) {
                        on_true.instruction()
                    } else {
                        on_false.instruction()
                    }
                }),
            )
        })
    }
}
