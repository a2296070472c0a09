//! Constructors for effects.
//!
//! Every constructor is available as an associated function on
//! [`Effect`]; the most common ones also exist as free functions for use
//! with the prelude.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::duration::Duration;
use crate::either::Either;
use crate::exit::{Cause, Defect};
use crate::runtime::{Canceler, FiberId, Resume, ResumeSlot};

use super::primitive::{boxed, unbox, Env, Instruction, Primitive, Value};
use super::Effect;

pub(crate) fn env_ref<R: 'static>(env: &Env) -> &R {
    env.downcast_ref::<R>()
        .expect("effect environment type mismatch")
}

impl<A, E, R> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// An effect that succeeds with `value`.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// let effect = Effect::<i32, String>::succeed(42);
    /// assert_eq!(Runtime::default().run_sync(&effect), Either::right(42));
    /// ```
    pub fn succeed(value: A) -> Self
    where
        A: Clone + Sync,
    {
        Effect::from_node(move || Primitive::Succeed(boxed(value.clone())))
    }

    /// An effect that fails with the expected error `error`.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// let effect = Effect::<i32, String>::fail("boom".to_string());
    /// assert_eq!(Runtime::default().run_sync(&effect), Either::left("boom".to_string()));
    /// ```
    pub fn fail(error: E) -> Self
    where
        E: Clone + Sync,
    {
        Effect::from_node(move || Primitive::Fail(Cause::Fail(boxed(error.clone()))))
    }

    /// An effect that dies with a defect.
    pub fn die(message: impl Into<String>) -> Self {
        let defect = Defect::new(message);
        Effect::from_node(move || Primitive::Fail(Cause::Die(defect.clone())))
    }

    /// An effect that never completes. It can only be interrupted.
    pub fn never() -> Self {
        Effect::from_node(|| Primitive::Async(Box::new(|_: &Env, _: Arc<ResumeSlot>| None)))
    }

    /// Defer a computation that cannot fail. A panic in `f` is a defect.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::Sync(Box::new(move |_: &Env| Ok(boxed(f()))))
        })
    }

    /// Defer a computation that may fail with `E`.
    pub fn try_sync<F>(f: F) -> Self
    where
        F: Fn() -> Result<A, E> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::Sync(Box::new(move |_: &Env| f().map(boxed).map_err(boxed)))
        })
    }

    /// Defer a fallible computation, converting its error with `on_error`.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// let parse = Effect::try_catch(|| "12x".parse::<i32>(), |e| e.to_string());
    /// assert!(Runtime::default().run_sync(&parse).is_left());
    /// ```
    pub fn try_catch<X, F, H>(f: F, on_error: H) -> Self
    where
        F: Fn() -> Result<A, X> + Send + Sync + 'static,
        H: Fn(X) -> E + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let on_error = Arc::new(on_error);
        Effect::from_node(move || {
            let f = f.clone();
            let on_error = on_error.clone();
            Primitive::Sync(Box::new(move |_: &Env| match f() {
                Ok(value) => Ok(boxed(value)),
                Err(error) => Err(boxed(on_error(error))),
            }))
        })
    }

    /// Build the effect to run each time this one runs.
    ///
    /// Useful for recursive definitions and for effects that depend on state
    /// read at execution time.
    pub fn suspend<F>(f: F) -> Self
    where
        F: Fn() -> Effect<A, E, R> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::FlatMap(Instruction::unit(), Box::new(move |_| f().instruction()))
        })
    }

    /// Adapt a future that does not fail. A panic while polling is a defect.
    pub fn promise<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = A> + Send + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::Future(Box::new(move |_: &Env| {
                let future = f();
                async move { Ok::<Value, Value>(boxed(future.await)) }.boxed()
            }))
        })
    }

    /// Adapt a future resolving to a `Result`; `Err` becomes an expected failure.
    pub fn try_promise<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, E>> + Send + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::Future(Box::new(move |_: &Env| {
                let future = f();
                async move { future.await.map(boxed).map_err(boxed) }.boxed()
            }))
        })
    }

    /// Adapt a fallible future, converting its rejection with `on_reject`.
    pub fn try_promise_with<X, F, Fut, H>(f: F, on_reject: H) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, X>> + Send + 'static,
        H: Fn(X) -> E + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let on_reject = Arc::new(on_reject);
        Effect::from_node(move || {
            let f = f.clone();
            let on_reject = on_reject.clone();
            Primitive::Future(Box::new(move |_: &Env| {
                let future = f();
                async move {
                    match future.await {
                        Ok(value) => Ok(boxed(value)),
                        Err(error) => Err(boxed(on_reject(error))),
                    }
                }
                .boxed()
            }))
        })
    }

    /// Suspend on a callback.
    ///
    /// When the fiber reaches this effect, `register` is called once with a
    /// [`Resume`] handle. The fiber continues when the handle is completed;
    /// if `register` completes it before returning, the fiber never
    /// suspends. The returned [`Canceler`], if any, runs when the fiber is
    /// interrupted while waiting.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// let effect = Effect::<i32, String>::async_callback(|resume| {
    ///     resume.succeed(7);
    ///     None
    /// });
    /// assert_eq!(Runtime::default().run_sync(&effect), Either::right(7));
    /// ```
    pub fn async_callback<F>(register: F) -> Self
    where
        F: Fn(Resume<A, E>) -> Option<Canceler> + Send + Sync + 'static,
    {
        let register = Arc::new(register);
        Effect::from_node(move || {
            let register = register.clone();
            Primitive::Async(Box::new(move |_: &Env, slot: Arc<ResumeSlot>| {
                register(Resume::new(slot))
            }))
        })
    }

    /// Lift a `Result`.
    pub fn from_result(result: Result<A, E>) -> Self
    where
        A: Clone + Sync,
        E: Clone + Sync,
    {
        match result {
            Ok(value) => Effect::succeed(value),
            Err(error) => Effect::fail(error),
        }
    }

    /// Lift an `Either`: `Left` fails, `Right` succeeds.
    pub fn from_either(either: Either<E, A>) -> Self
    where
        A: Clone + Sync,
        E: Clone + Sync,
    {
        match either {
            Either::Left(error) => Effect::fail(error),
            Either::Right(value) => Effect::succeed(value),
        }
    }

    /// Lift an `Option`, failing with `on_none()` when it is `None`.
    pub fn from_option<F>(option: Option<A>, on_none: F) -> Self
    where
        A: Clone + Sync,
        F: Fn() -> E + Send + Sync + 'static,
    {
        match option {
            Some(value) => Effect::succeed(value),
            None => Effect::try_sync(move || Err(on_none())),
        }
    }

    /// Read a value from the environment.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// struct Config {
    ///     port: u16,
    /// }
    ///
    /// let port = Effect::<u16, String, Config>::access(|config| config.port);
    /// let program = port.provide(Config { port: 8080 });
    /// assert_eq!(Runtime::default().run_sync(&program), Either::right(8080));
    /// ```
    pub fn access<F>(f: F) -> Self
    where
        F: Fn(&R) -> A + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::Sync(Box::new(move |env: &Env| Ok(boxed(f(env_ref::<R>(env))))))
        })
    }

    /// Build an effect from the environment, then run it.
    pub fn access_effect<F>(f: F) -> Self
    where
        F: Fn(&R) -> Effect<A, E, R> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Effect::from_node(move || {
            let f = f.clone();
            Primitive::FlatMap(
                Instruction::build(Primitive::Sync(Box::new(move |env: &Env| {
                    Ok(boxed(f(env_ref::<R>(env))))
                }))),
                Box::new(|effect| unbox::<Effect<A, E, R>>(effect).instruction()),
            )
        })
    }

    /// Interrupt the running fiber.
    pub fn interrupt() -> Self {
        Effect::from_node(|| Primitive::Interrupt)
    }
}

impl<E, R> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Suspend the fiber for `duration`, using the runtime's clock.
    ///
    /// `Duration::ZERO` completes immediately.
    pub fn sleep(duration: Duration) -> Self {
        Effect::from_node(move || Primitive::Sleep(duration))
    }

    /// Let other fibers run before continuing.
    pub fn yield_now() -> Self {
        Effect::from_node(|| Primitive::Yield)
    }
}

impl<E, R> Effect<FiberId, E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// The id of the fiber running the effect.
    pub fn fiber_id() -> Self {
        Effect::from_node(|| {
            Primitive::Descriptor(Box::new(|id| Instruction::value(boxed(id))))
        })
    }
}

/// See [`Effect::succeed`].
pub fn succeed<A, E, R>(value: A) -> Effect<A, E, R>
where
    A: Clone + Send + Sync + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    Effect::succeed(value)
}

/// See [`Effect::fail`].
pub fn fail<A, E, R>(error: E) -> Effect<A, E, R>
where
    A: Send + 'static,
    E: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    Effect::fail(error)
}

/// See [`Effect::die`].
pub fn die<A, E, R>(message: impl Into<String>) -> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    Effect::die(message)
}

/// An effect that succeeds with `()`.
pub fn unit<E, R>() -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    Effect::succeed(())
}

/// See [`Effect::never`].
pub fn never<A, E, R>() -> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    Effect::never()
}

/// See [`Effect::sync`].
pub fn sync<A, E, R, F>(f: F) -> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
    F: Fn() -> A + Send + Sync + 'static,
{
    Effect::sync(f)
}

/// See [`Effect::sleep`].
pub fn sleep<E, R>(duration: Duration) -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    Effect::sleep(duration)
}

/// See [`Effect::yield_now`].
pub fn yield_now<E, R>() -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    Effect::yield_now()
}

/// See [`Effect::fiber_id`].
pub fn fiber_id<E, R>() -> Effect<FiberId, E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    Effect::fiber_id()
}

/// See [`Effect::interrupt`].
pub fn interrupt<A, E, R>() -> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    Effect::interrupt()
}
