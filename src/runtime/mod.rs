//! Running effects.
//!
//! A [`Runtime`] turns an [`Effect`] description into a result. Each
//! top-level run creates a scheduler shared by the root fiber and every
//! fiber forked beneath it; fibers are cooperative and interleave at
//! suspension points, yields and budget exhaustion.
//!
//! # Example
//!
//! ```rust
//! use eddy::{Effect, Either, Runtime};
//!
//! let runtime = Runtime::default();
//! let effect = Effect::<(i32, i32), String>::succeed((10, 2))
//!     .flat_map(|(a, b)| {
//!         if b == 0 {
//!             Effect::fail("division by zero".to_string())
//!         } else {
//!             Effect::succeed(a / b)
//!         }
//!     })
//!     .map(|x| x + 1);
//!
//! assert_eq!(runtime.run_sync(&effect), Either::right(6));
//! ```

mod callback;
mod clock;
mod fiber;
pub(crate) mod interpreter;
mod scheduler;

pub use callback::{Canceler, Resume};
pub use clock::{Clock, SystemClock};
pub use fiber::{Fiber, FiberId, FiberStatus};

pub(crate) use callback::ResumeSlot;
pub(crate) use fiber::FiberShared;

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::effect::primitive::Env;
use crate::effect::Effect;
use crate::either::Either;
use crate::exit::{Cause, Defect, Exit};
use crate::logger::{LogLevel, LoggerPatch, LoggerSet};

use fiber::{typed_exit, Observation, ALREADY_OBSERVED};
use interpreter::{FiberRefs, FiberRuntime};
use scheduler::{Scheduler, TASK_RUNS_PER_POLL};

/// Message of the defect reported when a synchronous run suspends.
pub const ASYNC_BOUNDARY: &str = "cannot run an effect with an asynchronous boundary synchronously";

/// Settings shared by every fiber of a runtime.
pub(crate) struct RuntimeConfig {
    pub(crate) min_log_level: LogLevel,
    pub(crate) loggers: LoggerSet,
    pub(crate) clock: Arc<dyn Clock>,
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("min_log_level", &self.min_log_level)
            .field("loggers", &self.loggers)
            .finish_non_exhaustive()
    }
}

/// Executes effects.
///
/// A runtime is cheap to clone; clones share configuration.
#[derive(Clone, Debug)]
pub struct Runtime {
    config: Arc<RuntimeConfig>,
}

impl Default for Runtime {
    /// Minimum level `Info`, the default text logger on stderr and the
    /// system clock.
    fn default() -> Self {
        Runtime::builder().build()
    }
}

impl Runtime {
    /// Start configuring a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// The minimum level fibers start with.
    pub fn min_log_level(&self) -> LogLevel {
        self.config.min_log_level
    }

    /// The loggers fibers start with.
    pub fn loggers(&self) -> &LoggerSet {
        &self.config.loggers
    }

    /// The runtime's clock.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.config.clock.clone()
    }

    fn start<A, E>(&self, effect: &Effect<A, E>) -> (Arc<Scheduler>, Arc<FiberShared>)
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        let scheduler = Scheduler::new();
        let shared = FiberShared::new(FiberId::next());
        let env: Env = Arc::new(());
        let fiber = FiberRuntime::new(
            shared.clone(),
            Arc::downgrade(&scheduler),
            self.config.clone(),
            FiberRefs::from_config(&self.config),
            env,
            effect.instruction(),
        );
        scheduler.spawn(fiber);
        (scheduler, shared)
    }

    /// Run an effect to completion on the calling thread.
    ///
    /// Returns `Right(value)` on success and `Left(error)` on an expected
    /// failure.
    ///
    /// # Panics
    ///
    /// Panics if the effect dies, is interrupted, or suspends on an
    /// asynchronous boundary (a callback, future or timer that does not
    /// complete synchronously). Use [`run_sync_exit`](Runtime::run_sync_exit)
    /// to get those outcomes as data.
    pub fn run_sync<A, E>(&self, effect: &Effect<A, E>) -> Either<E, A>
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        match self.run_sync_exit(effect) {
            Exit::Success(value) => Either::Right(value),
            Exit::Failure(Cause::Fail(error)) => Either::Left(error),
            Exit::Failure(Cause::Die(defect)) => panic!("effect died: {}", defect),
            Exit::Failure(Cause::Interrupt(by)) => panic!("fiber interrupted by {}", by),
        }
    }

    /// Run an effect to completion on the calling thread, returning its exit.
    ///
    /// If the root fiber suspends, it is interrupted (running its
    /// finalizers) and the run reports a defect with the
    /// [`ASYNC_BOUNDARY`] message.
    pub fn run_sync_exit<A, E>(&self, effect: &Effect<A, E>) -> Exit<A, E>
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        let (scheduler, root) = self.start(effect);
        scheduler.drain();
        if !root.is_done() {
            tracing::debug!(fiber = %root.id(), "synchronous run suspended; interrupting");
            root.request_interrupt(FiberId::none());
            scheduler.drain();
            let _ = root.take_exit();
            return Exit::die(Defect::new(ASYNC_BOUNDARY));
        }
        match root.take_exit() {
            Observation::Ready(outcome) => typed_exit(outcome),
            Observation::Pending | Observation::AlreadyObserved => {
                Exit::die(Defect::new(ALREADY_OBSERVED))
            }
        }
    }

    /// Run an effect, returning a future of its exit.
    ///
    /// The effect's fibers are driven by polling the returned future; timers
    /// from the [`SystemClock`] need the future to be polled inside a tokio
    /// runtime.
    pub fn run_exit<A, E>(&self, effect: &Effect<A, E>) -> RunFuture<A, E>
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        let (scheduler, root) = self.start(effect);
        RunFuture {
            scheduler,
            root,
            _marker: PhantomData,
        }
    }

    /// Run an effect, resolving to its value or its cause.
    ///
    /// ```rust
    /// use eddy::{Duration, Effect, Runtime};
    ///
    /// # tokio_test::block_on(async {
    /// let effect = Effect::<(), String>::sleep(Duration::millis(5)).as_(42);
    /// assert_eq!(Runtime::default().run_promise(&effect).await, Ok(42));
    /// # });
    /// ```
    pub async fn run_promise<A, E>(&self, effect: &Effect<A, E>) -> Result<A, Cause<E>>
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        self.run_exit(effect).await.into_result()
    }

    /// Start an effect and return a handle to its root fiber.
    ///
    /// Nothing runs until [`RuntimeFiber::await_exit`] is polled.
    pub fn run_fork<A, E>(&self, effect: &Effect<A, E>) -> RuntimeFiber<A, E>
    where
        A: Send + 'static,
        E: Send + 'static,
    {
        let (scheduler, root) = self.start(effect);
        RuntimeFiber {
            scheduler,
            root,
            _marker: PhantomData,
        }
    }
}

/// Configures a [`Runtime`].
///
/// # Example
///
/// ```rust
/// use eddy::logger::{LogLevel, LoggerSet};
/// use eddy::Runtime;
///
/// let runtime = Runtime::builder()
///     .min_log_level(LogLevel::Debug)
///     .loggers(LoggerSet::empty())
///     .build();
/// assert_eq!(runtime.min_log_level(), LogLevel::Debug);
/// assert!(runtime.loggers().is_empty());
/// ```
pub struct RuntimeBuilder {
    min_log_level: LogLevel,
    loggers: LoggerSet,
    clock: Arc<dyn Clock>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        RuntimeBuilder {
            min_log_level: LogLevel::default(),
            loggers: LoggerSet::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl RuntimeBuilder {
    /// Set the minimum level new fibers start with.
    pub fn min_log_level(mut self, level: LogLevel) -> Self {
        self.min_log_level = level;
        self
    }

    /// Apply a patch to the logger set configured so far.
    pub fn logger_patch(mut self, patch: LoggerPatch) -> Self {
        self.loggers = patch.apply(&self.loggers);
        self
    }

    /// Replace the logger set.
    pub fn loggers(mut self, loggers: LoggerSet) -> Self {
        self.loggers = loggers;
        self
    }

    /// Use a different clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the runtime.
    pub fn build(self) -> Runtime {
        Runtime {
            config: Arc::new(RuntimeConfig {
                min_log_level: self.min_log_level,
                loggers: self.loggers,
                clock: self.clock,
            }),
        }
    }
}

impl fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("min_log_level", &self.min_log_level)
            .field("loggers", &self.loggers)
            .finish_non_exhaustive()
    }
}

/// Future of a run's [`Exit`], returned by [`Runtime::run_exit`].
///
/// Polling the future drives the fibers of the run, a bounded number of
/// steps per poll; while fibers stay runnable the future wakes itself and
/// returns `Pending` so the host executor can run its timers and other
/// tasks. Dropping it before completion interrupts the root fiber.
pub struct RunFuture<A, E> {
    scheduler: Arc<Scheduler>,
    root: Arc<FiberShared>,
    _marker: PhantomData<fn() -> (A, E)>,
}

impl<A, E> Future for RunFuture<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    type Output = Exit<A, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.scheduler.register_driver(cx.waker());
        let more = this.scheduler.run_for(TASK_RUNS_PER_POLL);
        match this.root.take_exit() {
            Observation::Ready(outcome) => Poll::Ready(typed_exit(outcome)),
            Observation::Pending => {
                if more {
                    cx.waker().wake_by_ref();
                }
                Poll::Pending
            }
            Observation::AlreadyObserved => Poll::Ready(Exit::die(Defect::new(ALREADY_OBSERVED))),
        }
    }
}

impl<A, E> Drop for RunFuture<A, E> {
    fn drop(&mut self) {
        if !self.root.is_done() {
            self.root.request_interrupt(FiberId::none());
            self.scheduler.drain();
        }
    }
}

impl<A, E> fmt::Debug for RunFuture<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunFuture")
            .field("root", &self.root.id())
            .finish()
    }
}

/// Handle to the root fiber of a run started with [`Runtime::run_fork`].
pub struct RuntimeFiber<A, E> {
    scheduler: Arc<Scheduler>,
    root: Arc<FiberShared>,
    _marker: PhantomData<fn() -> (A, E)>,
}

impl<A, E> RuntimeFiber<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    /// The root fiber's id.
    pub fn id(&self) -> FiberId {
        self.root.id()
    }

    /// The root fiber's status.
    pub fn status(&self) -> FiberStatus {
        self.root.status()
    }

    /// Request interruption; it takes effect when the fiber is next driven.
    pub fn interrupt(&self) {
        self.root.request_interrupt(FiberId::none());
    }

    /// Drive the run and wait for the root fiber's exit.
    pub fn await_exit(self) -> RunFuture<A, E> {
        RunFuture {
            scheduler: self.scheduler,
            root: self.root,
            _marker: PhantomData,
        }
    }
}

impl<A, E> fmt::Debug for RuntimeFiber<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeFiber")
            .field("id", &self.root.id())
            .field("status", &self.root.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::primitive::{boxed, unbox};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_run_sync_success_and_failure() {
        let runtime = Runtime::default();
        assert_eq!(
            runtime.run_sync(&Effect::<i32, String>::succeed(1)),
            Either::right(1)
        );
        assert_eq!(
            runtime.run_sync(&Effect::<i32, String>::fail("e".to_string())),
            Either::left("e".to_string())
        );
    }

    #[test]
    fn test_run_sync_exit_reports_async_boundary() {
        let runtime = Runtime::default();
        let exit = runtime.run_sync_exit(&Effect::<i32, String>::never());
        assert_eq!(exit, Exit::die(Defect::new(ASYNC_BOUNDARY)));
    }

    #[test]
    #[should_panic(expected = "asynchronous boundary")]
    fn test_run_sync_panics_on_suspension() {
        Runtime::default().run_sync(&Effect::<(), String>::sleep(crate::Duration::seconds(1)));
    }

    #[test]
    fn test_deep_flat_map_chain_is_stack_safe() {
        let mut effect = Effect::<u64, String>::succeed(0);
        for _ in 0..100_000 {
            effect = effect.flat_map(|n| Effect::succeed(n + 1));
        }
        assert_eq!(Runtime::default().run_sync(&effect), Either::right(100_000));
    }

    #[test]
    fn test_long_fiber_resumes_after_budget_exhaustion() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let busy = Effect::<(), String>::for_each_discard(0..(OP_BUDGET_STEPS * 2), move |_| {
            let seen = seen.clone();
            Effect::sync(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        });
        let effect = busy.fork().flat_map(|fiber| fiber.join());
        assert_eq!(Runtime::default().run_sync(&effect), Either::right(()));
        assert_eq!(counter.load(Ordering::SeqCst), OP_BUDGET_STEPS * 2);
    }

    const OP_BUDGET_STEPS: usize = interpreter::OP_BUDGET;

    #[test]
    fn test_handles_are_send() {
        fn is_send<T: Send>() {}
        is_send::<RunFuture<i32, String>>();
        is_send::<RuntimeFiber<i32, String>>();
        is_send::<Runtime>();
        is_send::<Effect<i32, String>>();
    }

    #[test]
    fn test_erased_env_is_unit_at_root() {
        let env: Env = Arc::new(());
        assert!(env.downcast_ref::<()>().is_some());
        assert_eq!(unbox::<i32>(boxed(3)), 3);
    }

    #[tokio::test]
    async fn test_run_promise_resolves() {
        let runtime = Runtime::default();
        let result = runtime
            .run_promise(&Effect::<i32, String>::promise(|| async { 41 }).map(|x| x + 1))
            .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_run_fork_interrupt() {
        let runtime = Runtime::default();
        let fiber = runtime.run_fork(&Effect::<(), String>::never());
        fiber.interrupt();
        let exit = fiber.await_exit().await;
        assert_eq!(exit, Exit::Failure(Cause::Interrupt(FiberId::none())));
    }

    #[tokio::test]
    async fn test_busy_fiber_returns_control_to_the_host() {
        let forever = Effect::<u64, String>::iterate(0, |_| true, |n| {
            crate::effect::yield_now().as_(n + 1)
        });
        let runtime = Runtime::default();
        let mut exit = Box::pin(runtime.run_exit(&forever));
        assert!(futures::poll!(exit.as_mut()).is_pending());
    }

    #[tokio::test]
    async fn test_yielding_root_lets_sibling_timer_fire() {
        let woke = Arc::new(AtomicUsize::new(0));
        let (setter, reader) = (woke.clone(), woke.clone());
        let child = Effect::<(), String>::sleep(crate::Duration::millis(10))
            .zip_right(Effect::sync(move || {
                setter.store(1, Ordering::SeqCst);
            }));
        let spin = Effect::<u64, String>::iterate(
            0,
            move |_| reader.load(Ordering::SeqCst) == 0,
            |n| crate::effect::yield_now().as_(n + 1),
        );
        let program = child.fork().zip_right(spin);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(3),
            Runtime::default().run_exit(&program),
        )
        .await;
        match result {
            Ok(Exit::Success(spins)) => assert!(spins > 0),
            other => panic!("run did not finish: {:?}", other),
        }
        assert_eq!(woke.load(Ordering::SeqCst), 1);
    }
}
