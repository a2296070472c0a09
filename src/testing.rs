//! Testing utilities for code built on effects.
//!
//! - [`CapturingLogger`] records every log entry for later inspection.
//! - [`TestClock`] is a manual clock: sleeping fibers wake only when the
//!   test moves time forward with [`TestClock::adjust`].
//! - `assert_succeeds!`, `assert_fails!`, `assert_dies!` and
//!   `assert_interrupted!` check [`Exit`](crate::Exit) values.
//! - With the `proptest` feature, [`Either`](crate::Either) and
//!   [`Duration`](crate::Duration) implement `Arbitrary`.
//!
//! # Examples
//!
//! ```rust
//! use eddy::testing::CapturingLogger;
//! use eddy::logger::{LoggerPatch, LoggerSet};
//! use eddy::{assert_fails, log_warning, Effect, Runtime};
//! use std::sync::Arc;
//!
//! let capture = Arc::new(CapturingLogger::new());
//! let runtime = Runtime::builder()
//!     .logger_patch(LoggerPatch::replace(&LoggerSet::default_logger(), capture.clone()))
//!     .build();
//!
//! let effect = log_warning("giving up")
//!     .zip_right(Effect::<(), String>::fail("no route".to_string()));
//!
//! assert_fails!(runtime.run_sync_exit(&effect), "no route".to_string());
//! assert_eq!(capture.messages(), vec!["giving up"]);
//! ```

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;

use crate::duration::Duration;
use crate::logger::{LogEntry, Logger};
use crate::runtime::Clock;

/// A logger that keeps every entry it receives.
#[derive(Default)]
pub struct CapturingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl CapturingLogger {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the captured entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// The captured messages, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.message().to_string())
            .collect()
    }

    /// Forget everything captured so far.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Logger for CapturingLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().push(entry.clone());
    }
}

impl fmt::Debug for CapturingLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturingLogger")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

struct Sleeper {
    deadline: DateTime<Utc>,
    wake: oneshot::Sender<()>,
}

struct TestClockState {
    now: DateTime<Utc>,
    sleepers: Vec<Sleeper>,
}

/// A clock that only moves when told to.
///
/// ```rust
/// use eddy::testing::TestClock;
/// use eddy::runtime::Clock;
/// use eddy::Duration;
///
/// let clock = TestClock::new();
/// let start = clock.now();
/// clock.adjust(Duration::minutes(1));
/// assert_eq!((clock.now() - start).num_seconds(), 60);
/// ```
pub struct TestClock {
    state: Mutex<TestClockState>,
}

impl TestClock {
    /// A clock starting at the Unix epoch.
    pub fn new() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// A clock starting at `now`.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        TestClock {
            state: Mutex::new(TestClockState {
                now,
                sleepers: Vec::new(),
            }),
        }
    }

    /// Move time forward by `duration` and wake every sleeper whose
    /// deadline has passed.
    pub fn adjust(&self, duration: Duration) {
        let due = {
            let mut state = self.state.lock();
            state.now = advance(state.now, duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
            let now = state.now;
            let (due, pending): (Vec<_>, Vec<_>) = state
                .sleepers
                .drain(..)
                .partition(|sleeper| sleeper.deadline <= now);
            state.sleepers = pending;
            due
        };
        for sleeper in due {
            // the sleeping fiber may have been interrupted already
            let _ = sleeper.wake.send(());
        }
    }

    /// Number of sleeps still waiting for time to pass.
    pub fn sleepers(&self) -> usize {
        self.state.lock().sleepers.len()
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        if duration.is_zero() {
            return future::ready(()).boxed();
        }
        let mut state = self.state.lock();
        let Some(deadline) = advance(state.now, duration) else {
            return future::pending().boxed();
        };
        let (wake, woken) = oneshot::channel();
        state.sleepers.push(Sleeper { deadline, wake });
        async move {
            if woken.await.is_err() {
                // clock dropped: nobody can move time any more
                future::pending::<()>().await;
            }
        }
        .boxed()
    }
}

impl fmt::Debug for TestClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TestClock")
            .field("now", &state.now)
            .field("sleepers", &state.sleepers.len())
            .finish()
    }
}

fn advance(now: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    let millis = i64::try_from(duration.to_millis()).ok()?;
    now.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

/// Assert that an [`Exit`](crate::Exit) is a success, optionally with a
/// given value.
///
/// ```rust
/// use eddy::{assert_succeeds, Exit};
///
/// assert_succeeds!(Exit::<i32, String>::succeed(42));
/// assert_succeeds!(Exit::<i32, String>::succeed(42), 42);
/// ```
#[macro_export]
macro_rules! assert_succeeds {
    ($exit:expr) => {
        match $exit {
            $crate::Exit::Success(_) => {}
            $crate::Exit::Failure(cause) => {
                panic!("Expected Success, got Failure: {:?}", cause);
            }
        }
    };
    ($exit:expr, $expected:expr) => {
        match $exit {
            $crate::Exit::Success(value) => assert_eq!(value, $expected),
            $crate::Exit::Failure(cause) => {
                panic!("Expected Success, got Failure: {:?}", cause);
            }
        }
    };
}

/// Assert that an [`Exit`](crate::Exit) is an expected failure, optionally
/// with a given error.
///
/// ```rust
/// use eddy::{assert_fails, Exit};
///
/// assert_fails!(Exit::<i32, &str>::fail("nope"), "nope");
/// ```
#[macro_export]
macro_rules! assert_fails {
    ($exit:expr) => {
        match $exit {
            $crate::Exit::Failure($crate::Cause::Fail(_)) => {}
            other => panic!("Expected Fail, got {:?}", other),
        }
    };
    ($exit:expr, $expected:expr) => {
        match $exit {
            $crate::Exit::Failure($crate::Cause::Fail(error)) => assert_eq!(error, $expected),
            other => panic!("Expected Fail, got {:?}", other),
        }
    };
}

/// Assert that an [`Exit`](crate::Exit) is a defect, optionally whose
/// message contains a given text.
///
/// ```rust
/// use eddy::{assert_dies, Defect, Exit};
///
/// assert_dies!(Exit::<i32, String>::die(Defect::new("index out of bounds")), "out of bounds");
/// ```
#[macro_export]
macro_rules! assert_dies {
    ($exit:expr) => {
        match $exit {
            $crate::Exit::Failure($crate::Cause::Die(_)) => {}
            other => panic!("Expected Die, got {:?}", other),
        }
    };
    ($exit:expr, $needle:expr) => {
        match $exit {
            $crate::Exit::Failure($crate::Cause::Die(defect)) => assert!(
                defect.message().contains($needle),
                "defect {:?} does not mention {:?}",
                defect.message(),
                $needle
            ),
            other => panic!("Expected Die, got {:?}", other),
        }
    };
}

/// Assert that an [`Exit`](crate::Exit) is an interruption.
#[macro_export]
macro_rules! assert_interrupted {
    ($exit:expr) => {
        match $exit {
            $crate::Exit::Failure($crate::Cause::Interrupt(_)) => {}
            other => panic!("Expected Interrupt, got {:?}", other),
        }
    };
}

#[cfg(feature = "proptest")]
mod arbitrary {
    use proptest::prelude::*;

    use crate::duration::Duration;
    use crate::either::Either;

    impl<L, R> Arbitrary for Either<L, R>
    where
        L: Arbitrary + 'static,
        R: Arbitrary + 'static,
    {
        type Parameters = (L::Parameters, R::Parameters);
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(args: Self::Parameters) -> Self::Strategy {
            let (l_params, r_params) = args;
            prop_oneof![
                any_with::<L>(l_params).prop_map(Either::Left),
                any_with::<R>(r_params).prop_map(Either::Right),
            ]
            .boxed()
        }
    }

    impl Arbitrary for Duration {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
            prop_oneof![
                8 => (0u64..=Duration::days(365).to_millis()).prop_map(Duration::millis),
                1 => Just(Duration::ZERO),
                1 => Just(Duration::INFINITY),
            ]
            .boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use crate::exit::{Defect, Exit};
    use crate::logger::{LogLevel, LoggerPatch, LoggerSet};
    use crate::runtime::{FiberId, Runtime};
    use std::sync::Arc;

    #[test]
    fn test_capturing_logger_records_and_clears() {
        let capture = CapturingLogger::new();
        let entry = LogEntry::new(
            Utc::now(),
            LogLevel::Info,
            FiberId::new(1),
            "hello",
            vec![],
            vec![],
        );
        capture.log(&entry);
        assert_eq!(capture.messages(), vec!["hello"]);
        assert_eq!(capture.entries()[0].level(), LogLevel::Info);

        capture.clear();
        assert!(capture.entries().is_empty());
    }

    #[test]
    fn test_capturing_logger_as_runtime_logger() {
        let capture = Arc::new(CapturingLogger::new());
        let runtime = Runtime::builder()
            .logger_patch(LoggerPatch::replace(
                &LoggerSet::default_logger(),
                capture.clone(),
            ))
            .build();

        runtime.run_sync(&crate::log_error::<String, ()>("bad"));
        assert_eq!(capture.messages(), vec!["bad"]);
    }

    #[test]
    fn test_assertion_macros_accept_matching_exits() {
        assert_succeeds!(Exit::<i32, String>::succeed(1), 1);
        assert_fails!(Exit::<i32, &str>::fail("e"), "e");
        assert_dies!(Exit::<i32, String>::die(Defect::new("kaput")), "kaput");
        assert_interrupted!(Exit::<i32, String>::Failure(crate::Cause::Interrupt(
            FiberId::none()
        )));
    }

    #[test]
    #[should_panic(expected = "Expected Success, got Failure")]
    fn test_assert_succeeds_panics_on_failure() {
        assert_succeeds!(Exit::<i32, &str>::fail("e"));
    }

    #[test]
    #[should_panic(expected = "Expected Fail")]
    fn test_assert_fails_panics_on_defect() {
        assert_fails!(Exit::<i32, &str>::die(Defect::new("x")));
    }

    #[test]
    fn test_clock_adjust_moves_now() {
        let clock = TestClock::new();
        assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH);
        clock.adjust(Duration::seconds(2));
        assert_eq!(clock.now().timestamp_millis(), 2_000);
    }

    #[tokio::test]
    async fn test_clock_adjust_wakes_sleeping_fiber() {
        let clock = Arc::new(TestClock::new());
        let runtime = Runtime::builder().clock(clock.clone()).build();
        let effect = Effect::<(), String>::sleep(Duration::seconds(10)).as_("woke");

        let mut exit = Box::pin(runtime.run_fork(&effect).await_exit());
        assert!(futures::poll!(exit.as_mut()).is_pending());
        assert_eq!(clock.sleepers(), 1);

        clock.adjust(Duration::seconds(5));
        assert!(futures::poll!(exit.as_mut()).is_pending());
        assert_eq!(clock.sleepers(), 1);

        clock.adjust(Duration::seconds(5));
        assert_eq!(exit.await, Exit::succeed("woke"));
        assert_eq!(clock.sleepers(), 0);
    }

    #[test]
    fn test_infinite_sleep_never_registers() {
        let clock = TestClock::new();
        drop(clock.sleep(Duration::INFINITY));
        assert_eq!(clock.sleepers(), 0);
    }
}
