//! The timer boundary between fibers and the host.

use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt};

use crate::duration::Duration;

/// Source of wall-clock time and timers for a runtime.
///
/// `sleep` futures are polled by the fiber that slept and must wake it
/// through the task context when they complete.
pub trait Clock: Send + Sync {
    /// The current time, used for log timestamps and span timings.
    fn now(&self) -> DateTime<Utc>;

    /// A future completing after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// The system clock. Timers need a tokio runtime; without one, sleeping
/// never completes, which a synchronous run reports as a suspension.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        if duration.is_infinite() {
            return future::pending().boxed();
        }
        match tokio::runtime::Handle::try_current() {
            Ok(_) => tokio::time::sleep(duration.to_std()).boxed(),
            Err(_) => future::pending().boxed(),
        }
    }
}

impl fmt::Debug for SystemClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SystemClock")
    }
}
