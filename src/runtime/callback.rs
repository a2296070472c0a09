//! Callback-based suspension: the `Resume` handle given to `async_callback`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;

use futures::task::AtomicWaker;
use parking_lot::Mutex;

use crate::effect::primitive::{boxed, erase_cause, ErasedCause, Value};
use crate::exit::{Cause, Defect};

/// Cleanup run when a fiber is interrupted while suspended on a callback.
pub type Canceler = Box<dyn FnOnce() + Send>;

/// The rendezvous between a registered callback and the suspended fiber.
pub(crate) struct ResumeSlot {
    outcome: Mutex<Option<Result<Value, ErasedCause>>>,
    completed: AtomicBool,
    cancelled: AtomicBool,
    waker: AtomicWaker,
}

impl ResumeSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(ResumeSlot {
            outcome: Mutex::new(None),
            completed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            waker: AtomicWaker::new(),
        })
    }

    /// Store the outcome and wake the fiber. Only the first completion
    /// counts; completing a cancelled slot is a no-op.
    pub(crate) fn complete(&self, outcome: Result<Value, ErasedCause>) -> bool {
        if self.completed.swap(true, Ordering::AcqRel) {
            tracing::warn!("effect callback resumed more than once; ignoring the extra result");
            return false;
        }
        if self.cancelled.load(Ordering::Acquire) {
            return false;
        }
        *self.outcome.lock() = Some(outcome);
        self.waker.wake();
        true
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub(crate) fn register(&self, waker: &Waker) {
        self.waker.register(waker);
    }

    pub(crate) fn take(&self) -> Option<Result<Value, ErasedCause>> {
        self.outcome.lock().take()
    }
}

/// Completes an [`Effect::async_callback`](crate::Effect::async_callback).
///
/// A `Resume` may be cloned and moved to any thread. The first completion
/// resumes the fiber; any later one is ignored and reported through
/// `tracing` at `WARN`.
pub struct Resume<A, E> {
    slot: Arc<ResumeSlot>,
    _marker: PhantomData<fn(A, E)>,
}

impl<A, E> Resume<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(slot: Arc<ResumeSlot>) -> Self {
        Resume {
            slot,
            _marker: PhantomData,
        }
    }

    /// Resume with a success value.
    pub fn succeed(&self, value: A) {
        self.slot.complete(Ok(boxed(value)));
    }

    /// Resume with an expected failure.
    pub fn fail(&self, error: E) {
        self.slot.complete(Err(Cause::Fail(boxed(error))));
    }

    /// Resume with a defect.
    pub fn die(&self, message: impl Into<String>) {
        self.slot.complete(Err(Cause::Die(Defect::new(message))));
    }

    /// Resume from a `Result`.
    pub fn complete(&self, result: Result<A, E>) {
        match result {
            Ok(value) => self.succeed(value),
            Err(error) => self.fail(error),
        }
    }

    /// Resume with a full cause.
    pub fn complete_cause(&self, cause: Cause<E>) {
        self.slot.complete(Err(erase_cause(cause)));
    }

    /// Returns `true` once any completion was attempted.
    pub fn is_completed(&self) -> bool {
        self.slot.is_completed()
    }
}

impl<A, E> Clone for Resume<A, E> {
    fn clone(&self) -> Self {
        Resume {
            slot: self.slot.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A, E> fmt::Debug for Resume<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resume")
            .field("completed", &self.slot.is_completed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::primitive::unbox;

    #[test]
    fn test_first_completion_wins() {
        let slot = ResumeSlot::new();
        let resume: Resume<i32, String> = Resume::new(slot.clone());
        resume.succeed(1);
        resume.succeed(2);

        match slot.take() {
            Some(Ok(value)) => assert_eq!(unbox::<i32>(value), 1),
            _ => panic!("expected the first value"),
        }
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_cancelled_slot_drops_completion() {
        let slot = ResumeSlot::new();
        slot.cancel();
        let resume: Resume<i32, String> = Resume::new(slot.clone());
        resume.fail("late".to_string());
        assert!(slot.take().is_none());
        assert!(resume.is_completed());
    }
}
