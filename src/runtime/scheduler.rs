//! The run queue shared by every fiber of one top-level run.
//!
//! Fibers are cooperative: each one is wrapped in a [`FiberTask`] whose
//! waker re-enqueues it. The synchronous runner drains the queue until it is
//! empty. A [`RunFuture`](super::RunFuture) runs a bounded number of fibers
//! per poll so the host executor keeps its timers and other tasks moving,
//! and is woken whenever a fiber becomes runnable from another thread.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Waker};

use futures::task::{self, ArcWake, AtomicWaker};
use parking_lot::Mutex;

use super::interpreter::FiberRuntime;

/// Fiber steps a [`RunFuture`](super::RunFuture) takes per poll before
/// handing the thread back to the host executor.
pub(crate) const TASK_RUNS_PER_POLL: usize = 128;

pub(crate) struct Scheduler {
    queue: Mutex<VecDeque<Arc<FiberTask>>>,
    driver: AtomicWaker,
}

impl Scheduler {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Scheduler {
            queue: Mutex::new(VecDeque::new()),
            driver: AtomicWaker::new(),
        })
    }

    /// Queue a new fiber for its first step.
    pub(crate) fn spawn(self: &Arc<Self>, fiber: FiberRuntime) {
        let task = Arc::new(FiberTask {
            fiber: Mutex::new(None),
            queued: AtomicBool::new(false),
            scheduler: Arc::downgrade(self),
        });
        fiber.shared().set_waker(task::waker(task.clone()));
        tracing::trace!(fiber = %fiber.shared().id(), "fiber spawned");
        *task.fiber.lock() = Some(fiber);
        self.enqueue(task);
    }

    fn enqueue(&self, task: Arc<FiberTask>) {
        if task.queued.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.lock().push_back(task);
        self.driver.wake();
    }

    pub(crate) fn register_driver(&self, waker: &Waker) {
        self.driver.register(waker);
    }

    /// Run queued fibers until none is runnable.
    pub(crate) fn drain(&self) {
        while self.run_next() {}
    }

    /// Run at most `limit` queued fibers. Returns `true` if runnable work
    /// is left over.
    pub(crate) fn run_for(&self, limit: usize) -> bool {
        for _ in 0..limit {
            if !self.run_next() {
                return false;
            }
        }
        !self.queue.lock().is_empty()
    }

    fn run_next(&self) -> bool {
        let next = self.queue.lock().pop_front();
        match next {
            Some(task) => {
                task.run();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("queued", &self.queue.lock().len())
            .finish()
    }
}

pub(crate) struct FiberTask {
    fiber: Mutex<Option<FiberRuntime>>,
    queued: AtomicBool,
    scheduler: Weak<Scheduler>,
}

impl FiberTask {
    fn run(self: &Arc<Self>) {
        self.queued.store(false, Ordering::Release);
        let waker = task::waker_ref(self);
        let mut cx = Context::from_waker(&waker);
        let mut slot = self.fiber.lock();
        if let Some(fiber) = slot.as_mut() {
            if fiber.poll(&mut cx).is_ready() {
                *slot = None;
            }
        }
    }
}

impl ArcWake for FiberTask {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if let Some(scheduler) = arc_self.scheduler.upgrade() {
            scheduler.enqueue(arc_self.clone());
        }
    }
}
