//! Fiber identity, shared fiber state and fiber handles.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Waker;

use parking_lot::Mutex;

use crate::effect::primitive::{boxed, unbox, Env, ErasedCause, Instruction, Primitive, Value};
use crate::effect::Effect;
use crate::exit::{Cause, Defect, Exit};

use super::callback::{Canceler, ResumeSlot};

static NEXT_FIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a fiber, rendered `#n`.
///
/// `FiberId::none()` (`#0`) stands for "no fiber", e.g. an interruption
/// requested from outside the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiberId(u64);

impl FiberId {
    /// Wrap a raw id. Ids handed out by the runtime are never reused.
    pub const fn new(id: u64) -> Self {
        FiberId(id)
    }

    /// The id used for requests that do not come from a fiber.
    pub const fn none() -> Self {
        FiberId(0)
    }

    pub(crate) fn next() -> Self {
        FiberId(NEXT_FIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a fiber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiberStatus {
    /// Queued or executing.
    Running,
    /// Waiting on a callback, future, timer or another fiber.
    Suspended,
    /// Finished; its exit is available.
    Done,
}

type Observer = Box<dyn FnOnce() + Send>;

struct SharedState {
    status: FiberStatus,
    exit: Option<Result<Value, ErasedCause>>,
    observed: bool,
    observers: Vec<Observer>,
}

/// What a caller finds when it looks for a fiber's result.
pub(crate) enum Observation {
    Pending,
    Ready(Result<Value, ErasedCause>),
    AlreadyObserved,
}

/// The part of a fiber visible to other fibers and to the runtime.
pub(crate) struct FiberShared {
    id: FiberId,
    interrupt: Mutex<Option<FiberId>>,
    state: Mutex<SharedState>,
    waker: Mutex<Option<Waker>>,
}

impl FiberShared {
    pub(crate) fn new(id: FiberId) -> Arc<Self> {
        Arc::new(FiberShared {
            id,
            interrupt: Mutex::new(None),
            state: Mutex::new(SharedState {
                status: FiberStatus::Running,
                exit: None,
                observed: false,
                observers: Vec::new(),
            }),
            waker: Mutex::new(None),
        })
    }

    pub(crate) fn id(&self) -> FiberId {
        self.id
    }

    pub(crate) fn status(&self) -> FiberStatus {
        self.state.lock().status
    }

    pub(crate) fn set_status(&self, status: FiberStatus) {
        let mut state = self.state.lock();
        if state.status != FiberStatus::Done {
            state.status = status;
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.status() == FiberStatus::Done
    }

    pub(crate) fn set_waker(&self, waker: Waker) {
        *self.waker.lock() = Some(waker);
    }

    /// Record an interruption request and wake the fiber so it can
    /// acknowledge it. Only the first request is kept.
    pub(crate) fn request_interrupt(&self, by: FiberId) {
        {
            let mut request = self.interrupt.lock();
            if request.is_none() {
                *request = Some(by);
            }
        }
        let waker = self.waker.lock().clone();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub(crate) fn interrupt_request(&self) -> Option<FiberId> {
        *self.interrupt.lock()
    }

    /// Run `observer` once the fiber is done. Returns `false` without
    /// registering if it already is.
    pub(crate) fn observe(&self, observer: Observer) -> bool {
        let mut state = self.state.lock();
        if state.status == FiberStatus::Done {
            return false;
        }
        state.observers.push(observer);
        true
    }

    pub(crate) fn complete(&self, outcome: Result<Value, ErasedCause>) {
        let observers = {
            let mut state = self.state.lock();
            state.status = FiberStatus::Done;
            state.exit = Some(outcome);
            std::mem::take(&mut state.observers)
        };
        self.waker.lock().take();
        for observer in observers {
            observer();
        }
    }

    /// Take the fiber's result. The result can be observed once.
    pub(crate) fn take_exit(&self) -> Observation {
        let mut state = self.state.lock();
        if state.observed {
            return Observation::AlreadyObserved;
        }
        match state.exit.take() {
            Some(outcome) => {
                state.observed = true;
                Observation::Ready(outcome)
            }
            None => Observation::Pending,
        }
    }
}

impl fmt::Debug for FiberShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberShared")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

pub(crate) fn typed_exit<A: 'static, E: 'static>(outcome: Result<Value, ErasedCause>) -> Exit<A, E> {
    match outcome {
        Ok(value) => Exit::Success(unbox(value)),
        Err(cause) => Exit::Failure(cause.map(unbox)),
    }
}

pub(crate) const ALREADY_OBSERVED: &str = "fiber result was already observed";

/// Handle to a forked fiber, used from inside other effects.
///
/// Obtained from [`Effect::fork`]. The fiber's result can be observed once,
/// through either [`join`](Fiber::join), [`await_exit`](Fiber::await_exit)
/// or [`interrupt`](Fiber::interrupt); a second observation dies.
pub struct Fiber<A, E> {
    shared: Arc<FiberShared>,
    _marker: PhantomData<fn() -> (A, E)>,
}

impl<A, E> Clone for Fiber<A, E> {
    fn clone(&self) -> Self {
        Fiber {
            shared: self.shared.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A, E> fmt::Debug for Fiber<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.shared.id())
            .field("status", &self.shared.status())
            .finish()
    }
}

impl<A, E> Fiber<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(shared: Arc<FiberShared>) -> Self {
        Fiber {
            shared,
            _marker: PhantomData,
        }
    }

    /// The fiber's id.
    pub fn id(&self) -> FiberId {
        self.shared.id()
    }

    /// The fiber's current status.
    pub fn status(&self) -> FiberStatus {
        self.shared.status()
    }

    /// Wait for the fiber and take its outcome as an erased result.
    fn observe<E2, R>(&self) -> Effect<Result<Value, ErasedCause>, E2, R>
    where
        E2: Send + 'static,
        R: Send + Sync + 'static,
    {
        let shared = self.shared.clone();
        Effect::from_node(move || {
            let waiting = shared.clone();
            let taking = shared.clone();
            Primitive::FlatMap(
                Instruction::build(Primitive::Async(Box::new(move |_: &Env, slot: Arc<ResumeSlot>| {
                    let notify = slot.clone();
                    let registered = waiting.observe(Box::new(move || {
                        notify.complete(Ok(boxed(())));
                    }));
                    if !registered {
                        slot.complete(Ok(boxed(())));
                    }
                    let cancel: Canceler = Box::new(move || slot.cancel());
                    Some(cancel)
                }))),
                Box::new(move |_| match taking.take_exit() {
                    Observation::Ready(outcome) => Instruction::value(boxed(outcome)),
                    Observation::AlreadyObserved => {
                        Instruction::cause(Cause::Die(Defect::new(ALREADY_OBSERVED)))
                    }
                    Observation::Pending => Instruction::cause(Cause::Die(Defect::new(
                        "fiber resumed before its result was available",
                    ))),
                }),
            )
        })
    }

    /// Wait for the fiber and adopt its outcome: its value, its failure,
    /// its defect or its interruption.
    pub fn join<R>(&self) -> Effect<A, E, R>
    where
        R: Send + Sync + 'static,
    {
        let observe = self.observe::<E, R>();
        Effect::from_node(move || {
            Primitive::FlatMap(
                observe.instruction(),
                Box::new(|outcome| match unbox::<Result<Value, ErasedCause>>(outcome) {
                    Ok(value) => Instruction::value(value),
                    Err(cause) => Instruction::cause(cause),
                }),
            )
        })
    }

    /// Wait for the fiber and return its outcome as data. Dies if the
    /// result was already observed.
    pub fn await_exit<E2, R>(&self) -> Effect<Exit<A, E>, E2, R>
    where
        E2: Send + 'static,
        R: Send + Sync + 'static,
    {
        self.observe::<E2, R>().map(typed_exit::<A, E>)
    }

    /// Request interruption of the fiber, then wait for it to finish.
    ///
    /// The request is attributed to the calling fiber.
    pub fn interrupt<E2, R>(&self) -> Effect<Exit<A, E>, E2, R>
    where
        E2: Send + 'static,
        R: Send + Sync + 'static,
    {
        let shared = self.shared.clone();
        let await_exit = self.await_exit::<E2, R>();
        Effect::from_node(move || {
            let shared = shared.clone();
            let await_exit = await_exit.clone();
            Primitive::Descriptor(Box::new(move |me| {
                shared.request_interrupt(me);
                await_exit.instruction()
            }))
        })
    }
}
