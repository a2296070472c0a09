//! The fiber interpreter.
//!
//! A fiber evaluates its effect with an explicit continuation stack, so the
//! native stack depth does not grow with the depth of `flat_map` chains or
//! loops. Every user closure runs under `catch_unwind`; a panic becomes a
//! [`Cause::Die`].

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::future::BoxFuture;

use crate::effect::primitive::{
    boxed, Continuation, Env, ErasedCause, ExitKind, FailureHandler, Finalizer, Instruction,
    Mapper, Primitive, RefPatch, Value,
};
use crate::exit::{Cause, Defect};
use crate::logger::{LogEntry, LogLevel, LoggerSet, SpanStack};

use super::callback::{Canceler, ResumeSlot};
use super::fiber::{FiberId, FiberShared, FiberStatus};
use super::scheduler::Scheduler;
use super::RuntimeConfig;

/// Steps a fiber may take before it re-queues itself.
pub(crate) const OP_BUDGET: usize = 2048;

/// Fiber-local state, copied into forked children.
#[derive(Clone)]
pub(crate) struct FiberRefs {
    min_level: LogLevel,
    loggers: LoggerSet,
    spans: SpanStack,
    annotations: Vec<(String, String)>,
}

impl FiberRefs {
    pub(crate) fn from_config(config: &RuntimeConfig) -> Self {
        FiberRefs {
            min_level: config.min_log_level,
            loggers: config.loggers.clone(),
            spans: SpanStack::default(),
            annotations: Vec::new(),
        }
    }

    fn patch(&mut self, patch: RefPatch) {
        match patch {
            RefPatch::MinLogLevel(level) => self.min_level = level,
            RefPatch::Loggers(patch) => self.loggers = patch.apply(&self.loggers),
            RefPatch::Annotate(key, value) => {
                self.annotations.retain(|(k, _)| *k != key);
                self.annotations.push((key, value));
            }
        }
    }
}

enum Step {
    Run(Instruction),
    Value(Value),
    Cause(ErasedCause),
}

impl Step {
    fn from_outcome(outcome: Result<Value, ErasedCause>) -> Self {
        match outcome {
            Ok(value) => Step::Value(value),
            Err(cause) => Step::Cause(cause),
        }
    }
}

enum Frame {
    Map(Mapper),
    FlatMap(Continuation),
    Fold {
        on_failure: FailureHandler,
        on_success: Option<Continuation>,
    },
    Ensuring(Finalizer),
    AfterFinalizer(Result<Value, ErasedCause>),
    RestoreRefs(FiberRefs),
    RestoreEnv(Env),
    ExitUninterruptible,
}

enum Suspension {
    Callback {
        slot: Arc<ResumeSlot>,
        canceler: Option<Canceler>,
    },
    Future(BoxFuture<'static, Result<Value, Value>>),
    Sleep(BoxFuture<'static, ()>),
}

fn guard<T>(f: impl FnOnce() -> T) -> Result<T, ErasedCause> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Cause::Die(Defect::from_panic(payload)))
}

/// One fiber: its continuation stack, local state and pending suspension.
pub(crate) struct FiberRuntime {
    shared: Arc<FiberShared>,
    scheduler: Weak<Scheduler>,
    config: Arc<RuntimeConfig>,
    refs: FiberRefs,
    env: Env,
    stack: Vec<Frame>,
    next: Option<Step>,
    suspended: Option<Suspension>,
    uninterruptible: u32,
    interrupting: bool,
    children: Vec<Arc<FiberShared>>,
}

impl FiberRuntime {
    pub(crate) fn new(
        shared: Arc<FiberShared>,
        scheduler: Weak<Scheduler>,
        config: Arc<RuntimeConfig>,
        refs: FiberRefs,
        env: Env,
        effect: Instruction,
    ) -> Self {
        FiberRuntime {
            shared,
            scheduler,
            config,
            refs,
            env,
            stack: Vec::new(),
            next: Some(Step::Run(effect)),
            suspended: None,
            uninterruptible: 0,
            interrupting: false,
            children: Vec::new(),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<FiberShared> {
        &self.shared
    }

    fn id(&self) -> FiberId {
        self.shared.id()
    }

    /// An interruption request the fiber should act on now, if any.
    fn pending_interrupt(&self) -> Option<FiberId> {
        if self.uninterruptible > 0 || self.interrupting {
            return None;
        }
        self.shared.interrupt_request()
    }

    fn acknowledge_interrupt(&mut self, by: FiberId) -> Step {
        tracing::trace!(fiber = %self.id(), by = %by, "interruption acknowledged");
        self.interrupting = true;
        Step::Cause(Cause::Interrupt(by))
    }

    /// Advance the fiber until it finishes, suspends or exhausts its budget.
    pub(crate) fn poll(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.shared.set_status(FiberStatus::Running);
        let mut budget = OP_BUDGET;
        loop {
            if self.suspended.is_some() {
                if let Some(by) = self.pending_interrupt() {
                    self.cancel_suspension();
                    self.next = Some(self.acknowledge_interrupt(by));
                } else {
                    match self.poll_suspension(cx) {
                        Poll::Ready(step) => {
                            self.suspended = None;
                            self.next = Some(step);
                        }
                        Poll::Pending => {
                            self.shared.set_status(FiberStatus::Suspended);
                            return Poll::Pending;
                        }
                    }
                }
            }

            if budget == 0 {
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            budget -= 1;

            let step = match self.next.take() {
                Some(step) => step,
                None => return Poll::Ready(()),
            };
            let next = match step {
                Step::Run(instruction) => match self.pending_interrupt() {
                    Some(by) => self.acknowledge_interrupt(by),
                    None => match self.evaluate(instruction) {
                        Some(next) => next,
                        None if self.suspended.is_some() => continue,
                        None => {
                            // yielded
                            cx.waker().wake_by_ref();
                            return Poll::Pending;
                        }
                    },
                },
                Step::Value(value) => match self.on_value(value) {
                    Some(next) => next,
                    None => return Poll::Ready(()),
                },
                Step::Cause(cause) => match self.on_cause(cause) {
                    Some(next) => next,
                    None => return Poll::Ready(()),
                },
            };
            self.next = Some(next);
        }
    }

    fn cancel_suspension(&mut self) {
        match self.suspended.take() {
            Some(Suspension::Callback { slot, canceler }) => {
                slot.cancel();
                if let Some(cancel) = canceler {
                    if guard(cancel).is_err() {
                        tracing::warn!(fiber = %self.id(), "callback canceler panicked");
                    }
                }
            }
            Some(Suspension::Future(_)) | Some(Suspension::Sleep(_)) | None => {}
        }
    }

    fn poll_suspension(&mut self, cx: &mut Context<'_>) -> Poll<Step> {
        match self.suspended.as_mut() {
            Some(Suspension::Callback { slot, .. }) => {
                slot.register(cx.waker());
                match slot.take() {
                    Some(outcome) => Poll::Ready(Step::from_outcome(outcome)),
                    None => Poll::Pending,
                }
            }
            Some(Suspension::Future(future)) => {
                match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(cx))) {
                    Ok(Poll::Ready(Ok(value))) => Poll::Ready(Step::Value(value)),
                    Ok(Poll::Ready(Err(error))) => Poll::Ready(Step::Cause(Cause::Fail(error))),
                    Ok(Poll::Pending) => Poll::Pending,
                    Err(payload) => Poll::Ready(Step::Cause(Cause::Die(Defect::from_panic(payload)))),
                }
            }
            Some(Suspension::Sleep(sleep)) => sleep.as_mut().poll(cx).map(|()| Step::Value(boxed(()))),
            None => Poll::Ready(Step::Value(boxed(()))),
        }
    }

    /// Evaluate one node. `None` means the fiber suspended or yielded and
    /// has no step to take right now.
    fn evaluate(&mut self, instruction: Instruction) -> Option<Step> {
        let primitive = match instruction {
            Instruction::Built(primitive) => *primitive,
            Instruction::Node(node) => match guard(|| node()) {
                Ok(primitive) => primitive,
                Err(cause) => return Some(Step::Cause(cause)),
            },
        };

        let step = match primitive {
            Primitive::Succeed(value) => Step::Value(value),
            Primitive::Fail(cause) => Step::Cause(cause),
            Primitive::Sync(f) => {
                let env = &self.env;
                match guard(|| f(env)) {
                    Ok(Ok(value)) => Step::Value(value),
                    Ok(Err(error)) => Step::Cause(Cause::Fail(error)),
                    Err(cause) => Step::Cause(cause),
                }
            }
            Primitive::Async(register) => {
                let slot = ResumeSlot::new();
                let env = &self.env;
                let registered = slot.clone();
                match guard(|| register(env, registered)) {
                    Err(cause) => Step::Cause(cause),
                    Ok(canceler) => match slot.take() {
                        Some(outcome) => Step::from_outcome(outcome),
                        None => {
                            self.suspended = Some(Suspension::Callback { slot, canceler });
                            return None;
                        }
                    },
                }
            }
            Primitive::Future(factory) => {
                let env = &self.env;
                match guard(|| factory(env)) {
                    Ok(future) => {
                        self.suspended = Some(Suspension::Future(future));
                        return None;
                    }
                    Err(cause) => Step::Cause(cause),
                }
            }
            Primitive::Sleep(duration) => {
                if duration.is_zero() {
                    Step::Value(boxed(()))
                } else {
                    self.suspended = Some(Suspension::Sleep(self.config.clock.sleep(duration)));
                    return None;
                }
            }
            Primitive::Yield => {
                self.next = Some(Step::Value(boxed(())));
                return None;
            }
            Primitive::FlatMap(effect, k) => {
                self.stack.push(Frame::FlatMap(k));
                Step::Run(effect)
            }
            Primitive::Map(effect, f) => {
                self.stack.push(Frame::Map(f));
                Step::Run(effect)
            }
            Primitive::Fold {
                effect,
                on_failure,
                on_success,
            } => {
                self.stack.push(Frame::Fold {
                    on_failure,
                    on_success,
                });
                Step::Run(effect)
            }
            Primitive::Ensuring(effect, finalizer) => {
                self.stack.push(Frame::Ensuring(finalizer));
                Step::Run(effect)
            }
            Primitive::Locally(patch, effect) => {
                self.stack.push(Frame::RestoreRefs(self.refs.clone()));
                self.refs.patch(patch);
                Step::Run(effect)
            }
            Primitive::WithSpan(label, effect) => {
                self.stack.push(Frame::RestoreRefs(self.refs.clone()));
                let now = self.config.clock.now();
                self.refs.spans.push(label, now);
                Step::Run(effect)
            }
            Primitive::Provide(env, effect) => {
                let outer = std::mem::replace(&mut self.env, env);
                self.stack.push(Frame::RestoreEnv(outer));
                Step::Run(effect)
            }
            Primitive::Log { level, message } => match self.log(level, message) {
                Ok(()) => Step::Value(boxed(())),
                Err(cause) => Step::Cause(cause),
            },
            Primitive::Fork(effect) => match self.fork(effect) {
                Some(child) => Step::Value(boxed(child)),
                None => Step::Cause(Cause::Die(Defect::new(
                    "fork outside of a running scheduler",
                ))),
            },
            Primitive::Descriptor(f) => {
                let id = self.id();
                match guard(|| f(id)) {
                    Ok(effect) => Step::Run(effect),
                    Err(cause) => Step::Cause(cause),
                }
            }
            Primitive::Uninterruptible(effect) => {
                self.uninterruptible += 1;
                self.stack.push(Frame::ExitUninterruptible);
                Step::Run(effect)
            }
            Primitive::Interrupt => {
                let id = self.id();
                self.shared.request_interrupt(id);
                self.acknowledge_interrupt(id)
            }
        };
        Some(step)
    }

    fn log(
        &self,
        level: LogLevel,
        message: Box<dyn FnOnce() -> String + Send>,
    ) -> Result<(), ErasedCause> {
        if level < self.refs.min_level || self.refs.loggers.is_empty() {
            return Ok(());
        }
        guard(|| {
            let now = self.config.clock.now();
            let entry = LogEntry::new(
                now,
                level,
                self.id(),
                message(),
                self.refs.spans.render(now),
                self.refs.annotations.clone(),
            );
            for logger in self.refs.loggers.iter() {
                logger.log(&entry);
            }
        })
    }

    fn fork(&mut self, effect: Instruction) -> Option<Arc<FiberShared>> {
        let scheduler = self.scheduler.upgrade()?;
        let shared = FiberShared::new(FiberId::next());
        tracing::trace!(parent = %self.id(), child = %shared.id(), "fiber forked");
        let child = FiberRuntime::new(
            shared.clone(),
            self.scheduler.clone(),
            self.config.clone(),
            self.refs.clone(),
            self.env.clone(),
            effect,
        );
        self.children.retain(|c| !c.is_done());
        self.children.push(shared.clone());
        scheduler.spawn(child);
        Some(shared)
    }

    /// Run a finalizer uninterruptibly, then restore `outcome`.
    fn run_finalizer(
        &mut self,
        finalizer: Finalizer,
        outcome: Result<Value, ErasedCause>,
    ) -> Step {
        let kind = match &outcome {
            Ok(_) => ExitKind::Success,
            Err(cause) => ExitKind::of(cause),
        };
        self.stack.push(Frame::AfterFinalizer(outcome));
        self.uninterruptible += 1;
        self.stack.push(Frame::ExitUninterruptible);
        match guard(|| finalizer(kind)) {
            Ok(effect) => Step::Run(effect),
            Err(cause) => Step::Cause(cause),
        }
    }

    fn on_value(&mut self, mut value: Value) -> Option<Step> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Map(f) => match guard(|| f(value)) {
                    Ok(mapped) => value = mapped,
                    Err(cause) => return Some(Step::Cause(cause)),
                },
                Frame::FlatMap(k) => {
                    return Some(match guard(|| k(value)) {
                        Ok(effect) => Step::Run(effect),
                        Err(cause) => Step::Cause(cause),
                    })
                }
                Frame::Fold { on_success, .. } => {
                    if let Some(k) = on_success {
                        return Some(match guard(|| k(value)) {
                            Ok(effect) => Step::Run(effect),
                            Err(cause) => Step::Cause(cause),
                        });
                    }
                }
                Frame::Ensuring(finalizer) => return Some(self.run_finalizer(finalizer, Ok(value))),
                Frame::AfterFinalizer(outcome) => return Some(Step::from_outcome(outcome)),
                Frame::RestoreRefs(refs) => self.refs = refs,
                Frame::RestoreEnv(env) => self.env = env,
                Frame::ExitUninterruptible => self.uninterruptible -= 1,
            }
        }
        self.finish(Ok(value));
        None
    }

    fn on_cause(&mut self, mut cause: ErasedCause) -> Option<Step> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Map(_) | Frame::FlatMap(_) => {}
                Frame::Fold { on_failure, .. } => {
                    if cause.is_interrupted() {
                        continue;
                    }
                    match guard(|| on_failure(cause)) {
                        Ok(Ok(effect)) => return Some(Step::Run(effect)),
                        Ok(Err(unhandled)) => cause = unhandled,
                        Err(defect) => cause = defect,
                    }
                }
                Frame::Ensuring(finalizer) => return Some(self.run_finalizer(finalizer, Err(cause))),
                Frame::AfterFinalizer(outcome) => {
                    // an interruption outranks a failing finalizer
                    if let Err(original @ Cause::Interrupt(_)) = outcome {
                        cause = original;
                    }
                }
                Frame::RestoreRefs(refs) => self.refs = refs,
                Frame::RestoreEnv(env) => self.env = env,
                Frame::ExitUninterruptible => self.uninterruptible -= 1,
            }
        }
        self.finish(Err(cause));
        None
    }

    fn finish(&mut self, outcome: Result<Value, ErasedCause>) {
        let id = self.id();
        for child in self.children.drain(..) {
            if !child.is_done() {
                tracing::trace!(parent = %id, child = %child.id(), "interrupting child fiber");
                child.request_interrupt(id);
            }
        }
        match &outcome {
            Ok(_) => tracing::trace!(fiber = %id, "fiber succeeded"),
            Err(Cause::Fail(_)) => tracing::debug!(fiber = %id, "fiber failed"),
            Err(Cause::Die(defect)) => tracing::error!(fiber = %id, %defect, "fiber died"),
            Err(Cause::Interrupt(by)) => tracing::debug!(fiber = %id, by = %by, "fiber interrupted"),
        }
        self.shared.complete(outcome);
    }
}

impl fmt::Debug for FiberRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberRuntime")
            .field("id", &self.id())
            .field("frames", &self.stack.len())
            .field("suspended", &self.suspended.is_some())
            .finish_non_exhaustive()
    }
}
