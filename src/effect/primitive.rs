//! The tagged instruction set interpreted by the fiber runtime.
//!
//! An [`Effect`](super::Effect) is a shared, reusable factory of
//! [`Primitive`] nodes. Each run asks the factory for a fresh node, so the
//! per-run closures below are `FnOnce` and may own the values they carry.
//! Values flow through the interpreter type-erased as [`Value`]; the typed
//! combinators box on the way in and downcast on the way out.

use std::any::Any;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::duration::Duration;
use crate::exit::Cause;
use crate::logger::{LogLevel, LoggerPatch};
use crate::runtime::{Canceler, FiberId, ResumeSlot};

pub(crate) type Value = Box<dyn Any + Send>;
pub(crate) type Env = Arc<dyn Any + Send + Sync>;
pub(crate) type ErasedCause = Cause<Value>;
pub(crate) type Node = Arc<dyn Fn() -> Primitive + Send + Sync>;

pub(crate) type Continuation = Box<dyn FnOnce(Value) -> Instruction + Send>;
pub(crate) type Mapper = Box<dyn FnOnce(Value) -> Value + Send>;
pub(crate) type FailureHandler =
    Box<dyn FnOnce(ErasedCause) -> Result<Instruction, ErasedCause> + Send>;
pub(crate) type Finalizer = Box<dyn FnOnce(ExitKind) -> Instruction + Send>;
pub(crate) type Register = Box<dyn FnOnce(&Env, Arc<ResumeSlot>) -> Option<Canceler> + Send>;
pub(crate) type FutureFactory = Box<dyn FnOnce(&Env) -> BoxFuture<'static, Result<Value, Value>> + Send>;

pub(crate) fn boxed<T: Send + 'static>(value: T) -> Value {
    Box::new(value)
}

pub(crate) fn unbox<T: 'static>(value: Value) -> T {
    *value
        .downcast::<T>()
        .expect("effect value type mismatch in interpreter")
}

pub(crate) fn erase_cause<E: Send + 'static>(cause: Cause<E>) -> ErasedCause {
    cause.map(boxed)
}

pub(crate) fn unerase_cause<E: 'static>(cause: ErasedCause) -> Cause<E> {
    cause.map(unbox::<E>)
}

/// How the guarded region of an `Ensuring` node ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitKind {
    Success,
    Failure,
    Die,
    Interrupt,
}

impl ExitKind {
    pub(crate) fn of(cause: &ErasedCause) -> Self {
        match cause {
            Cause::Fail(_) => ExitKind::Failure,
            Cause::Die(_) => ExitKind::Die,
            Cause::Interrupt(_) => ExitKind::Interrupt,
        }
    }
}

/// A scoped change to the running fiber's local state.
#[derive(Debug, Clone)]
pub(crate) enum RefPatch {
    MinLogLevel(LogLevel),
    Loggers(LoggerPatch),
    Annotate(String, String),
}

/// The next thing for the interpreter to evaluate: either an unbuilt node
/// from a user-visible effect, or a node already built for this run.
pub(crate) enum Instruction {
    Node(Node),
    Built(Box<Primitive>),
}

impl Instruction {
    pub(crate) fn build(primitive: Primitive) -> Self {
        Instruction::Built(Box::new(primitive))
    }

    pub(crate) fn value(value: Value) -> Self {
        Instruction::build(Primitive::Succeed(value))
    }

    pub(crate) fn cause(cause: ErasedCause) -> Self {
        Instruction::build(Primitive::Fail(cause))
    }

    pub(crate) fn unit() -> Self {
        Instruction::value(boxed(()))
    }

    pub(crate) fn flat_map(self, next: impl FnOnce(Value) -> Instruction + Send + 'static) -> Self {
        Instruction::build(Primitive::FlatMap(self, Box::new(next)))
    }

    pub(crate) fn map(self, f: impl FnOnce(Value) -> Value + Send + 'static) -> Self {
        Instruction::build(Primitive::Map(self, Box::new(f)))
    }
}

/// One node of an effect tree.
pub(crate) enum Primitive {
    Succeed(Value),
    Fail(ErasedCause),
    /// Synchronous step; `Err` is an expected failure, a panic is a defect.
    Sync(Box<dyn FnOnce(&Env) -> Result<Value, Value> + Send>),
    /// Callback suspension point.
    Async(Register),
    /// Host future suspension point.
    Future(FutureFactory),
    Sleep(Duration),
    Yield,
    FlatMap(Instruction, Continuation),
    Map(Instruction, Mapper),
    Fold {
        effect: Instruction,
        on_failure: FailureHandler,
        on_success: Option<Continuation>,
    },
    Ensuring(Instruction, Finalizer),
    Locally(RefPatch, Instruction),
    WithSpan(String, Instruction),
    Provide(Env, Instruction),
    Log {
        level: LogLevel,
        message: Box<dyn FnOnce() -> String + Send>,
    },
    Fork(Instruction),
    Descriptor(Box<dyn FnOnce(FiberId) -> Instruction + Send>),
    Uninterruptible(Instruction),
    Interrupt,
}
