//! Outcomes of running an effect.
//!
//! Every run ends in exactly one [`Exit`]: a success value, or a failure
//! carrying a [`Cause`]. A cause is one of three channels:
//!
//! - [`Cause::Fail`] - an expected, typed failure (`E`), recoverable with
//!   `catch_all` and friends.
//! - [`Cause::Die`] - a [`Defect`]: a panic escaping user code, or a
//!   runtime violation. Not typed by `E`.
//! - [`Cause::Interrupt`] - the fiber was interrupted.

use std::any::Any;
use std::fmt;

use crate::either::Either;
use crate::runtime::FiberId;

/// An unrecoverable failure outside the expected-error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defect {
    message: String,
}

impl Defect {
    /// Create a defect with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Defect {
            message: message.into(),
        }
    }

    /// Build a defect from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with a non-string payload".to_string()
        };
        Defect { message }
    }

    /// The defect message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Defect {}

/// Why an effect did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause<E> {
    /// An expected failure.
    Fail(E),
    /// An unrecoverable defect.
    Die(Defect),
    /// The fiber was interrupted by the given fiber.
    Interrupt(FiberId),
}

impl<E> Cause<E> {
    /// Returns `true` for an expected failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Cause::Fail(_))
    }

    /// Returns `true` for a defect.
    pub fn is_die(&self) -> bool {
        matches!(self, Cause::Die(_))
    }

    /// Returns `true` for an interruption.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Cause::Interrupt(_))
    }

    /// The expected failure, if any.
    pub fn failure(&self) -> Option<&E> {
        match self {
            Cause::Fail(e) => Some(e),
            _ => None,
        }
    }

    /// Consume the cause, returning the expected failure if any.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Cause::Fail(e) => Some(e),
            _ => None,
        }
    }

    /// The defect, if any.
    pub fn defect(&self) -> Option<&Defect> {
        match self {
            Cause::Die(d) => Some(d),
            _ => None,
        }
    }

    /// Transform the expected failure.
    pub fn map<E2, F>(self, f: F) -> Cause<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Cause::Fail(e) => Cause::Fail(f(e)),
            Cause::Die(d) => Cause::Die(d),
            Cause::Interrupt(id) => Cause::Interrupt(id),
        }
    }
}

impl<E: fmt::Display> fmt::Display for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Fail(e) => write!(f, "effect failed: {}", e),
            Cause::Die(d) => write!(f, "effect died: {}", d),
            Cause::Interrupt(id) => write!(f, "fiber interrupted by {}", id),
        }
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for Cause<E> {}

/// The final outcome of running an effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit<A, E> {
    /// The effect succeeded.
    Success(A),
    /// The effect did not succeed.
    Failure(Cause<E>),
}

impl<A, E> Exit<A, E> {
    /// A successful exit.
    pub fn succeed(value: A) -> Self {
        Exit::Success(value)
    }

    /// An expected-failure exit.
    pub fn fail(error: E) -> Self {
        Exit::Failure(Cause::Fail(error))
    }

    /// A defect exit.
    pub fn die(defect: Defect) -> Self {
        Exit::Failure(Cause::Die(defect))
    }

    /// Returns `true` on success.
    pub fn is_success(&self) -> bool {
        matches!(self, Exit::Success(_))
    }

    /// Returns `true` on any failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Exit::Failure(_))
    }

    /// Returns `true` if the effect died with a defect.
    pub fn is_die(&self) -> bool {
        matches!(self, Exit::Failure(Cause::Die(_)))
    }

    /// Returns `true` if the fiber was interrupted.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Exit::Failure(Cause::Interrupt(_)))
    }

    /// The cause, if the exit is a failure.
    pub fn cause(&self) -> Option<&Cause<E>> {
        match self {
            Exit::Success(_) => None,
            Exit::Failure(cause) => Some(cause),
        }
    }

    /// Transform the success value.
    pub fn map<B, F>(self, f: F) -> Exit<B, E>
    where
        F: FnOnce(A) -> B,
    {
        match self {
            Exit::Success(a) => Exit::Success(f(a)),
            Exit::Failure(cause) => Exit::Failure(cause),
        }
    }

    /// Convert into a `Result` carrying the whole cause on failure.
    pub fn into_result(self) -> Result<A, Cause<E>> {
        match self {
            Exit::Success(a) => Ok(a),
            Exit::Failure(cause) => Err(cause),
        }
    }

    /// Convert into an `Either`, keeping only success and expected failure.
    ///
    /// Defects and interruptions are returned unchanged in the `Err` arm.
    pub fn into_either(self) -> Result<Either<E, A>, Cause<E>> {
        match self {
            Exit::Success(a) => Ok(Either::Right(a)),
            Exit::Failure(Cause::Fail(e)) => Ok(Either::Left(e)),
            Exit::Failure(cause) => Err(cause),
        }
    }
}
