//! Log effects and scoped logging configuration.

use std::sync::Arc;

use crate::logger::{LogLevel, LoggerPatch};

use super::primitive::{Primitive, RefPatch};
use super::Effect;

/// Log `message` at `level` on the running fiber.
///
/// Nothing is built and no logger is called when `level` is below the
/// fiber's minimum level.
pub fn log<E, R>(level: LogLevel, message: impl Into<String>) -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    let message: Arc<str> = Arc::from(message.into());
    Effect::from_node(move || {
        let message = message.clone();
        Primitive::Log {
            level,
            message: Box::new(move || message.to_string()),
        }
    })
}

/// Log with a message computed only when the entry is actually built.
///
/// ```rust
/// use eddy::logger::LogLevel;
/// use eddy::{log_with, Effect, Runtime};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let rendered = Arc::new(AtomicBool::new(false));
/// let flag = rendered.clone();
/// let effect: Effect<()> = log_with(LogLevel::Trace, move || {
///     flag.store(true, Ordering::SeqCst);
///     "expensive".to_string()
/// });
///
/// Runtime::default().run_sync(&effect);
/// assert!(!rendered.load(Ordering::SeqCst));
/// ```
pub fn log_with<E, R, F>(level: LogLevel, message: F) -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
    F: Fn() -> String + Send + Sync + 'static,
{
    let message = Arc::new(message);
    Effect::from_node(move || {
        let message = message.clone();
        Primitive::Log {
            level,
            message: Box::new(move || message()),
        }
    })
}

/// Log at [`LogLevel::Trace`].
pub fn log_trace<E, R>(message: impl Into<String>) -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    log(LogLevel::Trace, message)
}

/// Log at [`LogLevel::Debug`].
pub fn log_debug<E, R>(message: impl Into<String>) -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    log(LogLevel::Debug, message)
}

/// Log at [`LogLevel::Info`].
pub fn log_info<E, R>(message: impl Into<String>) -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    log(LogLevel::Info, message)
}

/// Log at [`LogLevel::Warning`].
pub fn log_warning<E, R>(message: impl Into<String>) -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    log(LogLevel::Warning, message)
}

/// Log at [`LogLevel::Error`].
pub fn log_error<E, R>(message: impl Into<String>) -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    log(LogLevel::Error, message)
}

/// Log at [`LogLevel::Fatal`].
pub fn log_fatal<E, R>(message: impl Into<String>) -> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    log(LogLevel::Fatal, message)
}

impl<A, E, R> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Add a timed span named `label` to every entry logged while the
    /// effect runs.
    ///
    /// The span is removed when the effect ends, however it ends.
    pub fn log_span(self, label: impl Into<String>) -> Effect<A, E, R> {
        let label = label.into();
        Effect::from_node(move || Primitive::WithSpan(label.clone(), self.instruction()))
    }

    /// Run the effect with a different minimum log level.
    ///
    /// The override is seen by fibers forked inside the scope, and never by
    /// the caller or its siblings.
    pub fn with_minimum_log_level(self, level: LogLevel) -> Effect<A, E, R> {
        self.locally(RefPatch::MinLogLevel(level))
    }

    /// Add `key=value` to every entry logged while the effect runs. An
    /// existing annotation with the same key is replaced for the scope.
    pub fn annotate_logs(self, key: impl Into<String>, value: impl Into<String>) -> Effect<A, E, R> {
        self.locally(RefPatch::Annotate(key.into(), value.into()))
    }

    /// Run the effect with the fiber's loggers changed by `patch`.
    pub fn with_logger_patch(self, patch: LoggerPatch) -> Effect<A, E, R> {
        self.locally(RefPatch::Loggers(patch))
    }

    fn locally(self, patch: RefPatch) -> Effect<A, E, R> {
        Effect::from_node(move || Primitive::Locally(patch.clone(), self.instruction()))
    }
}
