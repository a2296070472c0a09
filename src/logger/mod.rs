//! Structured, leveled logging for effects.
//!
//! Logging is a side channel of the runtime: `log_info("...")` and friends
//! are effects that, when executed, build a [`LogEntry`] and hand it to every
//! [`Logger`] installed on the running fiber.
//!
//! - Entries below the fiber's minimum level (default [`LogLevel::Info`]) are
//!   never built and no logger is called.
//! - `log_span(label)` adds a timed span to every entry logged in its scope.
//! - `annotate_logs(key, value)` adds a key/value pair in its scope.
//! - Loggers are swapped with a [`LoggerPatch`], either for the whole runtime
//!   or for the scope of one effect.
//!
//! # Example
//!
//! ```rust
//! use eddy::logger::{LogLevel, LoggerPatch, LoggerSet};
//! use eddy::testing::CapturingLogger;
//! use eddy::{log_debug, log_info, Effect, Runtime};
//! use std::sync::Arc;
//!
//! let capture = Arc::new(CapturingLogger::new());
//! let runtime = Runtime::builder()
//!     .logger_patch(LoggerPatch::replace(&LoggerSet::default_logger(), capture.clone()))
//!     .build();
//!
//! let program = log_info::<String, ()>("starting")
//!     .zip_right(log_debug("hidden"))
//!     .zip_right(log_debug("shown").with_minimum_log_level(LogLevel::Debug));
//!
//! runtime.run_sync(&program);
//! assert_eq!(capture.messages(), vec!["starting", "shown"]);
//! ```

mod format;
mod level;
mod sink;
mod tracing;

pub use format::DefaultLogger;
pub use level::{LogLevel, LogLevelParseError};
pub use sink::{Logger, LoggerPatch, LoggerRef, LoggerSet};
pub use self::tracing::TracingLogger;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::runtime::FiberId;

/// One log record, built at the moment a log effect executes.
///
/// Entries are handed to loggers by reference and dropped afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    fiber_id: FiberId,
    message: String,
    spans: Vec<(String, u64)>,
    annotations: Vec<(String, String)>,
}

impl LogEntry {
    /// Create an entry. Spans are `(label, elapsed_millis)`, outermost first.
    pub fn new(
        timestamp: DateTime<Utc>,
        level: LogLevel,
        fiber_id: FiberId,
        message: impl Into<String>,
        spans: Vec<(String, u64)>,
        annotations: Vec<(String, String)>,
    ) -> Self {
        LogEntry {
            timestamp,
            level,
            fiber_id,
            message: message.into(),
            spans,
            annotations,
        }
    }

    /// When the entry was built.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The entry's level.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// The fiber that logged the entry.
    pub fn fiber_id(&self) -> FiberId {
        self.fiber_id
    }

    /// The log message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Active spans as `(label, elapsed_millis)`, outermost first.
    pub fn spans(&self) -> &[(String, u64)] {
        &self.spans
    }

    /// Active annotations, in the order they were added.
    pub fn annotations(&self) -> &[(String, String)] {
        &self.annotations
    }

    /// Render the entry in the default text format.
    pub fn render(&self) -> String {
        format::render(self)
    }
}

/// A span opened by `log_span`, owned by a single fiber.
#[derive(Debug)]
pub(crate) struct SpanNode {
    label: String,
    start: DateTime<Utc>,
    parent: Option<Arc<SpanNode>>,
}

/// Persistent stack of open spans; cloning is cheap, so scoped restores and
/// forks copy it freely.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpanStack {
    top: Option<Arc<SpanNode>>,
}

impl SpanStack {
    pub(crate) fn push(&mut self, label: String, start: DateTime<Utc>) {
        let parent = self.top.take();
        self.top = Some(Arc::new(SpanNode {
            label,
            start,
            parent,
        }));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        let mut count = 0;
        let mut node = self.top.as_deref();
        while let Some(current) = node {
            count += 1;
            node = current.parent.as_deref();
        }
        count
    }

    /// Elapsed time of every open span at `now`, outermost first.
    pub(crate) fn render(&self, now: DateTime<Utc>) -> Vec<(String, u64)> {
        let mut spans = Vec::new();
        let mut node = self.top.as_deref();
        while let Some(current) = node {
            let elapsed = (now - current.start).num_milliseconds().max(0) as u64;
            spans.push((current.label.clone(), elapsed));
            node = current.parent.as_deref();
        }
        spans.reverse();
        spans
    }
}
