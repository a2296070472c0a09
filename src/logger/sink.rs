//! Logger sinks and the sets and patches that install them.

use std::fmt;
use std::sync::{Arc, OnceLock};

use super::format::DefaultLogger;
use super::LogEntry;

/// A destination for log entries.
///
/// Loggers are called synchronously by the runtime, once per entry, on the
/// thread that drives the logging fiber. A logger must not panic; a panic is
/// reported as a defect of the effect that logged.
///
/// Any `Fn(&LogEntry) + Send + Sync` closure is a logger.
pub trait Logger: Send + Sync {
    /// Handle one entry.
    fn log(&self, entry: &LogEntry);
}

impl<F> Logger for F
where
    F: Fn(&LogEntry) + Send + Sync,
{
    fn log(&self, entry: &LogEntry) {
        self(entry)
    }
}

/// Shared handle to an installed logger. Identity is by allocation.
pub type LoggerRef = Arc<dyn Logger>;

fn same_logger(a: &LoggerRef, b: &LoggerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

static DEFAULT_LOGGER: OnceLock<LoggerRef> = OnceLock::new();

/// The ordered set of loggers a fiber writes to.
#[derive(Clone)]
pub struct LoggerSet {
    loggers: Vec<LoggerRef>,
}

impl LoggerSet {
    /// The process-wide default logger (text on stderr).
    ///
    /// Always returns the same handle, so it can be named in a
    /// [`LoggerPatch::replace`] or [`LoggerPatch::remove`].
    pub fn default_logger() -> LoggerRef {
        DEFAULT_LOGGER
            .get_or_init(|| Arc::new(DefaultLogger::stderr()))
            .clone()
    }

    /// A set with no loggers; every entry is dropped.
    pub fn empty() -> Self {
        LoggerSet {
            loggers: Vec::new(),
        }
    }

    /// A set containing exactly the given loggers.
    pub fn of(loggers: impl IntoIterator<Item = LoggerRef>) -> Self {
        LoggerSet {
            loggers: loggers.into_iter().collect(),
        }
    }

    /// Returns `true` if `logger` is installed.
    pub fn contains(&self, logger: &LoggerRef) -> bool {
        self.loggers.iter().any(|l| same_logger(l, logger))
    }

    /// Number of installed loggers.
    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    /// Returns `true` if no logger is installed.
    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }

    /// Iterate over installed loggers in order.
    pub fn iter(&self) -> impl Iterator<Item = &LoggerRef> {
        self.loggers.iter()
    }

    fn add(&mut self, logger: LoggerRef) {
        if !self.contains(&logger) {
            self.loggers.push(logger);
        }
    }

    fn remove(&mut self, logger: &LoggerRef) {
        self.loggers.retain(|l| !same_logger(l, logger));
    }

    fn replace(&mut self, old: &LoggerRef, new: LoggerRef) {
        match self.loggers.iter().position(|l| same_logger(l, old)) {
            Some(index) => self.loggers[index] = new,
            None => self.add(new),
        }
    }
}

impl Default for LoggerSet {
    /// The default logger only.
    fn default() -> Self {
        LoggerSet {
            loggers: vec![LoggerSet::default_logger()],
        }
    }
}

impl fmt::Debug for LoggerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerSet")
            .field("len", &self.loggers.len())
            .finish()
    }
}

#[derive(Clone)]
enum PatchOp {
    Add(LoggerRef),
    Remove(LoggerRef),
    Replace(LoggerRef, LoggerRef),
}

/// A description of changes to a [`LoggerSet`].
///
/// Patches are plain data: they are applied when a runtime is built
/// (`RuntimeBuilder::logger_patch`) or for the scope of one effect
/// (`Effect::with_logger_patch`).
///
/// # Example
///
/// ```rust
/// use eddy::logger::{LogEntry, LoggerPatch, LoggerRef, LoggerSet};
/// use std::sync::Arc;
///
/// let quiet: LoggerRef = Arc::new(|_: &LogEntry| {});
/// let patch = LoggerPatch::replace(&LoggerSet::default_logger(), quiet.clone());
///
/// let set = patch.apply(&LoggerSet::default());
/// assert!(set.contains(&quiet));
/// assert!(!set.contains(&LoggerSet::default_logger()));
/// ```
#[derive(Clone, Default)]
pub struct LoggerPatch {
    ops: Vec<PatchOp>,
}

impl LoggerPatch {
    /// Substitute `new` for `old`. If `old` is not installed, `new` is added.
    pub fn replace(old: &LoggerRef, new: LoggerRef) -> Self {
        LoggerPatch {
            ops: vec![PatchOp::Replace(old.clone(), new)],
        }
    }

    /// Install `logger` alongside the existing ones.
    pub fn add(logger: LoggerRef) -> Self {
        LoggerPatch {
            ops: vec![PatchOp::Add(logger)],
        }
    }

    /// Uninstall `logger`.
    pub fn remove(logger: &LoggerRef) -> Self {
        LoggerPatch {
            ops: vec![PatchOp::Remove(logger.clone())],
        }
    }

    /// Apply `self`, then `next`.
    pub fn and_then(mut self, next: LoggerPatch) -> Self {
        self.ops.extend(next.ops);
        self
    }

    /// Produce the patched set; `set` itself is left unchanged.
    pub fn apply(&self, set: &LoggerSet) -> LoggerSet {
        let mut patched = set.clone();
        for op in &self.ops {
            match op {
                PatchOp::Add(logger) => patched.add(logger.clone()),
                PatchOp::Remove(logger) => patched.remove(logger),
                PatchOp::Replace(old, new) => patched.replace(old, new.clone()),
            }
        }
        patched
    }
}

impl fmt::Debug for LoggerPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerPatch")
            .field("ops", &self.ops.len())
            .finish()
    }
}
