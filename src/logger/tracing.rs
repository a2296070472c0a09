//! Bridge from effect logging to the `tracing` ecosystem.

use super::{LogEntry, LogLevel, Logger};

/// A logger that re-emits every entry as a `tracing` event.
///
/// The event carries the fiber id, spans and annotations as a rendered
/// field, at the `tracing` level matching the entry (`Fatal` maps to
/// `ERROR`). Install it with a [`LoggerPatch`](super::LoggerPatch) to route
/// effect logs through whatever subscriber the application configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    /// Create the bridge.
    pub fn new() -> Self {
        TracingLogger
    }
}

fn context(entry: &LogEntry) -> String {
    let mut parts: Vec<String> = entry
        .annotations()
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    parts.extend(
        entry
            .spans()
            .iter()
            .map(|(label, elapsed)| format!("{}={}ms", label, elapsed)),
    );
    parts.join(" ")
}

impl Logger for TracingLogger {
    fn log(&self, entry: &LogEntry) {
        let fiber = entry.fiber_id().to_string();
        let context = context(entry);
        let message = entry.message();
        match entry.level() {
            LogLevel::Trace => {
                ::tracing::trace!(fiber = %fiber, context = %context, "{}", message)
            }
            LogLevel::Debug => {
                ::tracing::debug!(fiber = %fiber, context = %context, "{}", message)
            }
            LogLevel::Info => {
                ::tracing::info!(fiber = %fiber, context = %context, "{}", message)
            }
            LogLevel::Warning => {
                ::tracing::warn!(fiber = %fiber, context = %context, "{}", message)
            }
            LogLevel::Error | LogLevel::Fatal => {
                ::tracing::error!(fiber = %fiber, context = %context, "{}", message)
            }
        }
    }
}
