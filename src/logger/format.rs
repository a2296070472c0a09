//! The default `key=value` text format.

use std::fmt::Write as _;
use std::io::Write;

use chrono::SecondsFormat;
use parking_lot::Mutex;

use super::{LogEntry, Logger};

/// Renders entries as `key=value` lines:
///
/// ```text
/// timestamp=2024-05-01T12:00:00.000Z level=INFO fiber=#3 message="user created" user=42 request=12ms
/// ```
///
/// Messages and annotation values containing whitespace, quotes or `=` are
/// quoted. Spans follow annotations, outermost first.
pub struct DefaultLogger {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl DefaultLogger {
    /// Write to the given writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        DefaultLogger {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Write to standard error.
    pub fn stderr() -> Self {
        DefaultLogger::new(std::io::stderr())
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let line = render(entry);
        let mut writer = self.writer.lock();
        // a logger must not fail the effect that logged
        let _ = writeln!(writer, "{}", line);
        let _ = writer.flush();
    }
}

impl std::fmt::Debug for DefaultLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultLogger").finish_non_exhaustive()
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '=')
}

fn push_value(out: &mut String, value: &str) {
    if !needs_quotes(value) {
        out.push_str(value);
        return;
    }
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

pub(crate) fn render(entry: &LogEntry) -> String {
    let mut out = String::with_capacity(96 + entry.message().len());
    let _ = write!(
        out,
        "timestamp={} level={} fiber={} message=",
        entry
            .timestamp()
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        entry.level().label(),
        entry.fiber_id(),
    );
    push_value(&mut out, entry.message());
    for (key, value) in entry.annotations() {
        out.push(' ');
        out.push_str(key);
        out.push('=');
        push_value(&mut out, value);
    }
    for (label, elapsed) in entry.spans() {
        let _ = write!(out, " {}={}ms", label, elapsed);
    }
    out
}
