//! Integration tests for the logging side channel.

use eddy::logger::{DefaultLogger, LogEntry, LogLevel, LoggerPatch, LoggerRef, LoggerSet, TracingLogger};
use eddy::prelude::*;
use eddy::testing::CapturingLogger;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capturing_runtime() -> (Runtime, Arc<CapturingLogger>) {
    let capture = Arc::new(CapturingLogger::new());
    let runtime = Runtime::builder().loggers(LoggerSet::of([capture.clone() as LoggerRef])).build();
    (runtime, capture)
}

#[test]
fn test_debug_is_below_default_level() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let logger: LoggerRef = Arc::new(move |_: &LogEntry| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let runtime = Runtime::builder().loggers(LoggerSet::of([logger])).build();

    runtime.run_sync(&log_debug::<String, ()>("not shown"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    runtime.run_sync(&log_info::<String, ()>("shown"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lazy_message_is_not_built_below_level() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let (runtime, capture) = capturing_runtime();

    let effect = log_with::<String, (), _>(LogLevel::Trace, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        "expensive".to_string()
    });
    runtime.run_sync(&effect);
    assert_eq!(built.load(Ordering::SeqCst), 0);
    assert!(capture.entries().is_empty());

    runtime.run_sync(&effect.with_minimum_log_level(LogLevel::Trace));
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(capture.messages(), vec!["expensive"]);
}

#[test]
fn test_runtime_minimum_level() {
    let capture = Arc::new(CapturingLogger::new());
    let runtime = Runtime::builder()
        .loggers(LoggerSet::of([capture.clone() as LoggerRef]))
        .min_log_level(LogLevel::Error)
        .build();

    let program = log_warning::<String, ()>("quiet")
        .zip_right(log_error("loud"))
        .zip_right(log_fatal("louder"));
    runtime.run_sync(&program);
    assert_eq!(capture.messages(), vec!["loud", "louder"]);
}

#[test]
fn test_scoped_level_does_not_leak_to_siblings() {
    let (runtime, capture) = capturing_runtime();

    let sibling = log_debug::<String, ()>("sibling");
    let scoped = log_debug::<String, ()>("scoped").with_minimum_log_level(LogLevel::Debug);
    let program = sibling
        .fork()
        .flat_map(move |fiber| scoped.clone().zip_right(fiber.join()))
        .zip_right(log_debug("after"));

    runtime.run_sync(&program);
    assert_eq!(capture.messages(), vec!["scoped"]);
}

#[test]
fn test_forked_fiber_inherits_scoped_level() {
    let (runtime, capture) = capturing_runtime();

    let program = log_debug::<String, ()>("from child")
        .fork()
        .flat_map(|fiber| fiber.join())
        .with_minimum_log_level(LogLevel::Debug);

    runtime.run_sync(&program);
    assert_eq!(capture.messages(), vec!["from child"]);
}

#[test]
fn test_entry_carries_fiber_id() {
    let (runtime, capture) = capturing_runtime();

    let program = fiber_id::<String, ()>().flat_map(|id| log_info("hello").as_(id));
    let id = runtime.run_sync(&program).unwrap_right();

    let entries = capture.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].fiber_id(), id);
    assert_eq!(entries[0].level(), LogLevel::Info);
}

#[tokio::test]
async fn test_span_is_rendered_with_elapsed_millis() {
    let buffer = SharedBuffer::default();
    let logger: LoggerRef = Arc::new(DefaultLogger::new(buffer.clone()));
    let runtime = Runtime::builder().loggers(LoggerSet::of([logger])).build();

    let program = Effect::<(), String>::sleep(Duration::millis(5))
        .zip_right(log_info("inside"))
        .log_span("s");
    runtime.run_promise(&program).await.unwrap();

    let text = buffer.text();
    let line = text.lines().next().unwrap();
    assert!(line.contains("level=INFO"), "{line}");
    assert!(line.contains("message=inside"), "{line}");
    let span = line
        .split(' ')
        .find_map(|field| field.strip_prefix("s="))
        .and_then(|value| value.strip_suffix("ms"))
        .and_then(|millis| millis.parse::<u64>().ok())
        .unwrap_or_else(|| panic!("no span field in {line}"));
    assert!(span >= 5, "{line}");
}

#[test]
fn test_nested_spans_and_annotations() {
    let (runtime, capture) = capturing_runtime();

    let program = log_info::<String, ()>("deep")
        .log_span("inner")
        .annotate_logs("user", "42")
        .zip_right(log_info("shallow"))
        .log_span("outer")
        .annotate_logs("request", "abc");

    runtime.run_sync(&program);
    let entries = capture.entries();
    assert_eq!(entries.len(), 2);

    let labels: Vec<&str> = entries[0].spans().iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(labels, vec!["outer", "inner"]);
    assert!(entries[0]
        .annotations()
        .contains(&("user".to_string(), "42".to_string())));
    assert!(entries[0]
        .annotations()
        .contains(&("request".to_string(), "abc".to_string())));

    let labels: Vec<&str> = entries[1].spans().iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(labels, vec!["outer"]);
    assert_eq!(
        entries[1].annotations(),
        &[("request".to_string(), "abc".to_string())][..]
    );
}

#[test]
fn test_scoped_logger_patch_adds_a_sink() {
    let (runtime, capture) = capturing_runtime();
    let extra = Arc::new(CapturingLogger::new());

    let program = log_info::<String, ()>("both")
        .with_logger_patch(LoggerPatch::add(extra.clone()))
        .zip_right(log_info("first only"));

    runtime.run_sync(&program);
    assert_eq!(capture.messages(), vec!["both", "first only"]);
    assert_eq!(extra.messages(), vec!["both"]);
}

#[test]
fn test_removing_every_logger_silences_output() {
    let (runtime, capture) = capturing_runtime();
    let logger: LoggerRef = capture.clone();

    let program = log_error::<String, ()>("dropped").with_logger_patch(LoggerPatch::remove(&logger));
    runtime.run_sync(&program);
    assert!(capture.entries().is_empty());
}

#[test]
fn test_tracing_logger_emits_events() {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    let runtime = Runtime::builder()
        .loggers(LoggerSet::of([Arc::new(TracingLogger::new()) as LoggerRef]))
        .build();
    let program = log_warning::<String, ()>("disk almost full").annotate_logs("disk", "sda1");

    tracing::subscriber::with_default(subscriber, || {
        runtime.run_sync(&program);
    });

    let text = buffer.text();
    let line = text
        .lines()
        .find(|line| line.contains("disk almost full"))
        .unwrap_or_else(|| panic!("no event in {text}"));
    assert!(line.contains("WARN"), "{line}");
    assert!(line.contains("disk=sda1"), "{line}");
}

#[tokio::test]
async fn test_span_elapsed_follows_runtime_clock() {
    let clock = Arc::new(eddy::testing::TestClock::new());
    let capture = Arc::new(CapturingLogger::new());
    let runtime = Runtime::builder()
        .clock(clock.clone())
        .loggers(LoggerSet::of([capture.clone() as LoggerRef]))
        .build();

    let program = Effect::<(), String>::sleep(Duration::seconds(3))
        .zip_right(log_info("slept"))
        .log_span("nap");
    let mut exit = Box::pin(runtime.run_fork(&program).await_exit());
    assert!(futures::poll!(exit.as_mut()).is_pending());

    clock.adjust(Duration::seconds(3));
    assert!(futures::poll!(exit.as_mut()).is_ready());

    let entries = capture.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].spans(), &[("nap".to_string(), 3_000)][..]);
    assert_eq!(entries[0].timestamp().timestamp_millis(), 3_000);
}

#[test]
fn test_panicking_sink_is_a_defect_at_the_log_call() {
    let logger: LoggerRef = Arc::new(|_: &LogEntry| panic!("sink exploded"));
    let runtime = Runtime::builder().loggers(LoggerSet::of([logger])).build();

    let recovered = log_info::<String, ()>("boom")
        .as_(1)
        .catch_all_cause(|cause| Effect::<i32, String>::succeed(if cause.is_die() { -1 } else { 0 }));

    assert_eq!(runtime.run_sync(&recovered), Either::right(-1));
}

#[test]
fn test_span_is_popped_when_fiber_is_interrupted() {
    let (runtime, capture) = capturing_runtime();

    let child = Effect::<(), String>::never()
        .on_interrupt(log_info("inside"))
        .log_span("s")
        .ensuring(log_info("outside"));
    let program = child
        .fork()
        .flat_map(|fiber| yield_now::<String, ()>().zip_right(fiber.interrupt()));

    let exit = runtime.run_sync(&program).unwrap_right();
    assert!(exit.is_interrupted());

    let entries = capture.entries();
    assert_eq!(capture.messages(), vec!["inside", "outside"]);
    let labels: Vec<&str> = entries[0].spans().iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(labels, vec!["s"]);
    assert!(entries[1].spans().is_empty());
}
