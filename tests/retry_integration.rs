//! Integration tests for retrying effects against a manual clock.

use eddy::prelude::*;
use eddy::testing::{CapturingLogger, TestClock};
use eddy::logger::LoggerRef;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn flaky(failures: u32, attempts: &Arc<AtomicU32>) -> Effect<&'static str, String> {
    let attempts = attempts.clone();
    Effect::suspend(move || {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            Effect::fail(format!("attempt {} failed", n + 1))
        } else {
            Effect::succeed("connected")
        }
    })
}

#[tokio::test]
async fn test_retry_waits_on_the_runtime_clock() {
    let clock = Arc::new(TestClock::new());
    let runtime = Runtime::builder().clock(clock.clone()).build();
    let attempts = Arc::new(AtomicU32::new(0));

    let effect = flaky(2, &attempts)
        .retry(RetryPolicy::constant(Duration::seconds(1)).with_max_retries(5));
    let mut exit = Box::pin(runtime.run_fork(&effect).await_exit());

    assert!(futures::poll!(exit.as_mut()).is_pending());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(clock.sleepers(), 1);

    clock.adjust(Duration::seconds(1));
    assert!(futures::poll!(exit.as_mut()).is_pending());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    clock.adjust(Duration::seconds(1));
    match futures::poll!(exit.as_mut()) {
        std::task::Poll::Ready(exit) => assert_eq!(exit, Exit::succeed("connected")),
        std::task::Poll::Pending => panic!("retry should have succeeded"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_reports_attempts_and_delay() {
    let attempts = Arc::new(AtomicU32::new(0));
    let effect = flaky(u32::MAX, &attempts)
        .retry(RetryPolicy::linear(Duration::millis(10)).with_max_retries(3));

    let result = Runtime::default().run_promise(&effect).await;
    let exhausted = match result {
        Err(Cause::Fail(exhausted)) => exhausted,
        other => panic!("expected exhaustion, got {:?}", other),
    };
    assert_eq!(exhausted.attempts, 4);
    assert_eq!(exhausted.final_error, "attempt 4 failed");
    assert_eq!(exhausted.total_duration, Duration::millis(60));
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[test]
fn test_zero_delay_retry_runs_synchronously() {
    let attempts = Arc::new(AtomicU32::new(0));
    let effect = flaky(3, &attempts).retry(RetryPolicy::constant(Duration::ZERO).with_max_retries(3));

    assert_eq!(Runtime::default().run_sync(&effect), Either::right("connected"));
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[test]
fn test_retry_is_reusable() {
    let attempts = Arc::new(AtomicU32::new(0));
    let effect = flaky(0, &attempts).retry(RetryPolicy::constant(Duration::ZERO).with_max_retries(1));
    let runtime = Runtime::default();

    assert_eq!(runtime.run_sync(&effect), Either::right("connected"));
    assert_eq!(runtime.run_sync(&effect), Either::right("connected"));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_retry_with_recovery_and_logging() {
    let capture = Arc::new(CapturingLogger::new());
    let runtime = Runtime::builder()
        .loggers(LoggerSet::of([capture.clone() as LoggerRef]))
        .build();
    let attempts = Arc::new(AtomicU32::new(0));

    let effect = flaky(u32::MAX, &attempts)
        .retry(RetryPolicy::constant(Duration::ZERO).with_max_retries(2))
        .catch_all(|exhausted| {
            log_warning::<String, ()>(exhausted.to_string()).as_("offline")
        });

    assert_eq!(runtime.run_sync(&effect), Either::right("offline"));
    assert_eq!(
        capture.messages(),
        vec!["retry exhausted after 3 attempts (0ms): attempt 3 failed"]
    );
}
