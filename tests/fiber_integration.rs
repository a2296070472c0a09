//! Integration tests for forking, joining and interrupting fibers.

use eddy::assert_dies;
use eddy::prelude::*;
use eddy::runtime::FiberStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

fn record(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Effect<()> {
    let log = log.clone();
    Effect::sync(move || log.lock().unwrap().push(label))
}

#[tokio::test]
async fn test_fork_and_join_returns_child_value() {
    let program = Effect::<(), String>::sleep(Duration::millis(5))
        .as_(21)
        .fork()
        .flat_map(|fiber| fiber.join().map(|x| x * 2));

    let result = Runtime::default().run_promise(&program).await;
    assert_eq!(result, Ok(42));
}

#[tokio::test]
async fn test_join_adopts_child_failure() {
    let program = Effect::<i32, String>::fail("child failed".to_string())
        .fork()
        .flat_map(|fiber| fiber.join());

    let result = Runtime::default().run_promise(&program).await;
    assert_eq!(result, Err(Cause::Fail("child failed".to_string())));
}

#[tokio::test]
async fn test_forked_fibers_interleave() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let child = record(&log, "child start")
        .zip_right(yield_now())
        .zip_right(record(&log, "child end"));
    let parent = child.widen_err::<String>().fork().flat_map({
        let log = log.clone();
        move |fiber| {
            record(&log, "parent")
                .widen_err()
                .zip_right(fiber.join())
        }
    });

    let result = Runtime::default().run_promise(&parent).await;
    assert_eq!(result, Ok(()));
    let entries = log.lock().unwrap().clone();
    assert_eq!(entries.len(), 3);
    assert!(entries.contains(&"parent"));
    assert_eq!(&entries[entries.len() - 2..], &["child start", "child end"][..]);
}

#[tokio::test]
async fn test_interrupt_child_runs_finalizers_in_reverse_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let child = Effect::<(), String>::never()
        .ensuring(record(&log, "inner"))
        .ensuring(record(&log, "outer"));

    let program = child.fork().flat_map(|fiber| {
        yield_now::<String, ()>().zip_right(fiber.interrupt())
    });

    let exit = Runtime::default().run_promise(&program).await.unwrap();
    assert!(exit.is_interrupted());
    assert_eq!(*log.lock().unwrap(), vec!["inner", "outer"]);
}

#[tokio::test]
async fn test_interrupt_is_attributed_to_the_caller() {
    let program = Effect::<(), String>::never().fork().flat_map(|fiber| {
        fiber_id::<String, ()>().flat_map(move |me| {
            let fiber = fiber.clone();
            yield_now()
                .zip_right(fiber.interrupt())
                .map(move |exit| (me, exit))
        })
    });

    let (me, exit) = Runtime::default().run_promise(&program).await.unwrap();
    assert_eq!(exit, Exit::Failure(Cause::Interrupt(me)));
}

#[tokio::test]
async fn test_children_are_interrupted_when_parent_finishes() {
    let cleaned_up = Arc::new(AtomicBool::new(false));
    let flag = cleaned_up.clone();
    let child = Effect::<(), String>::never()
        .on_interrupt(Effect::sync(move || flag.store(true, Ordering::SeqCst)));

    let program = child
        .fork()
        .flat_map(|_fiber| yield_now().as_("parent done"));

    let result = Runtime::default().run_promise(&program).await;
    assert_eq!(result, Ok("parent done"));
    assert!(cleaned_up.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_uninterruptible_region_completes_before_interruption() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let child = Effect::<(), String>::sleep(Duration::millis(10))
        .zip_right(Effect::sync(move || flag.store(true, Ordering::SeqCst)))
        .uninterruptible();

    let program = child.fork().flat_map(|fiber| {
        yield_now::<String, ()>().zip_right(fiber.interrupt())
    });

    let exit = Runtime::default().run_promise(&program).await.unwrap();
    assert!(finished.load(Ordering::SeqCst));
    assert!(exit.is_interrupted() || exit.is_success());
}

#[tokio::test]
async fn test_second_join_dies() {
    let program = Effect::<i32, String>::succeed(1).fork().flat_map(|fiber| {
        let again = fiber.clone();
        fiber.join().zip_right(again.join())
    });

    let exit = Runtime::default().run_exit(&program).await;
    assert_dies!(exit, "already observed");
}

#[tokio::test]
async fn test_await_exit_reports_defect_as_data() {
    let program = Effect::<i32, String>::sync(|| panic!("child exploded"))
        .fork()
        .flat_map(|fiber| fiber.await_exit::<String, ()>());

    let exit = Runtime::default().run_promise(&program).await.unwrap();
    assert!(exit.is_die());
    assert_eq!(
        exit.cause().and_then(Cause::defect).map(Defect::message),
        Some("child exploded")
    );
}

#[tokio::test]
async fn test_run_fork_status_and_exit() {
    let runtime = Runtime::default();
    let fiber = runtime.run_fork(&Effect::<(), String>::sleep(Duration::millis(5)).as_(7));
    assert_ne!(fiber.status(), FiberStatus::Done);

    let exit = fiber.await_exit().await;
    assert_eq!(exit, Exit::succeed(7));
}

#[tokio::test]
async fn test_dropping_run_future_interrupts_root() {
    let cleaned_up = Arc::new(AtomicBool::new(false));
    let flag = cleaned_up.clone();
    let effect = Effect::<(), String>::never()
        .on_interrupt(Effect::sync(move || flag.store(true, Ordering::SeqCst)));

    let runtime = Runtime::default();
    let mut future = Box::pin(runtime.run_exit(&effect));
    assert!(futures::poll!(future.as_mut()).is_pending());
    drop(future);

    assert!(cleaned_up.load(Ordering::SeqCst));
}
