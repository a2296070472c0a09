//! Integration tests for loops, collections, conditionals and resources.

use eddy::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn run<A: Send + 'static>(effect: &Effect<A, String>) -> Either<String, A> {
    Runtime::default().run_sync(effect)
}

#[test]
fn test_loop_collect_counts_up() {
    let effect = Effect::loop_collect(1, |n| *n <= 5, |n| n + 1, |n| Effect::<i32, String>::succeed(*n));
    assert_eq!(run(&effect), Either::right(vec![1, 2, 3, 4, 5]));
}

#[test]
fn test_loop_collect_with_false_condition_is_empty() {
    let effect = Effect::loop_collect(10, |n| *n < 5, |n| n + 1, |n| Effect::<i32, String>::succeed(*n));
    assert_eq!(run(&effect), Either::right(vec![]));
}

#[test]
fn test_loop_discard_runs_body_each_step() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let effect = Effect::<(), String>::loop_discard(0, |n| *n < 5, |n| n + 1, move |_| {
        let counter = counter.clone();
        Effect::<usize, String>::sync(move || counter.fetch_add(1, Ordering::SeqCst))
    });

    assert_eq!(run(&effect), Either::right(()));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[test]
fn test_loop_stops_at_first_failure() {
    let effect = Effect::loop_collect(0, |n| *n < 10, |n| n + 1, |n| {
        if *n == 3 {
            Effect::<i32, String>::fail("three".to_string())
        } else {
            Effect::succeed(*n)
        }
    });
    assert_eq!(run(&effect), Either::left("three".to_string()));
}

#[test]
fn test_long_loop_is_stack_safe() {
    let effect = Effect::<(), String>::loop_discard(0u32, |n| *n < 100_000, |n| n + 1, |_| {
        Effect::<(), String>::succeed(())
    });
    assert_eq!(run(&effect), Either::right(()));
}

#[test]
fn test_for_each_keeps_order() {
    let effect = Effect::for_each(vec![1, 2, 3], |i| Effect::<i32, String>::succeed(i * 2));
    assert_eq!(run(&effect), Either::right(vec![2, 4, 6]));
}

#[test]
fn test_for_each_discard_visits_every_item() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let effect = Effect::<(), String>::for_each_discard(vec!["a", "b", "c"], move |item| {
        let sink = sink.clone();
        Effect::<(), String>::sync(move || sink.lock().unwrap().push(item))
    });

    assert_eq!(run(&effect), Either::right(()));
    assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn test_all_short_circuits_on_failure() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    let effect = Effect::all(vec![
        Effect::<i32, String>::succeed(1),
        Effect::fail("second".to_string()),
        Effect::sync(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            3
        }),
    ]);

    assert_eq!(run(&effect), Either::left("second".to_string()));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn test_all_discard_runs_in_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let step = |n: i32| {
        let order = order.clone();
        Effect::<(), String>::sync(move || order.lock().unwrap().push(n))
    };
    let effect = Effect::<(), String>::all_discard(vec![step(1), step(2), step(3)]);

    assert_eq!(run(&effect), Either::right(()));
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_all_of_nothing_is_empty() {
    let effect = Effect::all(Vec::<Effect<i32, String>>::new());
    assert_eq!(run(&effect), Either::right(vec![]));
}

#[test]
fn test_all_tuple_mixes_types() {
    let effect = Effect::all_tuple((
        Effect::<i32, String>::succeed(1),
        Effect::succeed("two".to_string()),
    ));
    assert_eq!(run(&effect), Either::right((1, "two".to_string())));
}

#[test]
fn test_iterate_threads_state() {
    let effect = Effect::<i32, String>::iterate(1, |n| *n < 100, |n| Effect::succeed(n * 3));
    assert_eq!(run(&effect), Either::right(243));
}

#[test]
fn test_when_and_unless() {
    assert_eq!(
        run(&Effect::<i32, String>::succeed(1).when(|| true)),
        Either::right(Some(1))
    );
    assert_eq!(
        run(&Effect::<i32, String>::succeed(1).when(|| false)),
        Either::right(None)
    );
    assert_eq!(
        run(&Effect::<i32, String>::succeed(1).unless(|| true)),
        Either::right(None)
    );
}

#[test]
fn test_when_checks_predicate_on_each_run() {
    let flag = Arc::new(AtomicUsize::new(0));
    let reader = flag.clone();
    let effect = Effect::<&str, String>::succeed("ran").when(move || reader.load(Ordering::SeqCst) > 0);

    assert_eq!(run(&effect), Either::right(None));
    flag.store(1, Ordering::SeqCst);
    assert_eq!(run(&effect), Either::right(Some("ran")));
}

#[test]
fn test_when_effect_skips_body_on_false() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    let body = Effect::<(), String>::sync(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(
        run(&body.clone().when_effect(Effect::succeed(false))),
        Either::right(None)
    );
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(
        run(&body.unless_effect(Effect::succeed(false))),
        Either::right(Some(()))
    );
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn test_if_effect_picks_branch() {
    let branch = |flag: bool| {
        Effect::<bool, String>::succeed(flag).if_effect(Effect::succeed("yes"), Effect::succeed("no"))
    };
    assert_eq!(run(&branch(true)), Either::right("yes"));
    assert_eq!(run(&branch(false)), Either::right("no"));
}

fn tracked(
    log: &Arc<Mutex<Vec<String>>>,
    name: &'static str,
) -> Resource<&'static str, String> {
    let (on_open, on_close) = (log.clone(), log.clone());
    Effect::acquire_release(
        Effect::sync(move || {
            on_open.lock().unwrap().push(format!("open {name}"));
            name
        }),
        move |resource| {
            let on_close = on_close.clone();
            Effect::sync(move || on_close.lock().unwrap().push(format!("close {resource}")))
        },
    )
}

#[test]
fn test_nested_resources_release_in_reverse_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let inner = tracked(&log, "b");
    let effect = tracked(&log, "a").use_(move |a| {
        let a = *a;
        inner.use_(move |b| Effect::succeed(format!("{a}+{b}")))
    });

    assert_eq!(run(&effect), Either::right("a+b".to_string()));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["open a", "open b", "close b", "close a"]
    );
}

#[test]
fn test_resource_released_when_use_dies() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let effect = tracked(&log, "a").use_(|_| Effect::<i32, String>::sync(|| panic!("use blew up")));

    let exit = Runtime::default().run_sync_exit(&effect);
    assert!(exit.is_die());
    assert_eq!(*log.lock().unwrap(), vec!["open a", "close a"]);
}

#[test]
fn test_failed_acquire_skips_release() {
    let released = Arc::new(AtomicUsize::new(0));
    let counter = released.clone();
    let effect = Effect::acquire_use_release(
        Effect::<i32, String>::fail("no handle".to_string()),
        |n| Effect::succeed(*n),
        move |_| {
            let counter = counter.clone();
            Effect::sync(move || counter.fetch_add(1, Ordering::SeqCst))
        },
    );

    assert_eq!(run(&effect), Either::left("no handle".to_string()));
    assert_eq!(released.load(Ordering::SeqCst), 0);
}

#[test]
fn test_resource_is_acquired_per_run() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let effect = tracked(&log, "a").use_(|a| Effect::succeed(a.len()));

    assert_eq!(run(&effect), Either::right(1));
    assert_eq!(run(&effect), Either::right(1));
    assert_eq!(log.lock().unwrap().len(), 4);
}

#[test]
fn test_effect_do_chains_steps() {
    let effect = effect_do! {
        a <= Effect::<i32, String>::succeed(2);
        (b, c) <= Effect::succeed((3, 4));
        let sum = a + b + c;
        _ <= log_debug(format!("sum is {sum}"));
        Effect::succeed(sum * 10)
    };
    assert_eq!(run(&effect), Either::right(90));
}
