//! Collections, conditionals, loops and scoped resources.
//!
//! Everything here is sequential and order-preserving. Loops and traversals
//! are evaluated one step at a time by the runtime, so they are stack-safe
//! for any number of iterations.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::exit::{Cause, Defect};

use super::primitive::{boxed, unbox, Instruction, Primitive};
use super::Effect;

fn collect_all<A, E, R>(
    effects: Arc<Vec<Effect<A, E, R>>>,
    index: usize,
    mut acc: Vec<A>,
) -> Instruction
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    match effects.get(index) {
        None => Instruction::value(boxed(acc)),
        Some(effect) => effect.instruction().flat_map(move |value| {
            acc.push(unbox::<A>(value));
            collect_all(effects, index + 1, acc)
        }),
    }
}

fn run_all<A, E, R>(effects: Arc<Vec<Effect<A, E, R>>>, index: usize) -> Instruction
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    match effects.get(index) {
        None => Instruction::unit(),
        Some(effect) => effect
            .instruction()
            .flat_map(move |_| run_all(effects, index + 1)),
    }
}

type ItemFn<T, A, E, R> = Arc<dyn Fn(T) -> Effect<A, E, R> + Send + Sync>;

fn traverse<T, A, E, R>(
    items: Arc<Vec<T>>,
    f: ItemFn<T, A, E, R>,
    index: usize,
    acc: Option<Vec<A>>,
) -> Instruction
where
    T: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    let Some(item) = items.get(index).cloned() else {
        return match acc {
            Some(values) => Instruction::value(boxed(values)),
            None => Instruction::unit(),
        };
    };
    f(item).instruction().flat_map(move |value| {
        let acc = acc.map(|mut values| {
            values.push(unbox::<A>(value));
            values
        });
        traverse(items, f, index + 1, acc)
    })
}

struct Looping<S, A, E, R> {
    cont: Box<dyn Fn(&S) -> bool + Send + Sync>,
    inc: Box<dyn Fn(&S) -> S + Send + Sync>,
    body: Box<dyn Fn(&S) -> Effect<A, E, R> + Send + Sync>,
}

fn loop_step<S, A, E, R>(
    looping: Arc<Looping<S, A, E, R>>,
    state: S,
    acc: Option<Vec<A>>,
) -> Instruction
where
    S: Send + 'static,
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    if !(looping.cont)(&state) {
        return match acc {
            Some(values) => Instruction::value(boxed(values)),
            None => Instruction::unit(),
        };
    }
    (looping.body)(&state)
        .instruction()
        .flat_map(move |value| {
            let acc = acc.map(|mut values| {
                values.push(unbox::<A>(value));
                values
            });
            let next = (looping.inc)(&state);
            loop_step(looping, next, acc)
        })
}

type IterateBody<S, E, R> = Arc<dyn Fn(S) -> Effect<S, E, R> + Send + Sync>;
type Condition<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

fn iterate_step<S, E, R>(cont: Condition<S>, body: IterateBody<S, E, R>, state: S) -> Instruction
where
    S: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    if !cont(&state) {
        return Instruction::value(boxed(state));
    }
    body(state)
        .instruction()
        .flat_map(move |value| iterate_step(cont, body, unbox::<S>(value)))
}

/// Start a deferred computation once per run.
fn deferred<A, E, R>(start: impl Fn() -> Instruction + Send + Sync + 'static) -> Effect<A, E, R> {
    let start = Arc::new(start);
    Effect::from_node(move || {
        let start = start.clone();
        Primitive::FlatMap(Instruction::unit(), Box::new(move |_| start()))
    })
}

impl<A, E, R> Effect<Vec<A>, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Run effects one after another, collecting their values in order.
    ///
    /// The first failure stops the run; later effects do not execute, and
    /// the side effects of earlier ones remain.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// let all = Effect::all(vec![
    ///     Effect::<i32, String>::succeed(1),
    ///     Effect::succeed(2),
    ///     Effect::succeed(3),
    /// ]);
    /// assert_eq!(Runtime::default().run_sync(&all), Either::right(vec![1, 2, 3]));
    /// ```
    pub fn all(effects: impl IntoIterator<Item = Effect<A, E, R>>) -> Self {
        let effects: Arc<Vec<Effect<A, E, R>>> = Arc::new(effects.into_iter().collect());
        deferred(move || collect_all(effects.clone(), 0, Vec::with_capacity(effects.len())))
    }

    /// Run `f` for each item in order, collecting the values.
    pub fn for_each<T, I, F>(items: I, f: F) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Clone + Send + Sync + 'static,
        F: Fn(T) -> Effect<A, E, R> + Send + Sync + 'static,
    {
        let items: Arc<Vec<T>> = Arc::new(items.into_iter().collect());
        let f: ItemFn<T, A, E, R> = Arc::new(f);
        deferred(move || {
            traverse(
                items.clone(),
                f.clone(),
                0,
                Some(Vec::with_capacity(items.len())),
            )
        })
    }

    /// Loop from `initial` while `cont` holds, running `body` on each state
    /// and stepping with `inc`. Collects the body values in call order.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// let effect = Effect::loop_collect(1, |n| *n <= 5, |n| n + 1, |n| {
    ///     Effect::<i32, String>::succeed(*n)
    /// });
    /// assert_eq!(Runtime::default().run_sync(&effect), Either::right(vec![1, 2, 3, 4, 5]));
    /// ```
    pub fn loop_collect<S, C, I, B>(initial: S, cont: C, inc: I, body: B) -> Self
    where
        S: Clone + Send + Sync + 'static,
        C: Fn(&S) -> bool + Send + Sync + 'static,
        I: Fn(&S) -> S + Send + Sync + 'static,
        B: Fn(&S) -> Effect<A, E, R> + Send + Sync + 'static,
    {
        let looping = Arc::new(Looping {
            cont: Box::new(cont),
            inc: Box::new(inc),
            body: Box::new(body),
        });
        deferred(move || loop_step(looping.clone(), initial.clone(), Some(Vec::new())))
    }
}

impl<E, R> Effect<(), E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Run effects one after another, discarding their values.
    pub fn all_discard<A>(effects: impl IntoIterator<Item = Effect<A, E, R>>) -> Self
    where
        A: Send + 'static,
    {
        let effects: Arc<Vec<Effect<A, E, R>>> = Arc::new(effects.into_iter().collect());
        deferred(move || run_all(effects.clone(), 0))
    }

    /// Run `f` for each item in order, discarding the values.
    pub fn for_each_discard<A, T, I, F>(items: I, f: F) -> Self
    where
        A: Send + 'static,
        I: IntoIterator<Item = T>,
        T: Clone + Send + Sync + 'static,
        F: Fn(T) -> Effect<A, E, R> + Send + Sync + 'static,
    {
        let items: Arc<Vec<T>> = Arc::new(items.into_iter().collect());
        let f: ItemFn<T, A, E, R> = Arc::new(f);
        deferred(move || traverse(items.clone(), f.clone(), 0, None))
    }

    /// Like [`loop_collect`](Effect::loop_collect), discarding the body values.
    pub fn loop_discard<A, S, C, I, B>(initial: S, cont: C, inc: I, body: B) -> Self
    where
        A: Send + 'static,
        S: Clone + Send + Sync + 'static,
        C: Fn(&S) -> bool + Send + Sync + 'static,
        I: Fn(&S) -> S + Send + Sync + 'static,
        B: Fn(&S) -> Effect<A, E, R> + Send + Sync + 'static,
    {
        let looping = Arc::new(Looping {
            cont: Box::new(cont),
            inc: Box::new(inc),
            body: Box::new(body),
        });
        deferred(move || loop_step(looping.clone(), initial.clone(), None))
    }
}

impl<A, E, R> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Thread a state through `body` while `cont` holds; yields the final
    /// state.
    pub fn iterate<C, B>(initial: A, cont: C, body: B) -> Self
    where
        A: Clone + Sync,
        C: Fn(&A) -> bool + Send + Sync + 'static,
        B: Fn(A) -> Effect<A, E, R> + Send + Sync + 'static,
    {
        let cont: Condition<A> = Arc::new(cont);
        let body: IterateBody<A, E, R> = Arc::new(body);
        deferred(move || iterate_step(cont.clone(), body.clone(), initial.clone()))
    }

    /// Run a tuple of effects of different types in order.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    ///
    /// let effect = Effect::all_tuple((
    ///     Effect::<i32, String>::succeed(1),
    ///     Effect::succeed("two"),
    ///     Effect::succeed(3.0),
    /// ));
    /// assert_eq!(Runtime::default().run_sync(&effect), Either::right((1, "two", 3.0)));
    /// ```
    pub fn all_tuple<T>(effects: T) -> Self
    where
        T: AllTuple<Output = A, Error = E, Env = R>,
    {
        effects.all()
    }

    /// Run the effect only if `predicate` holds when it is reached.
    pub fn when<P>(self, predicate: P) -> Effect<Option<A>, E, R>
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let check: Effect<bool, E, R> = Effect::sync(move || predicate());
        self.when_effect(check)
    }

    /// Run the effect only if `predicate` does not hold when it is reached.
    pub fn unless<P>(self, predicate: P) -> Effect<Option<A>, E, R>
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        self.when(move || !predicate())
    }

    /// Run the effect only if `predicate` succeeds with `true`.
    pub fn when_effect(self, predicate: Effect<bool, E, R>) -> Effect<Option<A>, E, R> {
        Effect::from_node(move || {
            let effect = self.clone();
            Primitive::FlatMap(
                predicate.instruction(),
                Box::new(move |flag| {
                    if unbox::<bool>(flag) {
                        effect
                            .instruction()
                            .map(|value| boxed(Some(unbox::<A>(value))))
                    } else {
                        Instruction::value(boxed(None::<A>))
                    }
                }),
            )
        })
    }

    /// Run the effect only if `predicate` succeeds with `false`.
    pub fn unless_effect(self, predicate: Effect<bool, E, R>) -> Effect<Option<A>, E, R> {
        self.when_effect(predicate.map(|flag| !flag))
    }

    /// Acquire a resource and describe how to release it. Use it with
    /// [`Resource::use_`].
    pub fn acquire_release<X, F>(acquire: Effect<A, E, R>, release: F) -> Resource<A, E, R>
    where
        X: Send + 'static,
        F: Fn(A) -> Effect<X, Infallible, R> + Send + Sync + 'static,
    {
        Resource {
            acquire,
            release: Arc::new(move |resource| release(resource).unit()),
        }
    }

    /// Acquire a resource, use it, and release it.
    ///
    /// Acquisition cannot be interrupted. If it succeeds, `release` runs
    /// exactly once, uninterruptibly, whether `use_` succeeds, fails, dies
    /// or is interrupted. Nested resources are released in reverse order.
    ///
    /// ```rust
    /// use eddy::{Effect, Either, Runtime};
    /// use std::sync::{Arc, Mutex};
    ///
    /// let log = Arc::new(Mutex::new(Vec::new()));
    /// let (on_acquire, on_release) = (log.clone(), log.clone());
    ///
    /// let effect = Effect::acquire_use_release(
    ///     Effect::<&str, String>::sync(move || {
    ///         on_acquire.lock().unwrap().push("open");
    ///         "handle"
    ///     }),
    ///     |_| Effect::<i32, String>::fail("read failed".to_string()),
    ///     move |_| {
    ///         let on_release = on_release.clone();
    ///         Effect::sync(move || on_release.lock().unwrap().push("close"))
    ///     },
    /// );
    ///
    /// assert!(Runtime::default().run_sync(&effect).is_left());
    /// assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
    /// ```
    pub fn acquire_use_release<B, X, U, F>(
        acquire: Effect<A, E, R>,
        use_: U,
        release: F,
    ) -> Effect<B, E, R>
    where
        B: Send + 'static,
        X: Send + 'static,
        U: Fn(&A) -> Effect<B, E, R> + Send + Sync + 'static,
        F: Fn(A) -> Effect<X, Infallible, R> + Send + Sync + 'static,
    {
        Effect::acquire_release(acquire, release).use_(use_)
    }
}

type Release<A, R> = Arc<dyn Fn(A) -> Effect<(), Infallible, R> + Send + Sync>;

/// A resource paired with its release action.
///
/// Built by [`Effect::acquire_release`]. Every [`use_`](Resource::use_)
/// acquires a fresh resource and releases it when the use ends.
pub struct Resource<A, E = Infallible, R = ()> {
    acquire: Effect<A, E, R>,
    release: Release<A, R>,
}

impl<A, E, R> Resource<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Acquire the resource, run `f` with it, then release it.
    pub fn use_<B, F>(&self, f: F) -> Effect<B, E, R>
    where
        B: Send + 'static,
        F: Fn(&A) -> Effect<B, E, R> + Send + Sync + 'static,
    {
        let acquire = self.acquire.clone();
        let release = self.release.clone();
        let f = Arc::new(f);
        Effect::from_node(move || {
            let slot: Arc<Mutex<Option<A>>> = Arc::new(Mutex::new(None));
            let (store, read) = (slot.clone(), slot.clone());
            let (f, release) = (f.clone(), release.clone());

            let acquired = Instruction::build(Primitive::Uninterruptible(
                acquire.instruction().map(move |resource| {
                    *store.lock() = Some(unbox::<A>(resource));
                    boxed(())
                }),
            ));
            let used = acquired.flat_map(move |_| match read.lock().as_ref() {
                Some(resource) => f(resource).instruction(),
                None => Instruction::cause(Cause::Die(Defect::new(
                    "resource missing after acquisition",
                ))),
            });
            Primitive::Ensuring(
                used,
                Box::new(move |_| match slot.lock().take() {
                    Some(resource) => release(resource).instruction(),
                    None => Instruction::unit(),
                }),
            )
        })
    }
}

impl<A, E, R> Clone for Resource<A, E, R> {
    fn clone(&self) -> Self {
        Resource {
            acquire: self.acquire.clone(),
            release: self.release.clone(),
        }
    }
}

impl<A, E, R> fmt::Debug for Resource<A, E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("acquire", &self.acquire)
            .finish_non_exhaustive()
    }
}

/// Tuples of effects sharing an error and environment type, run in order
/// by [`Effect::all_tuple`].
pub trait AllTuple {
    /// The tuple of success values.
    type Output;
    /// The shared error type.
    type Error;
    /// The shared environment type.
    type Env;

    /// Run every effect in order, collecting the values.
    fn all(self) -> Effect<Self::Output, Self::Error, Self::Env>;
}

impl<A, B, E, R> AllTuple for (Effect<A, E, R>, Effect<B, E, R>)
where
    A: Send + 'static,
    B: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    type Output = (A, B);
    type Error = E;
    type Env = R;

    fn all(self) -> Effect<(A, B), E, R> {
        self.0.zip(self.1)
    }
}

impl<A, B, C, E, R> AllTuple for (Effect<A, E, R>, Effect<B, E, R>, Effect<C, E, R>)
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    type Output = (A, B, C);
    type Error = E;
    type Env = R;

    fn all(self) -> Effect<(A, B, C), E, R> {
        self.0
            .zip(self.1)
            .zip(self.2)
            .map(|((a, b), c)| (a, b, c))
    }
}

impl<A, B, C, D, E, R> AllTuple
    for (
        Effect<A, E, R>,
        Effect<B, E, R>,
        Effect<C, E, R>,
        Effect<D, E, R>,
    )
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    D: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    type Output = (A, B, C, D);
    type Error = E;
    type Env = R;

    fn all(self) -> Effect<(A, B, C, D), E, R> {
        self.0
            .zip(self.1)
            .zip(self.2)
            .zip(self.3)
            .map(|(((a, b), c), d)| (a, b, c, d))
    }
}

impl<A, B, C, D, F, E, R> AllTuple
    for (
        Effect<A, E, R>,
        Effect<B, E, R>,
        Effect<C, E, R>,
        Effect<D, E, R>,
        Effect<F, E, R>,
    )
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    D: Send + 'static,
    F: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    type Output = (A, B, C, D, F);
    type Error = E;
    type Env = R;

    fn all(self) -> Effect<(A, B, C, D, F), E, R> {
        self.0
            .zip(self.1)
            .zip(self.2)
            .zip(self.3)
            .zip(self.4)
            .map(|((((a, b), c), d), f)| (a, b, c, d, f))
    }
}

impl<A, B, C, D, F, G, E, R> AllTuple
    for (
        Effect<A, E, R>,
        Effect<B, E, R>,
        Effect<C, E, R>,
        Effect<D, E, R>,
        Effect<F, E, R>,
        Effect<G, E, R>,
    )
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    D: Send + 'static,
    F: Send + 'static,
    G: Send + 'static,
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    type Output = (A, B, C, D, F, G);
    type Error = E;
    type Env = R;

    fn all(self) -> Effect<(A, B, C, D, F, G), E, R> {
        self.0
            .zip(self.1)
            .zip(self.2)
            .zip(self.3)
            .zip(self.4)
            .zip(self.5)
            .map(|(((((a, b), c), d), f), g)| (a, b, c, d, f, g))
    }
}
