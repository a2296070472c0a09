//! Do-notation: named bindings and the `effect_do!` macro.
//!
//! Two styles are available. The record style threads a [`Bindings`] value
//! through `bind` and `let_`:
//!
//! ```rust
//! use eddy::{Bindings, Effect, Either, Runtime};
//!
//! let effect = Effect::<Bindings, String>::do_()
//!     .bind("x", |_| Effect::succeed(20))
//!     .let_("y", |b| b.get::<i32>("x").copied().unwrap_or_default() + 1)
//!     .map(|b| b.get::<i32>("y").copied());
//!
//! assert_eq!(Runtime::default().run_sync(&effect), Either::right(Some(21)));
//! ```
//!
//! The macro style expands to nested `flat_map` calls:
//!
//! ```rust
//! use eddy::{effect_do, Effect, Either, Runtime};
//!
//! let effect = effect_do! {
//!     x <= Effect::<i32, String>::succeed(5);
//!     y <= Effect::succeed(10);
//!     let z = x + y;
//!     Effect::succeed(z * 2)
//! };
//!
//! assert_eq!(Runtime::default().run_sync(&effect), Either::right(30));
//! ```
//!
//! Each step becomes a `move` closure that may run once per run of the
//! effect, so values bound early and used two or more steps later must be
//! `Copy` or cloned explicitly.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::primitive::{boxed, unbox, Primitive};
use super::Effect;

/// Named values accumulated by [`Effect::bind`] and [`Effect::let_`].
#[derive(Clone, Default)]
pub struct Bindings {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Bindings {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value bound to `name`, if present with type `T`.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values.get(name).and_then(|value| value.downcast_ref::<T>())
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn with<T: Send + Sync + 'static>(mut self, name: String, value: T) -> Self {
        self.values.insert(name, Arc::new(value));
        self
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Bindings").field("names", &names).finish()
    }
}

impl<E, R> Effect<Bindings, E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Start a do-block with an empty record.
    pub fn do_() -> Self {
        Effect::succeed(Bindings::new())
    }

    /// Run the effect built from the current record and bind its value to
    /// `name`. A later binding of the same name shadows the earlier one.
    pub fn bind<T, F>(self, name: impl Into<String>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Bindings) -> Effect<T, E, R> + Send + Sync + 'static,
    {
        let name = name.into();
        let f = Arc::new(f);
        Effect::from_node(move || {
            let name = name.clone();
            let f = f.clone();
            Primitive::FlatMap(
                self.instruction(),
                Box::new(move |value| {
                    let bindings = unbox::<Bindings>(value);
                    f(&bindings)
                        .instruction()
                        .map(move |bound| boxed(bindings.with(name, unbox::<T>(bound))))
                }),
            )
        })
    }

    /// Bind the pure value computed from the current record to `name`.
    pub fn let_<T, F>(self, name: impl Into<String>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Bindings) -> T + Send + Sync + 'static,
    {
        let name = name.into();
        self.map(move |bindings| {
            let value = f(&bindings);
            bindings.with(name.clone(), value)
        })
    }
}

/// Do-notation for effects.
///
/// - `pattern <= effect;` binds the effect's success value.
/// - `let pattern = expr;` is a plain binding.
/// - The last expression must be an effect.
///
/// ```rust
/// use eddy::{effect_do, Effect, Either, Runtime};
///
/// let effect: Effect<i32, String> = effect_do! {
///     (a, b) <= Effect::succeed((2, 3));
///     _ <= Effect::<(), String>::succeed(());
///     Effect::succeed(a * b)
/// };
/// assert_eq!(Runtime::default().run_sync(&effect), Either::right(6));
/// ```
#[macro_export]
macro_rules! effect_do {
    ($pattern:ident <= $effect:expr ; $($rest:tt)+) => {
        ($effect).flat_map(move |$pattern| {
            $crate::effect_do!($($rest)+)
        })
    };

    (($($pattern:tt)*) <= $effect:expr ; $($rest:tt)+) => {
        ($effect).flat_map(move |($($pattern)*)| {
            $crate::effect_do!($($rest)+)
        })
    };

    (_ <= $effect:expr ; $($rest:tt)+) => {
        ($effect).flat_map(move |_| {
            $crate::effect_do!($($rest)+)
        })
    };

    (let $pattern:ident = $value:expr ; $($rest:tt)+) => {
        {
            let $pattern = $value;
            $crate::effect_do!($($rest)+)
        }
    };

    (let ($($pattern:tt)*) = $value:expr ; $($rest:tt)+) => {
        {
            let ($($pattern)*) = $value;
            $crate::effect_do!($($rest)+)
        }
    };

    ($result:expr) => {
        $result
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::either::Either;
    use crate::runtime::Runtime;

    #[test]
    fn test_bindings_lookup_is_typed() {
        let bindings = Bindings::new().with("n".to_string(), 3_i32);
        assert_eq!(bindings.get::<i32>("n"), Some(&3));
        assert_eq!(bindings.get::<String>("n"), None);
        assert!(bindings.contains("n"));
        assert_eq!(bindings.len(), 1);
        assert!(!Bindings::new().contains("n"));
    }

    #[test]
    fn test_bind_sees_earlier_names() {
        let effect = Effect::<Bindings, String>::do_()
            .bind("a", |_| Effect::succeed(4))
            .bind("b", |b| {
                let a = b.get::<i32>("a").copied().unwrap_or_default();
                Effect::succeed(a * 10)
            })
            .map(|b| (b.get::<i32>("a").copied(), b.get::<i32>("b").copied()));

        assert_eq!(
            Runtime::default().run_sync(&effect),
            Either::right((Some(4), Some(40)))
        );
    }

    #[test]
    fn test_bind_short_circuits_on_failure() {
        let effect = Effect::<Bindings, String>::do_()
            .bind("a", |_| Effect::<i32, String>::fail("nope".to_string()))
            .let_("never", |_| -> i32 { panic!("must not run") })
            .map(|b| b.len());

        assert_eq!(
            Runtime::default().run_sync(&effect),
            Either::left("nope".to_string())
        );
    }

    #[test]
    fn test_do_block_reruns_from_scratch() {
        let effect = Effect::<Bindings, String>::do_()
            .let_("x", |_| 1_u8)
            .map(|b| b.len());
        let runtime = Runtime::default();
        assert_eq!(runtime.run_sync(&effect), Either::right(1));
        assert_eq!(runtime.run_sync(&effect), Either::right(1));
    }

    #[test]
    fn test_macro_matches_nested_flat_map() {
        let sugared: Effect<i32, String> = crate::effect_do! {
            x <= Effect::succeed(3);
            let y = x + 1;
            (p, q) <= Effect::succeed((y, 2));
            _ <= Effect::<(), String>::succeed(());
            Effect::succeed(x + p * q)
        };
        let desugared = Effect::<i32, String>::succeed(3).flat_map(|x| {
            let y = x + 1;
            Effect::succeed((y, 2)).flat_map(move |(p, q)| Effect::succeed(x + p * q))
        });

        let runtime = Runtime::default();
        assert_eq!(runtime.run_sync(&sugared), runtime.run_sync(&desugared));
        assert_eq!(runtime.run_sync(&sugared), Either::right(11));
    }

    #[test]
    fn test_macro_short_circuits() {
        let effect: Effect<i32, String> = crate::effect_do! {
            x <= Effect::<i32, String>::fail("stop".to_string());
            Effect::succeed(x + 1)
        };
        assert_eq!(
            Runtime::default().run_sync(&effect),
            Either::left("stop".to_string())
        );
    }
}
