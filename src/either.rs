//! A sum type for one of two possible values.
//!
//! # Right-Biased Convention
//!
//! `Either` is "right-biased": methods like `map` and `and_then` operate on the
//! `Right` variant. Synchronous runs report their outcome as an `Either`, with
//! `Left` carrying the expected failure and `Right` the success value.
//!
//! # Examples
//!
//! ```rust
//! use eddy::Either;
//!
//! fn divide(a: i32, b: i32) -> Either<String, i32> {
//!     if b == 0 {
//!         Either::left("div0".to_string())
//!     } else {
//!         Either::right(a / b)
//!     }
//! }
//!
//! let description = divide(10, 2).fold(
//!     |err| format!("failed: {}", err),
//!     |n| format!("got {}", n),
//! );
//! assert_eq!(description, "got 5");
//! ```

use crate::effect::Effect;

/// A value that is either `Left(L)` or `Right(R)`.
///
/// Equality is structural. By convention `Right` is the "happy path".
///
/// # Example
///
/// ```rust
/// use eddy::Either;
///
/// let left: Either<i32, &str> = Either::left(42);
/// let right: Either<i32, &str> = Either::right("hello");
///
/// let result = right.fold(
///     |n| format!("number: {}", n),
///     |s| format!("string: {}", s),
/// );
/// assert_eq!(result, "string: hello");
/// assert!(left.is_left());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Either<L, R> {
    /// The left variant
    Left(L),
    /// The right variant
    Right(R),
}

impl<L, R> Either<L, R> {
    // ========== Constructors ==========

    /// Create a Left value.
    #[inline]
    pub fn left(value: L) -> Self {
        Either::Left(value)
    }

    /// Create a Right value.
    #[inline]
    pub fn right(value: R) -> Self {
        Either::Right(value)
    }

    // ========== Predicates ==========

    /// Returns `true` if this is a `Left` value.
    #[inline]
    pub fn is_left(&self) -> bool {
        matches!(self, Either::Left(_))
    }

    /// Returns `true` if this is a `Right` value.
    #[inline]
    pub fn is_right(&self) -> bool {
        matches!(self, Either::Right(_))
    }

    // ========== Extractors ==========

    /// Convert into the left value, if present.
    #[inline]
    pub fn into_left(self) -> Option<L> {
        match self {
            Either::Left(l) => Some(l),
            Either::Right(_) => None,
        }
    }

    /// Convert into the right value, if present.
    #[inline]
    pub fn into_right(self) -> Option<R> {
        match self {
            Either::Left(_) => None,
            Either::Right(r) => Some(r),
        }
    }

    /// Borrow the contents.
    #[inline]
    pub fn as_ref(&self) -> Either<&L, &R> {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => Either::Right(r),
        }
    }

    // ========== Transformations ==========

    /// Transform the left value, passing right values through unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use eddy::Either;
    ///
    /// let left: Either<i32, &str> = Either::left(21);
    /// assert_eq!(left.map_left(|x| x * 2), Either::left(42));
    /// ```
    #[inline]
    pub fn map_left<L2, F>(self, f: F) -> Either<L2, R>
    where
        F: FnOnce(L) -> L2,
    {
        match self {
            Either::Left(l) => Either::Left(f(l)),
            Either::Right(r) => Either::Right(r),
        }
    }

    /// Transform the right value (right-biased `map`).
    ///
    /// # Example
    ///
    /// ```rust
    /// use eddy::Either;
    ///
    /// let e: Either<&str, i32> = Either::right(21);
    /// assert_eq!(e.map(|x| x * 2), Either::right(42));
    /// ```
    #[inline]
    pub fn map<R2, F>(self, f: F) -> Either<L, R2>
    where
        F: FnOnce(R) -> R2,
    {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => Either::Right(f(r)),
        }
    }

    /// Transform both variants.
    #[inline]
    pub fn bimap<L2, R2, F, G>(self, f: F, g: G) -> Either<L2, R2>
    where
        F: FnOnce(L) -> L2,
        G: FnOnce(R) -> R2,
    {
        match self {
            Either::Left(l) => Either::Left(f(l)),
            Either::Right(r) => Either::Right(g(r)),
        }
    }

    /// Swap Left and Right.
    #[inline]
    pub fn swap(self) -> Either<R, L> {
        match self {
            Either::Left(l) => Either::Right(l),
            Either::Right(r) => Either::Left(r),
        }
    }

    /// Fold both variants into a single value.
    #[inline]
    pub fn fold<T, F, G>(self, left_fn: F, right_fn: G) -> T
    where
        F: FnOnce(L) -> T,
        G: FnOnce(R) -> T,
    {
        match self {
            Either::Left(l) => left_fn(l),
            Either::Right(r) => right_fn(r),
        }
    }

    /// Chain a computation on the right value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use eddy::Either;
    ///
    /// let right: Either<&str, i32> = Either::right(21);
    /// let left: Either<&str, i32> = Either::left("error");
    ///
    /// assert_eq!(right.and_then(|x| Either::right(x * 2)), Either::right(42));
    /// assert_eq!(left.and_then(|x| Either::right(x * 2)), Either::left("error"));
    /// ```
    #[inline]
    pub fn and_then<R2, F>(self, f: F) -> Either<L, R2>
    where
        F: FnOnce(R) -> Either<L, R2>,
    {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => f(r),
        }
    }

    /// Chain a computation on the left value.
    #[inline]
    pub fn or_else<L2, F>(self, f: F) -> Either<L2, R>
    where
        F: FnOnce(L) -> Either<L2, R>,
    {
        match self {
            Either::Left(l) => f(l),
            Either::Right(r) => Either::Right(r),
        }
    }

    /// Extract the right value, panicking if Left.
    ///
    /// # Panics
    ///
    /// Panics if the value is a `Left`.
    #[inline]
    pub fn unwrap_right(self) -> R {
        match self {
            Either::Left(_) => panic!("called `Either::unwrap_right()` on a `Left` value"),
            Either::Right(r) => r,
        }
    }

    /// Extract the left value, panicking if Right.
    ///
    /// # Panics
    ///
    /// Panics if the value is a `Right`.
    #[inline]
    pub fn unwrap_left(self) -> L {
        match self {
            Either::Left(l) => l,
            Either::Right(_) => panic!("called `Either::unwrap_left()` on a `Right` value"),
        }
    }

    /// Return the right value or a default.
    #[inline]
    pub fn right_or(self, default: R) -> R {
        match self {
            Either::Left(_) => default,
            Either::Right(r) => r,
        }
    }

    // ========== Conversions ==========

    /// Convert to Result (Right becomes Ok, Left becomes Err).
    #[inline]
    pub fn into_result(self) -> Result<R, L> {
        match self {
            Either::Left(l) => Err(l),
            Either::Right(r) => Ok(r),
        }
    }

    /// Create from Result (Ok becomes Right, Err becomes Left).
    #[inline]
    pub fn from_result(result: Result<R, L>) -> Self {
        match result {
            Ok(r) => Either::Right(r),
            Err(l) => Either::Left(l),
        }
    }

    /// Lift into an effect: `Left` fails with the value, `Right` succeeds with it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use eddy::{Either, Runtime};
    ///
    /// let runtime = Runtime::default();
    /// let effect = Either::<String, i32>::right(7).into_effect::<()>();
    /// assert_eq!(runtime.run_sync(&effect), Either::right(7));
    /// ```
    pub fn into_effect<Env>(self) -> Effect<R, L, Env>
    where
        L: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        Env: Send + Sync + 'static,
    {
        Effect::from_either(self)
    }
}

// Flatten for nested Either
impl<L, R> Either<L, Either<L, R>> {
    /// Flatten a nested Either.
    #[inline]
    pub fn flatten(self) -> Either<L, R> {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(inner) => inner,
        }
    }
}

impl<L, R> From<Result<R, L>> for Either<L, R> {
    fn from(result: Result<R, L>) -> Self {
        Either::from_result(result)
    }
}

impl<L, R> From<Either<L, R>> for Result<R, L> {
    fn from(either: Either<L, R>) -> Self {
        either.into_result()
    }
}

/// Partition an iterator of Either into two vectors.
///
/// # Example
///
/// ```rust
/// use eddy::either::{partition, Either};
///
/// let items = vec![Either::left(1), Either::right("a"), Either::left(2)];
/// let (lefts, rights) = partition(items);
/// assert_eq!(lefts, vec![1, 2]);
/// assert_eq!(rights, vec!["a"]);
/// ```
pub fn partition<L, R, I>(iter: I) -> (Vec<L>, Vec<R>)
where
    I: IntoIterator<Item = Either<L, R>>,
{
    let mut lefts = Vec::new();
    let mut rights = Vec::new();
    for item in iter {
        match item {
            Either::Left(l) => lefts.push(l),
            Either::Right(r) => rights.push(r),
        }
    }
    (lefts, rights)
}
