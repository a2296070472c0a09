//! Non-negative time spans with millisecond granularity.
//!
//! `Duration` is the time vocabulary of the runtime: sleeps, retry delays and
//! span timings are all expressed with it. Arithmetic saturates, so a
//! `Duration` is never negative and never wraps.
//!
//! # Examples
//!
//! ```rust
//! use eddy::Duration;
//!
//! let total = Duration::seconds(30).sum(Duration::minutes(1));
//! assert_eq!(total.to_millis(), 90_000);
//! assert!(Duration::seconds(30) < Duration::minutes(1));
//! assert_eq!(total.to_string(), "1m 30s");
//! ```

use std::fmt;
use std::str::FromStr;

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;

/// A non-negative quantity of elapsed time, stored as whole milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Duration {
    millis: u64,
}

impl Duration {
    /// The empty duration.
    pub const ZERO: Duration = Duration { millis: 0 };

    /// The largest representable duration; arithmetic saturates here.
    pub const INFINITY: Duration = Duration { millis: u64::MAX };

    /// Create a duration from milliseconds.
    pub const fn millis(millis: u64) -> Self {
        Duration { millis }
    }

    /// Create a duration from seconds.
    pub const fn seconds(seconds: u64) -> Self {
        Duration {
            millis: seconds.saturating_mul(MILLIS_PER_SECOND),
        }
    }

    /// Create a duration from minutes.
    pub const fn minutes(minutes: u64) -> Self {
        Duration {
            millis: minutes.saturating_mul(MILLIS_PER_MINUTE),
        }
    }

    /// Create a duration from hours.
    pub const fn hours(hours: u64) -> Self {
        Duration {
            millis: hours.saturating_mul(MILLIS_PER_HOUR),
        }
    }

    /// Create a duration from days.
    pub const fn days(days: u64) -> Self {
        Duration {
            millis: days.saturating_mul(MILLIS_PER_DAY),
        }
    }

    /// Total milliseconds.
    pub const fn to_millis(self) -> u64 {
        self.millis
    }

    /// Total whole seconds.
    pub const fn to_seconds(self) -> u64 {
        self.millis / MILLIS_PER_SECOND
    }

    /// Returns `true` for a zero-length duration.
    pub const fn is_zero(self) -> bool {
        self.millis == 0
    }

    /// Returns `true` for [`Duration::INFINITY`].
    pub const fn is_infinite(self) -> bool {
        self.millis == u64::MAX
    }

    /// Add two durations, saturating at [`Duration::INFINITY`].
    pub const fn sum(self, other: Duration) -> Duration {
        Duration {
            millis: self.millis.saturating_add(other.millis),
        }
    }

    /// Multiply by a factor, saturating at [`Duration::INFINITY`].
    pub const fn times(self, factor: u64) -> Duration {
        Duration {
            millis: self.millis.saturating_mul(factor),
        }
    }

    /// Subtract `other`, saturating at [`Duration::ZERO`].
    pub const fn subtract(self, other: Duration) -> Duration {
        Duration {
            millis: self.millis.saturating_sub(other.millis),
        }
    }

    /// Convert to a standard library duration.
    pub const fn to_std(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.millis)
    }
}

impl From<std::time::Duration> for Duration {
    /// Sub-millisecond precision is truncated.
    fn from(duration: std::time::Duration) -> Self {
        Duration {
            millis: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<Duration> for std::time::Duration {
    fn from(duration: Duration) -> Self {
        duration.to_std()
    }
}

impl std::ops::Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        self.sum(rhs)
    }
}

impl std::ops::Mul<u64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: u64) -> Duration {
        self.times(rhs)
    }
}

impl std::iter::Sum for Duration {
    fn sum<I: Iterator<Item = Duration>>(iter: I) -> Duration {
        iter.fold(Duration::ZERO, Duration::sum)
    }
}

impl fmt::Display for Duration {
    /// Renders the largest units first, e.g. `1d 2h 3m 4s 5ms`; zero renders as `0ms`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            return write!(f, "Infinity");
        }
        if self.millis == 0 {
            return write!(f, "0ms");
        }
        let units = [
            (MILLIS_PER_DAY, "d"),
            (MILLIS_PER_HOUR, "h"),
            (MILLIS_PER_MINUTE, "m"),
            (MILLIS_PER_SECOND, "s"),
            (1, "ms"),
        ];
        let mut rest = self.millis;
        let mut first = true;
        for (size, suffix) in units {
            let count = rest / size;
            rest %= size;
            if count == 0 {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}{}", count, suffix)?;
            first = false;
        }
        Ok(())
    }
}

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationParseError {
    input: String,
}

impl DurationParseError {
    /// The input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid duration {:?}: expected \"<count> <unit>\" such as \"30 seconds\"",
            self.input
        )
    }
}

impl std::error::Error for DurationParseError {}

impl FromStr for Duration {
    type Err = DurationParseError;

    /// Parses `"<count> <unit>"`, e.g. `"30 seconds"`, `"1 minute"`, `"250 millis"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || DurationParseError {
            input: s.to_string(),
        };
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("infinity") {
            return Ok(Duration::INFINITY);
        }
        let mut parts = trimmed.split_whitespace();
        let count: u64 = parts
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(error)?;
        let unit = parts.next().ok_or_else(error)?;
        if parts.next().is_some() {
            return Err(error());
        }
        let duration = match unit.to_ascii_lowercase().as_str() {
            "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => Duration::millis(count),
            "s" | "sec" | "secs" | "second" | "seconds" => Duration::seconds(count),
            "m" | "min" | "mins" | "minute" | "minutes" => Duration::minutes(count),
            "h" | "hour" | "hours" => Duration::hours(count),
            "d" | "day" | "days" => Duration::days(count),
            _ => return Err(error()),
        };
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_of_seconds_and_minutes() {
        let total = Duration::seconds(30).sum(Duration::minutes(1));
        assert_eq!(total.to_millis(), 90_000);
    }

    #[test]
    fn test_ordering() {
        assert!(Duration::seconds(30) < Duration::minutes(1));
        let mut items = vec![Duration::hours(1), Duration::millis(5), Duration::seconds(2)];
        items.sort();
        assert_eq!(
            items,
            vec![Duration::millis(5), Duration::seconds(2), Duration::hours(1)]
        );
        assert_eq!(
            Duration::seconds(1).max(Duration::millis(999)),
            Duration::seconds(1)
        );
    }

    #[test]
    fn test_arithmetic_saturates() {
        assert_eq!(Duration::INFINITY.sum(Duration::millis(1)), Duration::INFINITY);
        assert_eq!(Duration::INFINITY.times(2), Duration::INFINITY);
        assert_eq!(Duration::millis(1).subtract(Duration::seconds(1)), Duration::ZERO);
        assert_eq!(Duration::days(u64::MAX), Duration::INFINITY);
    }

    #[test]
    fn test_times() {
        assert_eq!(Duration::seconds(2).times(3), Duration::seconds(6));
        assert_eq!(Duration::seconds(2) * 0, Duration::ZERO);
    }

    #[test]
    fn test_std_conversion_truncates() {
        let d: Duration = std::time::Duration::from_micros(1_999).into();
        assert_eq!(d, Duration::millis(1));
        assert_eq!(Duration::seconds(1).to_std(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Duration::ZERO.to_string(), "0ms");
        assert_eq!(Duration::millis(250).to_string(), "250ms");
        assert_eq!(Duration::millis(90_500).to_string(), "1m 30s 500ms");
        assert_eq!(Duration::days(1).sum(Duration::hours(2)).to_string(), "1d 2h");
        assert_eq!(Duration::INFINITY.to_string(), "Infinity");
    }

    #[test]
    fn test_parse() {
        assert_eq!("30 seconds".parse::<Duration>(), Ok(Duration::seconds(30)));
        assert_eq!("1 minute".parse::<Duration>(), Ok(Duration::minutes(1)));
        assert_eq!("250 millis".parse::<Duration>(), Ok(Duration::millis(250)));
        assert_eq!(" 2 Hours ".parse::<Duration>(), Ok(Duration::hours(2)));
        assert_eq!("Infinity".parse::<Duration>(), Ok(Duration::INFINITY));
    }

    #[test]
    fn test_parse_errors() {
        let err = "ten seconds".parse::<Duration>().unwrap_err();
        assert_eq!(err.input(), "ten seconds");
        assert!("10".parse::<Duration>().is_err());
        assert!("10 fortnights".parse::<Duration>().is_err());
        assert!("10 seconds extra".parse::<Duration>().is_err());
        assert!(err.to_string().contains("invalid duration"));
    }

    #[test]
    fn test_iterator_sum() {
        let total: Duration = [Duration::seconds(1), Duration::millis(500)]
            .into_iter()
            .sum();
        assert_eq!(total, Duration::millis(1_500));
    }
}
