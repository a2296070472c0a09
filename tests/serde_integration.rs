//! Serialization of the value types, behind the `serde` feature.
#![cfg(feature = "serde")]

use eddy::logger::LogLevel;
use eddy::{Duration, Either};

#[test]
fn test_duration_serializes_as_millis() {
    let json = serde_json::to_string(&Duration::seconds(90)).unwrap();
    assert_eq!(json, "90000");

    let parsed: Duration = serde_json::from_str("250").unwrap();
    assert_eq!(parsed, Duration::millis(250));
}

#[test]
fn test_either_uses_variant_names() {
    let right: Either<String, i32> = Either::right(7);
    assert_eq!(serde_json::to_string(&right).unwrap(), r#"{"Right":7}"#);

    let left: Either<String, i32> = serde_json::from_str(r#"{"Left":"nope"}"#).unwrap();
    assert_eq!(left, Either::left("nope".to_string()));
}

#[test]
fn test_log_level_round_trips_through_config() {
    #[derive(serde::Deserialize)]
    struct LoggingConfig {
        level: LogLevel,
        span_budget: Duration,
    }

    let config: LoggingConfig =
        serde_json::from_str(r#"{"level":"Warning","span_budget":1500}"#).unwrap();
    assert_eq!(config.level, LogLevel::Warning);
    assert_eq!(config.span_budget, Duration::millis(1500));
}
