// ABOUTME: Typed environment variable parsing
// ABOUTME: Falls back to defaults with a warning when values are missing or malformed

use std::env;
use std::str::FromStr;
use tracing::warn;

/// Parse an environment variable, returning `default` when unset or invalid
pub fn parse_env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Invalid value '{}' for {}, using default {}",
                    raw, name, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a value that must fall inside `min..=max`, otherwise use `default`
pub fn parse_env_in_range<T>(name: &str, default: T, min: T, max: T) -> T
where
    T: FromStr + Copy + PartialOrd + std::fmt::Display,
{
    let value = parse_env_or_default(name, default);
    if value < min || value > max {
        warn!(
            "{} must be between {} and {}, got {}. Using default {}",
            name, min, max, value, default
        );
        return default;
    }
    value
}

/// Read a string variable, treating empty values as unset
pub fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_string_or(name: &str, default: &str) -> String {
    env_string(name).unwrap_or_else(|| default.to_string())
}
