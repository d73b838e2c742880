//! Environment variable parsing
//!
//! The runtime's knobs (table size, log level, demo tunables) all come
//! in through `DOMINT_*` variables. Values are trimmed before parsing,
//! and anything unparsable falls back to the built-in default rather
//! than erroring: a bad variable must not keep the runtime from coming
//! up.

use std::str::FromStr;

/// Parse an environment variable as `T`, falling back to `default`
/// when the variable is unset, empty, or unparsable.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean environment variable.
///
/// Recognizes "1", "true", "yes", "on" and "0", "false", "no", "off"
/// (case-insensitive). Unset or unrecognized values return the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
