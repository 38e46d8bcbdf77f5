//! Helpers for reading configuration from environment variables
//!
//! Blank values and template placeholders such as `your_api_key_here` are
//! treated as absent, so a half-filled `.env` file behaves like a missing one.

use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Error raised when an environment variable is present but malformed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// Value could not be parsed into the expected type
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Returns true for values copied verbatim from an example env file
pub fn is_placeholder(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("your_") && lower.ends_with("_here")
}

/// Read a non-empty, non-placeholder string variable
pub fn env_string(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() || is_placeholder(trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Read and parse a variable, returning `Ok(None)` when it is absent
pub fn env_parse<T>(key: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    match env_string(key) {
        None => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(|e| EnvError::Invalid {
            key: key.to_string(),
            value,
            reason: e.to_string(),
        }),
    }
}
