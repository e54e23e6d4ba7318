//! Environment variable parsing utilities.

use std::collections::HashMap;
use std::str::FromStr;

use super::ConfigError;

/// Where configuration values come from.
///
/// The process environment in production; a map in tests, so tests never
/// touch global state.
pub trait Source {
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct Env;

impl Source for Env {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Source for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl Source for [(&str, &str)] {
    fn get(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }
}

/// Get value with default.
pub fn env_or(src: &(impl Source + ?Sized), key: &str, default: &str) -> String {
    src.get(key).unwrap_or_else(|| default.to_string())
}

/// Get optional value (None if empty or missing).
pub fn env_opt(src: &(impl Source + ?Sized), key: &str) -> Option<String> {
    src.get(key).filter(|s| !s.is_empty())
}

/// Parse value as boolean.
/// Treats "1", "true", "yes", "on" (case-insensitive) as true.
pub fn env_bool(src: &(impl Source + ?Sized), key: &str, default: bool) -> bool {
    match env_opt(src, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

/// Parse value with type conversion. Empty or missing yields the default.
pub fn env_parse<T: FromStr>(
    src: &(impl Source + ?Sized),
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_opt(src, key) {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Parse {
            key: key.into(),
            value: v,
            error: e.to_string(),
        }),
        None => Ok(default),
    }
}
