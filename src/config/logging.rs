//! Logging configuration.

use std::fmt;

use super::parse::{env_opt, env_or, Source};
use super::ConfigError;

const DEFAULT_FILTER: &str = "blazeapi=info";

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable `tracing-subscriber` fmt output.
    Text,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => f.write_str("json"),
            LogFormat::Text => f.write_str("text"),
        }
    }
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    pub format: LogFormat,
    /// Service name for structured logging.
    pub service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Json,
            service_name: "blazeapi".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Load configuration from `src`.
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: blazeapi=debug,hyper=warn
    pub fn from_source(src: &(impl Source + ?Sized), dev: bool) -> Result<Self, ConfigError> {
        let format = match env_opt(src, "LOG_FORMAT").map(|v| v.to_ascii_lowercase()) {
            None => LogFormat::Json,
            Some(v) if v == "json" => LogFormat::Json,
            Some(v) if v == "text" => LogFormat::Text,
            Some(v) => {
                return Err(ConfigError::Parse {
                    key: "LOG_FORMAT".into(),
                    value: v,
                    error: "expected json or text".into(),
                })
            }
        };

        Ok(Self {
            filter: Self::resolve_log_filter(src, dev)?,
            format,
            service_name: env_or(src, "SERVICE_NAME", "blazeapi"),
        })
    }

    /// Priority: LOG_LEVEL > RUST_LOG > dev (debug) > default (info)
    fn resolve_log_filter(src: &(impl Source + ?Sized), dev: bool) -> Result<String, ConfigError> {
        if let Some(level) = env_opt(src, "LOG_LEVEL") {
            let level = level.to_lowercase();
            return match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(format!("blazeapi={}", level)),
                _ => Err(ConfigError::Parse {
                    key: "LOG_LEVEL".into(),
                    value: level,
                    error: "expected trace, debug, info, warn or error".into(),
                }),
            };
        }

        if let Some(filter) = env_opt(src, "RUST_LOG") {
            return Ok(filter);
        }

        if dev {
            return Ok("blazeapi=debug".to_string());
        }

        Ok(DEFAULT_FILTER.to_string())
    }
}
