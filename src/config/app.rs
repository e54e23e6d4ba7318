//! Application behaviour settings.

use super::parse::{env_bool, env_parse, Source};
use super::ConfigError;

/// Settings that change how the application registers and serves handlers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Validate handler signatures at registration (BLAZE_STRICT).
    pub strict: bool,
    /// Include failure traces in 500 responses (BLAZE_DEBUG).
    pub debug: bool,
    /// Blocking pool threads, 0 = CPU count (BLOCKING_WORKERS).
    pub blocking_workers: usize,
    /// Blocking pool queue slots, 0 = 100 per worker (BLOCKING_QUEUE).
    pub blocking_queue: usize,
    /// Install the access log middleware (ACCESS_LOG).
    pub access_log: bool,
}

impl AppConfig {
    /// Load from `src`. `dev` turns debug and the access log on unless they
    /// are set explicitly.
    pub fn from_source(src: &(impl Source + ?Sized), dev: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            strict: env_bool(src, "BLAZE_STRICT", false),
            debug: env_bool(src, "BLAZE_DEBUG", dev),
            blocking_workers: env_parse(src, "BLOCKING_WORKERS", 0)?,
            blocking_queue: env_parse(src, "BLOCKING_QUEUE", 0)?,
            access_log: env_bool(src, "ACCESS_LOG", dev),
        })
    }

    pub fn strict(mut self, on: bool) -> Self {
        self.strict = on;
        self
    }

    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    pub fn blocking_workers(mut self, workers: usize) -> Self {
        self.blocking_workers = workers;
        self
    }

    pub fn blocking_queue(mut self, capacity: usize) -> Self {
        self.blocking_queue = capacity;
        self
    }

    pub fn access_log(mut self, on: bool) -> Self {
        self.access_log = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let empty: &[(&str, &str)] = &[];
        assert_eq!(AppConfig::from_source(empty, false).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_dev_mode_defaults() {
        let empty: &[(&str, &str)] = &[];
        let config = AppConfig::from_source(empty, true).unwrap();
        assert!(config.debug);
        assert!(config.access_log);
        assert!(!config.strict);

        // explicit values still win
        let src: &[(&str, &str)] = &[("BLAZE_DEBUG", "off")];
        assert!(!AppConfig::from_source(src, true).unwrap().debug);
    }

    #[test]
    fn test_overrides() {
        let src: &[(&str, &str)] = &[
            ("BLAZE_STRICT", "1"),
            ("BLOCKING_WORKERS", "4"),
            ("BLOCKING_QUEUE", "16"),
        ];
        let config = AppConfig::from_source(src, false).unwrap();
        assert!(config.strict);
        assert_eq!(config.blocking_workers, 4);
        assert_eq!(config.blocking_queue, 16);
    }

    #[test]
    fn test_bad_worker_count() {
        let src: &[(&str, &str)] = &[("BLOCKING_WORKERS", "-1")];
        assert!(matches!(
            AppConfig::from_source(src, false),
            Err(ConfigError::Parse { ref key, .. }) if key == "BLOCKING_WORKERS"
        ));
    }

    #[test]
    fn test_builder() {
        let config = AppConfig::default().strict(true).debug(true).blocking_workers(2);
        assert!(config.strict && config.debug);
        assert_eq!(config.blocking_workers, 2);
    }
}
