//! Configuration loaded from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use blazeapi::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! ```

mod app;
mod error;
mod logging;
mod parse;
mod server;

pub use app::AppConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{Env, Source};
pub use server::ServerConfig;

use parse::env_bool;

/// Complete process configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub logging: LoggingConfig,
    /// Development mode (BLAZE_DEV).
    pub dev: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&Env)
    }

    pub fn from_source(src: &(impl Source + ?Sized)) -> Result<Self, ConfigError> {
        let dev = env_bool(src, "BLAZE_DEV", false);
        Ok(Self {
            server: ServerConfig::from_source(src)?,
            app: AppConfig::from_source(src, dev)?,
            logging: LoggingConfig::from_source(src, dev)?,
            dev,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Header timeout: {}s", self.server.header_timeout.as_secs());
        info!("  Drain timeout: {}s", self.server.drain_timeout.as_secs());

        if self.app.blocking_workers == 0 {
            info!("  Blocking workers: auto ({})", num_cpus::get());
        } else {
            info!("  Blocking workers: {}", self.app.blocking_workers);
        }
        if self.app.blocking_queue != 0 {
            info!("  Blocking queue: {}", self.app.blocking_queue);
        }

        info!("  Strict: {}", if self.app.strict { "enabled" } else { "disabled" });
        info!("  Debug: {}", if self.app.debug { "enabled" } else { "disabled" });
        info!(
            "  Access log: {}",
            if self.app.access_log { "enabled" } else { "disabled" }
        );
        info!("  Log: {} ({})", self.logging.filter, self.logging.format);

        if self.dev {
            info!("  Development mode: on");
        }
    }
}
