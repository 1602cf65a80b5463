//! Configuration management for the fetch gateway.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use crate::api::rate_limiter::RateLimits;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gateway settings
    pub gateway: GatewayConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Jikan API base URL
    pub base_url: String,

    /// Optional Accept-Language header sent with every request
    #[serde(default)]
    pub accept_language: Option<String>,

    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Delay before the single retry after a 429, in milliseconds
    pub retry_delay_ms: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per rolling second
    pub requests_per_second: usize,

    /// Maximum requests per rolling minute
    pub requests_per_minute: usize,

    /// Fixed delay between admitted requests, in milliseconds
    pub pacing_delay_ms: u64,
}

impl RateLimitConfig {
    /// Runtime limits for the rate limiter.
    pub fn limits(&self) -> RateLimits {
        RateLimits {
            max_per_second: self.requests_per_second,
            max_per_minute: self.requests_per_minute,
            pacing_delay: Duration::from_millis(self.pacing_delay_ms),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache entry time-to-live in seconds
    pub ttl_seconds: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                base_url: "https://api.jikan.moe/v4".to_string(),
                accept_language: None,
                rate_limit: RateLimitConfig {
                    requests_per_second: 3,
                    requests_per_minute: 60,
                    pacing_delay_ms: 666,
                },
                cache: CacheConfig { ttl_seconds: 600 },
                retry_delay_ms: 3000,
            },
            logging: LoggingConfig {
                log_dir: "data/logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a TOML file or fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.logging.log_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.base_url, "https://api.jikan.moe/v4");
        assert_eq!(config.gateway.rate_limit.requests_per_second, 3);
        assert_eq!(config.gateway.rate_limit.requests_per_minute, 60);
        assert_eq!(config.gateway.rate_limit.pacing_delay_ms, 666);
        assert_eq!(config.gateway.cache.ttl_seconds, 600);
        assert_eq!(config.gateway.retry_delay_ms, 3000);
        assert_eq!(config.gateway.accept_language, None);
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.gateway.accept_language = Some("ja-JP".to_string());
        original_config.save(&config_path)?;

        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path)?;
        assert_eq!(loaded_config.gateway.base_url, original_config.gateway.base_url);
        assert_eq!(
            loaded_config.gateway.accept_language,
            Some("ja-JP".to_string())
        );
        assert_eq!(
            loaded_config.gateway.rate_limit.pacing_delay_ms,
            original_config.gateway.rate_limit.pacing_delay_ms
        );

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        // Should return default config without error
        assert_eq!(config.gateway.base_url, "https://api.jikan.moe/v4");
    }

    #[test]
    fn test_limits_conversion() {
        let config = Config::default();
        let limits = config.gateway.rate_limit.limits();
        assert_eq!(limits.max_per_second, 3);
        assert_eq!(limits.max_per_minute, 60);
        assert_eq!(limits.pacing_delay, Duration::from_millis(666));
        assert_eq!(config.gateway.cache.ttl(), Duration::from_secs(600));
    }
}
