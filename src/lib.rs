//! Rate-limited, deduplicating fetch gateway for the Jikan API v4.
//!
//! This library is the API access layer of a Jikan-backed catalog
//! application. It coordinates every outbound call through three layers:
//!
//! - a FIFO [`api::RateLimiter`] that admits at most 3 requests per
//!   rolling second and 60 per rolling minute, with a fixed pacing delay
//!   between admissions;
//! - a [`gateway::Gateway`] that serves repeat calls from a TTL
//!   [`cache::ResponseCache`], coalesces concurrent identical calls via
//!   [`single_flight::SingleFlight`], and retries exactly once after a
//!   429 from upstream;
//! - a pluggable [`api::FetchClient`] that performs the actual HTTP call.
//!
//! Construct one [`Gateway`] at startup and share it by handle; there is
//! no hidden global state.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod single_flight;

pub use api::{ApiRequest, FetchClient, HttpClient, RateLimiter, RateLimits};
pub use cache::{CacheStats, ResponseCache};
pub use config::{CacheConfig, Config, GatewayConfig, LoggingConfig, RateLimitConfig};
pub use error::ApiError;
pub use gateway::{Gateway, GatewayStats};
pub use logging::LogConfig;
pub use single_flight::SingleFlight;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
