//! Rate-limited access layer for the Jikan API v4
//! (MyAnimeList unofficial API).

pub mod client;
pub mod rate_limiter;
pub mod types;

pub use client::{FetchClient, HttpClient};
pub use rate_limiter::{RateLimiter, RateLimits};
pub use types::ApiRequest;
