//! Dedup/cache gateway: the front door for all Jikan API calls.
//!
//! Data flow: caller -> cache check -> in-flight coalescing -> rate
//! limiter -> fetch client -> single retry on 429 -> cache write-back.
//! The gateway is an explicitly constructed context object; create it
//! once at startup and share it by handle.

use crate::api::client::{FetchClient, HttpClient};
use crate::api::rate_limiter::RateLimiter;
use crate::api::types::ApiRequest;
use crate::cache::{CacheStats, ResponseCache};
use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::single_flight::SingleFlight;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Rate-limited, deduplicating request gateway.
pub struct Gateway {
    fetch: Arc<dyn FetchClient>,
    limiter: RateLimiter,
    cache: ResponseCache,
    flights: SingleFlight<Result<Arc<Value>, ApiError>>,
    retry_delay: Duration,
}

impl Gateway {
    /// Create a gateway in front of the given fetch client.
    pub fn new(fetch: Arc<dyn FetchClient>, config: &GatewayConfig) -> Self {
        Self {
            fetch,
            limiter: RateLimiter::new(config.rate_limit.limits()),
            cache: ResponseCache::new(config.cache.ttl()),
            flights: SingleFlight::new(),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Create a gateway backed by the real HTTP client from configuration.
    pub fn from_config(config: &GatewayConfig) -> crate::Result<Self> {
        let client = HttpClient::new(config.base_url.clone(), config.accept_language.clone())?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Issue a request through the cache, the in-flight registry, and
    /// the rate limiter.
    ///
    /// A valid cache entry is returned without any queue interaction.
    /// Concurrent calls with the same request key share one underlying
    /// fetch and receive the same payload. On a 429 from upstream, the
    /// call is re-issued through the limiter exactly once after a fixed
    /// delay; a second 429 is terminal. Failures are never cached.
    pub async fn request(&self, request: ApiRequest) -> Result<Arc<Value>, ApiError> {
        let key = request.cache_key();

        if let Some(payload) = self.cache.get(&key).await {
            return Ok(payload);
        }

        let fetch = Arc::clone(&self.fetch);
        let limiter = self.limiter.clone();
        let cache = self.cache.clone();
        let retry_delay = self.retry_delay;
        let owned_key = key.clone();

        self.flights
            .run(&key, move || async move {
                let result = fetch_with_retry(fetch, limiter, request, retry_delay).await;
                if let Ok(payload) = &result {
                    cache.insert(owned_key, Arc::clone(payload)).await;
                }
                result
            })
            .await
    }

    /// Current gateway statistics.
    pub async fn stats(&self) -> GatewayStats {
        GatewayStats {
            cache: self.cache.stats().await,
            in_flight: self.flights.in_flight_count().await,
            queued: self.limiter.queue_len().await,
            admitted_last_minute: self.limiter.admitted_last_minute().await,
        }
    }
}

/// Snapshot of gateway state.
#[derive(Debug, Clone)]
pub struct GatewayStats {
    pub cache: CacheStats,
    pub in_flight: usize,
    pub queued: usize,
    pub admitted_last_minute: usize,
}

/// Run one fetch through the limiter, with a single delayed retry when
/// upstream signals rate-limit rejection. Every other error is terminal
/// immediately.
async fn fetch_with_retry(
    fetch: Arc<dyn FetchClient>,
    limiter: RateLimiter,
    request: ApiRequest,
    retry_delay: Duration,
) -> Result<Arc<Value>, ApiError> {
    let attempt = {
        let fetch = Arc::clone(&fetch);
        let request = request.clone();
        limiter
            .submit(move || async move { fetch.fetch(&request).await })
            .await
    };

    match attempt {
        Err(ApiError::RateLimited) => {
            warn!(
                endpoint = %request,
                delay_ms = retry_delay.as_millis() as u64,
                "429 Too Many Requests, retrying once after delay"
            );
            sleep(retry_delay).await;

            limiter
                .submit(move || async move { fetch.fetch(&request).await })
                .await
                .map(Arc::new)
        }
        other => {
            if other.is_ok() {
                debug!(endpoint = %request, "Request successful");
            }
            other.map(Arc::new)
        }
    }
}
