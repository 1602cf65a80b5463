//! Queue-based rate limiter for outbound API requests.
//!
//! Enforces both per-second and per-minute sliding-window limits while
//! preserving FIFO order among pending requests. Submissions are queued
//! as opaque thunks and admitted by a single drain task; only one drain
//! task runs at a time, and submissions while it is active simply extend
//! the queue.

use crate::error::ApiError;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::{sleep, Instant};

const SECOND_WINDOW: Duration = Duration::from_secs(1);
const MINUTE_WINDOW: Duration = Duration::from_secs(60);
/// Minimum backoff when the per-second window is full.
const MIN_BACKOFF: Duration = Duration::from_millis(100);

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Admission limits enforced by the limiter.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Maximum admissions per rolling 1-second window.
    pub max_per_second: usize,
    /// Maximum admissions per rolling 60-second window.
    pub max_per_minute: usize,
    /// Fixed delay after each admitted request.
    pub pacing_delay: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            max_per_second: 3,
            max_per_minute: 60,
            pacing_delay: Duration::from_millis(666),
        }
    }
}

/// Queue and admission ledger, guarded together: the drain loop mutates
/// both in one step.
struct State {
    queue: VecDeque<Job>,
    ledger: VecDeque<Instant>,
    draining: bool,
}

/// Rate limiter with dual sliding-window constraints and FIFO fairness.
///
/// Cloning is cheap and shares the same queue and ledger.
#[derive(Clone)]
pub struct RateLimiter {
    limits: RateLimits,
    state: Arc<Mutex<State>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            state: Arc::new(Mutex::new(State {
                queue: VecDeque::new(),
                ledger: VecDeque::with_capacity(limits.max_per_minute),
                draining: false,
            })),
        }
    }

    /// Enqueue a request thunk and wait for its result.
    ///
    /// The returned future settles exactly when the thunk eventually
    /// executes and settles. Thunk errors propagate to this caller only;
    /// the drain loop logs them and moves on to the next queued item.
    pub async fn submit<T, F, Fut>(&self, thunk: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = thunk().await;
            if let Err(error) = &result {
                tracing::warn!(error = %error, "queued request failed");
            }
            // The caller may have stopped waiting; nothing to do then.
            let _ = tx.send(result);
        });

        {
            let mut state = self.state.lock().await;
            state.queue.push_back(job);
            if !state.draining {
                state.draining = true;
                tokio::spawn(Self::drain(self.limits, Arc::clone(&self.state)));
            }
        }

        rx.await.map_err(|_| {
            ApiError::Internal("queued request was dropped before completion".to_string())
        })?
    }

    /// Number of admissions recorded in the trailing 60-second window.
    pub async fn admitted_last_minute(&self) -> usize {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state
            .ledger
            .retain(|admitted| now.duration_since(*admitted) < MINUTE_WINDOW);
        state.ledger.len()
    }

    /// Number of thunks currently waiting for admission.
    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Drain loop: admits queued thunks while respecting both windows.
    ///
    /// An explicit loop with awaited sleeps; every back-off re-checks the
    /// windows from scratch. Exits (and clears the `draining` flag) once
    /// the queue is empty.
    async fn drain(limits: RateLimits, state: Arc<Mutex<State>>) {
        loop {
            let backoff = {
                let mut state = state.lock().await;
                if state.queue.is_empty() {
                    state.draining = false;
                    return;
                }

                let now = Instant::now();
                // Strict comparison: an entry exactly at the window edge
                // has already fallen out of the window.
                state
                    .ledger
                    .retain(|admitted| now.duration_since(*admitted) < MINUTE_WINDOW);

                if state.ledger.len() >= limits.max_per_minute {
                    // Hard backstop; normally unreachable while the
                    // per-second window is doing its job.
                    Some((MINUTE_WINDOW, "per-minute"))
                } else {
                    let mut oldest_recent = None;
                    let mut recent = 0usize;
                    for admitted in &state.ledger {
                        if now.duration_since(*admitted) < SECOND_WINDOW {
                            if oldest_recent.is_none() {
                                oldest_recent = Some(*admitted);
                            }
                            recent += 1;
                        }
                    }

                    if recent >= limits.max_per_second {
                        // Wait until the oldest recent admission ages out.
                        let wait = oldest_recent
                            .map(|oldest| SECOND_WINDOW.saturating_sub(now.duration_since(oldest)))
                            .unwrap_or(SECOND_WINDOW);
                        Some((wait.max(MIN_BACKOFF), "per-second"))
                    } else {
                        None
                    }
                }
            };

            if let Some((wait, window)) = backoff {
                tracing::debug!(
                    wait_ms = wait.as_millis() as u64,
                    window = window,
                    "rate limit window full, backing off"
                );
                sleep(wait).await;
                continue;
            }

            let job = {
                let mut state = state.lock().await;
                let Some(job) = state.queue.pop_front() else {
                    state.draining = false;
                    return;
                };
                state.ledger.push_back(Instant::now());
                job
            };

            // Run the thunk on its own task so a panic cannot take the
            // drain loop down with it.
            if let Err(error) = tokio::spawn(job).await {
                tracing::warn!(error = %error, "queued request panicked");
            }

            sleep(limits.pacing_delay).await;
        }
    }
}
