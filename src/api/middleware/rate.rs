//! Per-client rate limiting middleware.
//!
//! Sliding one-minute window keyed by the peer address. Requests over the
//! configured limit get 429 with `Retry-After`.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::pipeline::error::PipelineError;

const WINDOW: Duration = Duration::from_secs(60);

/// Idle clients are forgotten once this many are tracked.
const MAX_TRACKED_CLIENTS: usize = 4096;

pub type SharedRateLimiter = Arc<Mutex<RateLimiter>>;

/// Per-client request counter over a sliding minute.
#[derive(Debug)]
pub struct RateLimiter {
    windows: HashMap<String, VecDeque<Instant>>,
    per_minute: u32,
}

impl RateLimiter {
    pub fn per_minute(per_minute: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
        }
    }

    pub fn shared(per_minute: u32) -> SharedRateLimiter {
        Arc::new(Mutex::new(Self::per_minute(per_minute)))
    }

    /// Record a request from `client`. `Err(retry_after_secs)` when the
    /// client is over its limit; refused requests are not counted.
    pub fn check(&mut self, client: &str) -> Result<(), u64> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&mut self, client: &str, now: Instant) -> Result<(), u64> {
        if self.windows.len() > MAX_TRACKED_CLIENTS {
            self.windows
                .retain(|_, hits| hits.back().is_some_and(|t| now.duration_since(*t) < WINDOW));
        }

        let hits = self.windows.entry(client.to_string()).or_default();
        while hits.front().is_some_and(|t| now.duration_since(*t) >= WINDOW) {
            hits.pop_front();
        }

        if hits.len() >= self.per_minute as usize {
            let oldest = hits.front().copied().unwrap_or(now);
            let wait = WINDOW.saturating_sub(now.duration_since(oldest));
            return Err(wait.as_secs().max(1));
        }
        hits.push_back(now);
        Ok(())
    }
}

/// Peer IP when the server was started with connect info.
fn rate_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "local".to_string())
}

pub async fn limit(State(limiter): State<SharedRateLimiter>, req: Request, next: Next) -> Response {
    match limit_inner(&limiter, &req) {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

fn limit_inner(limiter: &Mutex<RateLimiter>, req: &Request) -> Result<(), ApiError> {
    let key = rate_key(req);
    let mut limiter = limiter
        .lock()
        .map_err(|_| PipelineError::Internal("rate limiter lock poisoned".into()))?;
    limiter.check(&key).map_err(|retry_after| {
        tracing::warn!(client = %key, retry_after, "Rate limit exceeded");
        ApiError::RateLimited { retry_after }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit() {
        let mut limiter = RateLimiter::per_minute(2);
        let now = Instant::now();
        assert!(limiter.check_at("ip:10.0.0.1", now).is_ok());
        assert!(limiter.check_at("ip:10.0.0.1", now).is_ok());
        assert_eq!(limiter.check_at("ip:10.0.0.1", now), Err(60));
    }

    #[test]
    fn isolates_clients() {
        let mut limiter = RateLimiter::per_minute(1);
        let now = Instant::now();
        assert!(limiter.check_at("ip:10.0.0.1", now).is_ok());
        assert!(limiter.check_at("ip:10.0.0.2", now).is_ok());
        assert!(limiter.check_at("ip:10.0.0.1", now).is_err());
    }

    #[test]
    fn window_slides() {
        let mut limiter = RateLimiter::per_minute(1);
        let start = Instant::now();
        assert!(limiter.check_at("local", start).is_ok());
        assert_eq!(limiter.check_at("local", start + Duration::from_secs(45)), Err(15));
        assert!(limiter.check_at("local", start + WINDOW).is_ok());
    }
}
