use std::collections::HashMap;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use crate::config::RateLimit;
use crate::config::RateLimitConfig;

/// Key used when the peer address is unavailable.
const UNKNOWN_CLIENT: &str = "unknown";

/// Sliding-window request counter for one quota.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    hits: RwLock<HashMap<String, VecDeque<Instant>>>,
}

/// A request refused by a limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub limit: RateLimit,
    pub retry_after: Duration,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            hits: RwLock::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Record a hit for `key`, or refuse it when the window is full.
    pub fn check(&self, key: &str) -> Result<u32, RateLimitExceeded> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<u32, RateLimitExceeded> {
        let mut hits = self.hits.write().unwrap_or_else(PoisonError::into_inner);
        let window = hits.entry(key.to_string()).or_default();

        self.admit(window, now)?;
        window.push_back(now);
        Ok(self.limit.max_requests - window.len() as u32)
    }

    /// Drop hits that left the window and refuse when it is still full.
    /// Records nothing.
    fn admit(&self, window: &mut VecDeque<Instant>, now: Instant) -> Result<(), RateLimitExceeded> {
        while window
            .front()
            .is_some_and(|&hit| now.duration_since(hit) >= self.limit.window)
        {
            window.pop_front();
        }

        if window.len() >= self.limit.max_requests as usize {
            let retry_after = window
                .front()
                .map(|&oldest| self.limit.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(self.limit.window);
            return Err(RateLimitExceeded {
                limit: self.limit,
                retry_after,
            });
        }

        Ok(())
    }

    /// Forget clients whose every hit has left the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut hits = self.hits.write().unwrap_or_else(PoisonError::into_inner);
        hits.retain(|_, window| {
            window
                .back()
                .is_some_and(|&hit| now.duration_since(hit) < self.limit.window)
        });
    }
}

/// All limiters of the application.
///
/// Global limiters count every request. Route limiters count only form
/// submissions (POST) to their path.
#[derive(Debug, Clone)]
pub struct RateLimiters {
    global: Arc<Vec<RateLimiter>>,
    routes: Arc<HashMap<&'static str, RateLimiter>>,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let global = vec![
            RateLimiter::new(config.default_day),
            RateLimiter::new(config.default_hour),
        ];

        let mut routes = HashMap::new();
        routes.insert("/login", RateLimiter::new(config.login));
        routes.insert("/register", RateLimiter::new(config.register));

        Self {
            global: Arc::new(global),
            routes: Arc::new(routes),
        }
    }

    /// Check every limiter that applies to a request.
    ///
    /// The hit is recorded only when all of them admit it, so a request
    /// refused by a route quota does not use up the global ones.
    pub fn check(&self, client: &str, method: &Method, path: &str) -> Result<(), RateLimitExceeded> {
        self.check_at(client, method, path, Instant::now())
    }

    fn check_at(
        &self,
        client: &str,
        method: &Method,
        path: &str,
        now: Instant,
    ) -> Result<(), RateLimitExceeded> {
        let route = if method == Method::POST {
            self.routes.get(path)
        } else {
            None
        };
        let limiters: Vec<&RateLimiter> = self.global.iter().chain(route).collect();

        // Locks are always taken global first, then route.
        let mut guards: Vec<_> = limiters
            .iter()
            .map(|limiter| limiter.hits.write().unwrap_or_else(PoisonError::into_inner))
            .collect();

        for (limiter, hits) in limiters.iter().zip(guards.iter_mut()) {
            limiter.admit(hits.entry(client.to_string()).or_default(), now)?;
        }

        for hits in guards.iter_mut() {
            hits.entry(client.to_string()).or_default().push_back(now);
        }

        Ok(())
    }

    pub fn prune(&self) {
        self.global.iter().for_each(RateLimiter::prune);
        self.routes.values().for_each(RateLimiter::prune);
    }
}

/// Client key for rate limiting: the peer IP address.
pub fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Reject requests over any applicable quota with 429.
pub async fn rate_limit(
    State(limiters): State<RateLimiters>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    let path = request.uri().path().to_string();

    match limiters.check(&client, request.method(), &path) {
        Ok(()) => next.run(request).await,
        Err(exceeded) => {
            tracing::warn!(
                client = %client,
                path = %path,
                limit = %exceeded.limit,
                retry_after_secs = exceeded.retry_after.as_secs(),
                "Rate limit exceeded"
            );

            let retry_after = exceeded.retry_after.as_secs().max(1).to_string();
            let mut response = (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}
