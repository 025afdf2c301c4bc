use std::sync::Arc;
use std::time::Duration;

use auth::PasswordPolicy;
use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::csrf::verify_csrf;
use super::handlers::dashboard::dashboard;
use super::handlers::health::health;
use super::handlers::index::index;
use super::handlers::login::login;
use super::handlers::login::login_form;
use super::handlers::logout::logout;
use super::handlers::profile::profile_form;
use super::handlers::profile::update_profile;
use super::handlers::register::register;
use super::handlers::register::register_form;
use super::middleware::load_session;
use super::middleware::require_login;
use super::rate_limit::rate_limit;
use super::rate_limit::RateLimiters;
use super::security::build_cors_layer;
use super::security::enforce_https;
use super::security::SecurityHeaders;
use crate::config::Config;
use crate::config::ConfigurationError;
use crate::domain::session::service::SessionService;
use crate::domain::user::ports::UserServicePort;
use crate::outbound::sessions::InMemorySessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_service: Arc<dyn UserServicePort>,
    pub sessions: Arc<SessionService<InMemorySessionStore>>,
    pub rate_limiters: RateLimiters,
    pub password_policy: PasswordPolicy,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        user_service: Arc<dyn UserServicePort>,
        sessions: Arc<SessionService<InMemorySessionStore>>,
    ) -> Self {
        Self {
            rate_limiters: RateLimiters::from_config(&config.rate_limit),
            password_policy: config.password.policy(),
            config,
            user_service,
            sessions,
        }
    }
}

/// Build the application router.
///
/// Layers, outermost first: tracing, CORS, security headers, HTTPS
/// redirect (when enabled), rate limiting, session, CSRF.
pub fn create_router(state: AppState) -> Result<Router, ConfigurationError> {
    let security_headers = SecurityHeaders::from_config(&state.config)?;
    let cors = build_cors_layer(&state.config)?;

    let public_routes = Router::new()
        .route("/", get(index))
        .route("/login", get(login_form).post(login))
        .route("/register", get(register_form).post(register));

    let protected_routes = Router::new()
        .route("/logout", get(logout))
        .route("/dashboard", get(dashboard))
        .route("/profile", get(profile_form).post(update_profile))
        .route_layer(middleware::from_fn(require_login));

    let mut router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(verify_csrf))
        .layer(middleware::from_fn_with_state(state.clone(), load_session))
        .merge(Router::new().route("/health", get(health)))
        .layer(middleware::from_fn_with_state(
            state.rate_limiters.clone(),
            rate_limit,
        ));

    if state.config.security.force_https {
        router = router.layer(middleware::from_fn(enforce_https));
    }

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Ok(security_headers
        .apply(router)
        .layer(cors)
        .layer(trace_layer)
        .with_state(state))
}
