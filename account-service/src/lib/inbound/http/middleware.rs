use std::sync::Arc;

use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::SameSite;
use axum_extra::extract::CookieJar;
use tokio::sync::Mutex;

use super::handlers::AppError;
use crate::domain::session::models::FlashMessage;
use crate::domain::session::models::Identity;
use crate::domain::session::models::Session;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::router::AppState;
use crate::user::errors::UserError;

pub const SESSION_COOKIE: &str = "session";

/// Request-scoped handle on the current session.
///
/// Handlers mutate it; the session middleware persists whatever it holds once
/// the handler has produced a response.
#[derive(Debug, Clone)]
pub struct CurrentSession(Arc<Mutex<Session>>);

impl CurrentSession {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn snapshot(&self) -> Session {
        self.0.lock().await.clone()
    }

    pub async fn replace(&self, session: Session) {
        *self.0.lock().await = session;
    }

    pub async fn csrf_token(&self) -> String {
        self.0.lock().await.csrf_token.clone()
    }

    pub async fn flash(&self, message: FlashMessage) {
        self.0.lock().await.flash(message);
    }

    pub async fn take_flashes(&self) -> Vec<FlashMessage> {
        self.0.lock().await.take_flashes()
    }
}

/// Resolve the session and identity for every request and write the session
/// cookie on the way out.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut session = state
        .sessions
        .resolve(jar.get(SESSION_COOKIE).map(|cookie| cookie.value()))
        .await?;

    let identity = match session.user_id {
        Some(user_id) => match state.user_service.get_user(&user_id).await {
            Ok(user) => Identity::Authenticated(user),
            Err(UserError::NotFound(_)) => {
                tracing::info!(user_id = %user_id, "Session user no longer exists");
                session.user_id = None;
                Identity::Anonymous
            }
            Err(e) => return Err(e.into()),
        },
        None => Identity::Anonymous,
    };

    let current = CurrentSession::new(session);
    req.extensions_mut().insert(current.clone());
    req.extensions_mut().insert(identity);

    let mut response = next.run(req).await;

    let session = state.sessions.save(current.snapshot().await).await?;

    let cookie = session_cookie(&state, &session)?;
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    response.headers_mut().append(header::SET_COOKIE, value);

    Ok(response)
}

fn session_cookie(state: &AppState, session: &Session) -> Result<Cookie<'static>, AppError> {
    let value = state.sessions.cookie_value(session)?;

    let mut cookie = Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(state.config.security.secure_cookies)
        .build();

    if let Some(max_age) = state.sessions.cookie_max_age(session) {
        cookie.set_max_age(time::Duration::seconds(max_age.num_seconds()));
    }

    Ok(cookie)
}

/// Redirect anonymous visitors to the login page, remembering where they
/// were going.
pub async fn require_login(req: Request, next: Next) -> Response {
    let authenticated = req
        .extensions()
        .get::<Identity>()
        .is_some_and(Identity::is_authenticated);

    if authenticated {
        return next.run(req).await;
    }

    let current = req.extensions().get::<CurrentSession>().cloned();
    if let Some(current) = current {
        current
            .flash(FlashMessage::info("Please log in to access this page."))
            .await;
    }

    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Redirect::to(&login_url(target)).into_response()
}

/// `/login?next=<target>` with the target percent-encoded.
pub fn login_url(target: &str) -> String {
    format!("/login?next={}", percent_encode(target))
}

fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
