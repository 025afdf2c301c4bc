use thiserror::Error;

/// Errors raised while resolving or persisting sessions.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid session cookie: {0}")]
    InvalidCookie(#[from] auth::JwtError),

    #[error("Session store error: {0}")]
    Store(String),
}
