use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Claims carried by the signed session cookie.
///
/// The cookie only names the server-side session; everything else about
/// the session lives in the session store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Session identifier
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Claims for a session that expires after `lifetime`.
    pub fn for_session(session_id: impl ToString, lifetime: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: session_id.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }
}
