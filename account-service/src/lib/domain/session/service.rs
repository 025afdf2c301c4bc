use std::sync::Arc;

use auth::Authenticator;
use chrono::Duration;
use chrono::Utc;

use crate::domain::session::errors::SessionError;
use crate::domain::session::models::Session;
use crate::domain::session::models::SessionId;
use crate::domain::session::ports::SessionStore;
use crate::domain::user::models::UserId;

/// Session manager.
///
/// Issues, resolves, rotates and destroys server-side sessions. Browsers only
/// ever hold the session id, signed with the application secret.
pub struct SessionService<SS>
where
    SS: SessionStore,
{
    store: Arc<SS>,
    authenticator: Arc<Authenticator>,
    lifetime: Duration,
    remember_lifetime: Duration,
}

impl<SS> SessionService<SS>
where
    SS: SessionStore,
{
    /// # Arguments
    /// * `lifetime` - Idle lifetime of browser sessions
    /// * `remember_lifetime` - Fixed lifetime of "remember me" sessions
    pub fn new(
        store: Arc<SS>,
        authenticator: Arc<Authenticator>,
        lifetime: Duration,
        remember_lifetime: Duration,
    ) -> Self {
        Self {
            store,
            authenticator,
            lifetime,
            remember_lifetime,
        }
    }

    /// Create and store a new anonymous session.
    pub async fn start(&self) -> Result<Session, SessionError> {
        let session = Session::anonymous(self.lifetime);
        self.store.insert(session.clone()).await?;
        Ok(session)
    }

    /// Resolve the session named by a cookie value.
    ///
    /// Missing, tampered and expired sessions are replaced by a fresh anonymous
    /// one. Browser sessions have their idle expiry pushed back.
    pub async fn resolve(&self, cookie_value: Option<&str>) -> Result<Session, SessionError> {
        let Some(cookie_value) = cookie_value else {
            return self.start().await;
        };

        let id = match self.authenticator.open_session(cookie_value) {
            Ok(id) => SessionId::from(id),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding unreadable session cookie");
                return self.start().await;
            }
        };

        let now = Utc::now();
        match self.store.get(&id).await? {
            Some(session) if session.is_expired(now) => {
                self.store.remove(&session.id).await?;
                self.start().await
            }
            Some(mut session) => {
                if !session.remember {
                    session.expires_at = now + self.lifetime;
                }
                Ok(session)
            }
            None => self.start().await,
        }
    }

    /// Bind a user to the session, rotating its id and CSRF token.
    ///
    /// Pending flash messages carry over to the new session.
    pub async fn login(
        &self,
        session: Session,
        user_id: UserId,
        remember: bool,
    ) -> Result<Session, SessionError> {
        self.store.remove(&session.id).await?;

        let lifetime = if remember {
            self.remember_lifetime
        } else {
            self.lifetime
        };

        let mut rotated = Session::anonymous(lifetime);
        rotated.user_id = Some(user_id);
        rotated.remember = remember;
        rotated.flashes = session.flashes;

        self.store.insert(rotated.clone()).await?;

        tracing::info!(user_id = %user_id, remember, "Session established");

        Ok(rotated)
    }

    /// Destroy the session and issue a fresh anonymous one.
    pub async fn logout(&self, session: Session) -> Result<Session, SessionError> {
        self.store.remove(&session.id).await?;
        self.start().await
    }

    /// Persist changes made to a session during a request.
    ///
    /// A session removed from the store while the request ran (logout,
    /// purge) is never written back; a fresh anonymous session carrying the
    /// pending flashes is issued instead and returned.
    pub async fn save(&self, session: Session) -> Result<Session, SessionError> {
        match self.store.update(session.clone()).await {
            Ok(()) => Ok(session),
            Err(SessionError::NotFound(_)) => {
                tracing::debug!(
                    authenticated = session.is_authenticated(),
                    "Session ended during request; issuing a new one"
                );
                let mut fresh = Session::anonymous(self.lifetime);
                fresh.flashes = session.flashes;
                self.store.insert(fresh.clone()).await?;
                Ok(fresh)
            }
            Err(e) => Err(e),
        }
    }

    /// Signed cookie value naming the session.
    pub fn cookie_value(&self, session: &Session) -> Result<String, SessionError> {
        let remaining = session.expires_at - Utc::now();
        Ok(self
            .authenticator
            .sign_session(session.id.as_str(), remaining)?)
    }

    /// Cookie `Max-Age` for the session. Browser sessions have none.
    pub fn cookie_max_age(&self, session: &Session) -> Option<Duration> {
        session
            .remember
            .then(|| session.expires_at - Utc::now())
    }

    pub async fn purge_expired(&self) -> Result<usize, SessionError> {
        self.store.purge_expired(Utc::now()).await
    }
}
