use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::session::errors::SessionError;
use crate::domain::session::models::Session;
use crate::domain::session::models::SessionId;

/// Server-side storage for session records.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn insert(&self, session: Session) -> Result<(), SessionError>;

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError>;

    /// Replace an existing record.
    ///
    /// # Errors
    /// * `NotFound` - No record with this id
    async fn update(&self, session: Session) -> Result<(), SessionError>;

    async fn remove(&self, id: &SessionId) -> Result<(), SessionError>;

    /// Drop every record expired at `now` and return how many were dropped.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, SessionError>;
}
