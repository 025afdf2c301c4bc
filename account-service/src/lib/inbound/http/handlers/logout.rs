use axum::extract::State;
use axum::response::Redirect;
use axum::Extension;

use super::AppError;
use crate::domain::session::models::FlashMessage;
use crate::domain::session::models::Identity;
use crate::inbound::http::middleware::CurrentSession;
use crate::inbound::http::router::AppState;

pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Extension(identity): Extension<Identity>,
) -> Result<Redirect, AppError> {
    let mut session = state.sessions.logout(current.snapshot().await).await?;
    session.flash(FlashMessage::info("You have been logged out."));
    current.replace(session).await;

    if let Some(user) = identity.user() {
        tracing::info!(user_id = %user.id, "User logged out");
    }

    Ok(Redirect::to("/"))
}
