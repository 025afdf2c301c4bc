use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use axum::Extension;

use crate::domain::session::models::Identity;
use crate::inbound::http::middleware::CurrentSession;
use crate::inbound::http::views;
use crate::inbound::http::views::PageContext;

pub async fn dashboard(
    Extension(current): Extension<CurrentSession>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let ctx = PageContext::load(&current, &identity).await;
    match identity.user() {
        Some(user) => views::dashboard(&ctx, user).into_response(),
        None => Redirect::to("/login").into_response(),
    }
}
