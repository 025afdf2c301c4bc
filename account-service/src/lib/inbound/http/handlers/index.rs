use axum::response::Html;
use axum::Extension;

use crate::domain::session::models::Identity;
use crate::inbound::http::middleware::CurrentSession;
use crate::inbound::http::views;
use crate::inbound::http::views::PageContext;

pub async fn index(
    Extension(current): Extension<CurrentSession>,
    Extension(identity): Extension<Identity>,
) -> Html<String> {
    let ctx = PageContext::load(&current, &identity).await;
    views::index(&ctx)
}
