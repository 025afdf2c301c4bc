use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use axum::Extension;
use axum::Form;
use serde::Deserialize;

use super::AppError;
use super::REQUIRED;
use crate::domain::session::models::FlashMessage;
use crate::domain::session::models::Identity;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::middleware::CurrentSession;
use crate::inbound::http::router::AppState;
use crate::inbound::http::views;
use crate::inbound::http::views::FieldErrors;
use crate::inbound::http::views::FormValues;
use crate::inbound::http::views::PageContext;
use crate::user::errors::UserError;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    remember: Option<String>,
}

impl LoginForm {
    fn remember(&self) -> bool {
        self.remember
            .as_deref()
            .is_some_and(|value| !value.is_empty() && value != "false")
    }
}

/// Accept a post-login target only if it stays on this site.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|target| {
        target.starts_with('/')
            && !target.starts_with("//")
            && !target.contains('\\')
            && !target.chars().any(char::is_control)
    })
}

pub async fn login_form(
    Extension(current): Extension<CurrentSession>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<NextQuery>,
) -> Response {
    if identity.is_authenticated() {
        return Redirect::to("/dashboard").into_response();
    }

    let ctx = PageContext::load(&current, &identity).await;
    views::login(
        &ctx,
        &FormValues::default(),
        &FieldErrors::default(),
        safe_next(query.next.as_deref()),
    )
    .into_response()
}

pub async fn login(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if identity.is_authenticated() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let next = safe_next(query.next.as_deref());
    let values = FormValues {
        email: form.email.trim().to_string(),
        remember: form.remember(),
        ..FormValues::default()
    };

    let mut errors = FieldErrors::default();
    if form.email.trim().is_empty() {
        errors.add("email", REQUIRED);
    }
    if form.password.is_empty() {
        errors.add("password", REQUIRED);
    }
    if !errors.is_empty() {
        let ctx = PageContext::load(&current, &identity).await;
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            views::login(&ctx, &values, &errors, next),
        )
            .into_response());
    }

    match state
        .user_service
        .authenticate(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            let mut session = state
                .sessions
                .login(current.snapshot().await, user.id, values.remember)
                .await?;
            session.flash(FlashMessage::success("Login successful!"));
            current.replace(session).await;

            Ok(Redirect::to(next.unwrap_or("/dashboard")).into_response())
        }
        Err(UserError::InvalidCredentials) => {
            tracing::warn!("Failed login attempt");
            current
                .flash(FlashMessage::danger(
                    "Login unsuccessful. Please check email and password.",
                ))
                .await;

            let ctx = PageContext::load(&current, &identity).await;
            Ok(views::login(&ctx, &values, &FieldErrors::default(), next).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
