use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use axum::Extension;
use axum::Form;
use serde::Deserialize;

use super::check_password_fields;
use super::field_error;
use super::parse_identity_fields;
use super::AppError;
use crate::domain::session::models::FlashMessage;
use crate::domain::session::models::Identity;
use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::middleware::CurrentSession;
use crate::inbound::http::router::AppState;
use crate::inbound::http::views;
use crate::inbound::http::views::FieldErrors;
use crate::inbound::http::views::FormValues;
use crate::inbound::http::views::PageContext;

/// Registration form body (raw, unvalidated).
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

pub async fn register_form(
    Extension(current): Extension<CurrentSession>,
    Extension(identity): Extension<Identity>,
) -> Response {
    if identity.is_authenticated() {
        return Redirect::to("/dashboard").into_response();
    }

    let ctx = PageContext::load(&current, &identity).await;
    views::register(&ctx, &FormValues::default(), &FieldErrors::default()).into_response()
}

pub async fn register(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if identity.is_authenticated() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let values = FormValues {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        remember: false,
    };

    let mut errors = FieldErrors::default();
    let parsed = parse_identity_fields(&form.username, &form.email, &mut errors);
    check_password_fields(
        &state.password_policy,
        &form.password,
        &form.confirm_password,
        true,
        &mut errors,
    );

    if let (Some((username, email)), true) = (parsed, errors.is_empty()) {
        let command = CreateUserCommand::new(username, email, form.password);
        match state.user_service.register(command).await {
            Ok(_) => {
                current
                    .flash(FlashMessage::success(
                        "Your account has been created! You can now log in.",
                    ))
                    .await;
                return Ok(Redirect::to("/login").into_response());
            }
            Err(e) => field_error(e, &mut errors)?,
        }
    }

    let ctx = PageContext::load(&current, &identity).await;
    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        views::register(&ctx, &values, &errors),
    )
        .into_response())
}
