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
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::User;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::middleware::CurrentSession;
use crate::inbound::http::router::AppState;
use crate::inbound::http::views;
use crate::inbound::http::views::FieldErrors;
use crate::inbound::http::views::FormValues;
use crate::inbound::http::views::PageContext;

/// Profile form body. A blank password leaves the current one in place.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

fn current_user(identity: &Identity) -> Result<&User, AppError> {
    identity
        .user()
        .ok_or_else(|| AppError::InternalServerError("profile reached without a user".into()))
}

pub async fn profile_form(
    Extension(current): Extension<CurrentSession>,
    Extension(identity): Extension<Identity>,
) -> Result<Response, AppError> {
    let user = current_user(&identity)?;
    let values = FormValues {
        username: user.username.as_str().to_string(),
        email: user.email.as_str().to_string(),
        remember: false,
    };

    let ctx = PageContext::load(&current, &identity).await;
    Ok(views::profile(&ctx, &values, &FieldErrors::default()).into_response())
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Extension(identity): Extension<Identity>,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let user = current_user(&identity)?;
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
        false,
        &mut errors,
    );

    if let (Some((username, email)), true) = (parsed, errors.is_empty()) {
        let command = UpdateProfileCommand::new(username, email, Some(form.password));
        match state.user_service.update_profile(&user.id, command).await {
            Ok(_) => {
                current
                    .flash(FlashMessage::success("Your profile has been updated!"))
                    .await;
                return Ok(Redirect::to("/profile").into_response());
            }
            Err(e) => field_error(e, &mut errors)?,
        }
    }

    let ctx = PageContext::load(&current, &identity).await;
    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        views::profile(&ctx, &values, &errors),
    )
        .into_response())
}
