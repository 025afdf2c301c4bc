use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;

use auth::PasswordPolicy;

use super::views;
use super::views::FieldErrors;
use crate::domain::session::errors::SessionError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Username;
use crate::user::errors::UserError;

pub mod dashboard;
pub mod health;
pub mod index;
pub mod login;
pub mod logout;
pub mod profile;
pub mod register;

/// Failures that end a request with an error page.
///
/// Expected outcomes such as bad credentials or invalid form fields are
/// rendered by the handlers themselves and never reach this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    InternalServerError(String),
    BadRequest(String),
    NotFound(String),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::InternalServerError(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "Something went wrong. Please try again later.".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", msg),
        };

        (status, views::error_page(title, &message)).into_response()
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(_) => AppError::NotFound(err.to_string()),
            UserError::InvalidUsername(_)
            | UserError::InvalidEmail(_)
            | UserError::WeakPassword(_)
            | UserError::UsernameAlreadyExists(_)
            | UserError::EmailAlreadyExists(_)
            | UserError::InvalidCredentials => AppError::BadRequest(err.to_string()),
            UserError::Password(_) | UserError::DatabaseError(_) | UserError::Unknown(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

const REQUIRED: &str = "This field is required.";
const PASSWORDS_MUST_MATCH: &str = "Passwords must match.";

/// Parse the username and email fields shared by registration and profile.
fn parse_identity_fields(
    username: &str,
    email: &str,
    errors: &mut FieldErrors,
) -> Option<(Username, EmailAddress)> {
    let username = if username.trim().is_empty() {
        errors.add("username", REQUIRED);
        None
    } else {
        Username::new(username.to_string())
            .map_err(|e| errors.add("username", e.to_string()))
            .ok()
    };

    let email = if email.trim().is_empty() {
        errors.add("email", REQUIRED);
        None
    } else {
        EmailAddress::new(email.to_string())
            .map_err(|_| errors.add("email", "Invalid email address."))
            .ok()
    };

    username.zip(email)
}

/// Check a password and its confirmation.
///
/// With `required` unset an empty password is accepted and means "unchanged".
fn check_password_fields(
    policy: &PasswordPolicy,
    password: &str,
    confirm_password: &str,
    required: bool,
    errors: &mut FieldErrors,
) {
    if password.is_empty() {
        if required {
            errors.add("password", REQUIRED);
        }
    } else if let Err(rule) = policy.validate(password) {
        errors.add("password", rule.to_string());
    }

    if required && confirm_password.is_empty() {
        errors.add("confirm_password", REQUIRED);
    } else if password != confirm_password {
        errors.add("confirm_password", PASSWORDS_MUST_MATCH);
    }
}

/// Move a domain error about a form field next to that field.
///
/// Returns the error back when it is not about a field.
fn field_error(err: UserError, errors: &mut FieldErrors) -> Result<(), UserError> {
    match err {
        UserError::UsernameAlreadyExists(_) | UserError::InvalidUsername(_) => {
            errors.add("username", err.to_string())
        }
        UserError::EmailAlreadyExists(_) | UserError::InvalidEmail(_) => {
            errors.add("email", err.to_string())
        }
        UserError::WeakPassword(rule) => errors.add("password", rule.to_string()),
        other => return Err(other),
    }
    Ok(())
}
