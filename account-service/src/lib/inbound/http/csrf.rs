use axum::body::Body;
use axum::extract::FromRequest;
use axum::extract::Request;
use axum::http::header;
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Form;
use serde::Deserialize;

use super::middleware::CurrentSession;

/// Hidden form field carrying the token.
pub const CSRF_FIELD: &str = "csrf_token";

/// Header accepted in place of the form field.
pub const CSRF_HEADER: &str = "x-csrf-token";

const CSRF_FAILURE: &str = "The CSRF token is missing or invalid.";

/// Largest form body buffered for token extraction.
const MAX_FORM_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct CsrfForm {
    csrf_token: Option<String>,
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

fn reject(reason: &str) -> Response {
    tracing::warn!(reason, "CSRF check failed");
    (StatusCode::BAD_REQUEST, CSRF_FAILURE).into_response()
}

/// Reject state-changing requests whose token does not match the session.
///
/// Must run inside the session middleware.
pub async fn verify_csrf(req: Request, next: Next) -> Response {
    if !is_state_changing(req.method()) {
        return next.run(req).await;
    }

    let current = req.extensions().get::<CurrentSession>().cloned();
    let Some(current) = current else {
        return reject("no session");
    };
    let expected = current.csrf_token().await;

    let header_token = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let (provided, req) = match header_token {
        Some(token) => (Some(token), req),
        None if is_form(&req) => match form_token(req).await {
            Ok(found) => found,
            Err(response) => return response,
        },
        None => (None, req),
    };

    match provided {
        Some(token) if auth::tokens_match(&expected, &token) => next.run(req).await,
        Some(_) => reject("token mismatch"),
        None => reject("token missing"),
    }
}

/// Read the token from a form body and rebuild the request around the
/// buffered bytes.
async fn form_token(req: Request) -> Result<(Option<String>, Request), Response> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response())?;

    let probe = Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(bytes.clone()))
        .map_err(|_| reject("unreadable form"))?;

    let token = match Form::<CsrfForm>::from_request(probe, &()).await {
        Ok(Form(form)) => form.csrf_token,
        Err(_) => None,
    };

    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}
