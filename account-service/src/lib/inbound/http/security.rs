use axum::extract::Request;
use axum::http::header;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Router;
use tower_http::cors::AllowOrigin;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Config;
use crate::config::ConfigurationError;

const HSTS: &str = "max-age=31536000; includeSubDomains";
const PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=()";

/// Response headers added to every response.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        let security = &config.security;
        let mut headers = Vec::new();

        let csp = config.content_security_policy();
        headers.push((
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_str(&csp).map_err(|_| ConfigurationError::InvalidHeader(csp))?,
        ));

        if security.x_content_type_options {
            headers.push((
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ));
        }

        let frame_options = security.x_frame_options.to_ascii_uppercase();
        headers.push((
            header::X_FRAME_OPTIONS,
            HeaderValue::from_str(&frame_options)
                .map_err(|_| ConfigurationError::InvalidFrameOptions(frame_options.clone()))?,
        ));

        if config.environment.is_production() {
            if security.strict_transport_security {
                headers.push((
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static(HSTS),
                ));
            }
            headers.push((
                HeaderName::from_static("permissions-policy"),
                HeaderValue::from_static(PERMISSIONS_POLICY),
            ));
        }

        Ok(Self { headers })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.headers.iter()
    }

    /// Wrap a router so every response carries these headers.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.headers
            .iter()
            .fold(router, |router, (name, value)| {
                router.layer(SetResponseHeaderLayer::overriding(
                    name.clone(),
                    value.clone(),
                ))
            })
    }
}

/// CORS policy from configuration.
///
/// A `*` origin allows any origin; with credentials allowed the request
/// origin is mirrored back.
pub fn build_cors_layer(config: &Config) -> Result<CorsLayer, ConfigurationError> {
    let cors = &config.cors;

    let methods = cors
        .allowed_methods
        .iter()
        .map(|m| {
            Method::from_bytes(m.trim().as_bytes())
                .map_err(|_| ConfigurationError::InvalidCorsMethod(m.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let base = CorsLayer::new().allow_methods(methods).allow_headers([
        header::CONTENT_TYPE,
        header::ACCEPT,
        HeaderName::from_static(super::csrf::CSRF_HEADER),
    ]);

    let layer = if cors.allows_any_origin() {
        if cors.allow_credentials {
            base.allow_origin(AllowOrigin::mirror_request())
                .allow_credentials(true)
        } else {
            base.allow_origin(AllowOrigin::any())
        }
    } else {
        let origins = cors
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim())
                    .map_err(|_| ConfigurationError::InvalidHeader(origin.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        base.allow_origin(AllowOrigin::list(origins))
            .allow_credentials(cors.allow_credentials)
    };

    Ok(layer)
}

/// Permanently redirect plain-HTTP requests to HTTPS.
///
/// The scheme is judged by `X-Forwarded-Proto`, as set by the TLS-terminating
/// proxy. The health probe is exempt.
pub async fn enforce_https(req: Request, next: Next) -> Response {
    if req.uri().path() == "/health" || is_secure(&req) {
        return next.run(req).await;
    }

    let Some(host) = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "Missing Host header").into_response();
    };

    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    match HeaderValue::from_str(&format!("https://{}{}", host, path)) {
        Ok(location) => {
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid Host header").into_response(),
    }
}

fn is_secure(req: &Request) -> bool {
    if req.uri().scheme_str() == Some("https") {
        return true;
    }

    req.headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}
