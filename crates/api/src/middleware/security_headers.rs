//! Security headers middleware.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";

/// Adds `X-Content-Type-Options`, `X-Frame-Options` and `X-XSS-Protection`
/// to every response, plus `Strict-Transport-Security` when
/// `security.hsts_enabled` is set. Only enable HSTS behind TLS termination.
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    apply_security_headers(response.headers_mut(), state.config.security.hsts_enabled);
    response
}

fn apply_security_headers(headers: &mut axum::http::HeaderMap, hsts: bool) {
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    if hsts {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_VALUE),
        );
    }
}
