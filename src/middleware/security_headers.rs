//! Security-related response headers + per-request CSP nonce.
//!
//! Two layers:
//! - `apply`: fresh nonce per request, threaded into the request (`CspNonce`
//!   extension + `x-nonce` header) and into the response CSP
//! - `apply_static`: static hardening headers + fallback CSP via
//!   `SetResponseHeaderLayer::if_not_present`. Installed outermost so transport
//!   errors (408/413/500) leave with them too
//!
//! Both only set headers that are absent (idempotent).

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, header::HeaderName, header::HeaderValue},
    middleware::{self, Next},
    response::Response,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::services::nonce::CspNonce;

pub const NONCE_HEADER: &str = "x-nonce";

const CSP_HEADER: &str = "content-security-policy";

/// Used when no per-request nonce reached the response.
pub const FALLBACK_CSP: &str = "default-src 'self'; frame-ancestors 'none'";

const STATIC_HEADERS: [(&str, &str); 5] = [
    // Prevent MIME sniffing
    ("x-content-type-options", "nosniff"),
    // Clickjacking protection (legacy; CSP frame-ancestors is the modern one)
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    // Limit referrer leakage
    ("referrer-policy", "strict-origin-when-cross-origin"),
    // Disable powerful browser features by default
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
];

/// Per-request nonce + nonce-bearing CSP. Apply inside the transport layers.
pub fn apply(router: Router) -> Router {
    router.layer(middleware::from_fn(security_headers_middleware))
}

/// Static headers for every response, including ones produced by outer layers.
/// Must be the last layer applied.
pub fn apply_static(router: Router) -> Router {
    let router = STATIC_HEADERS.into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ))
    });
    router.layer(SetResponseHeaderLayer::if_not_present(
        HeaderName::from_static(CSP_HEADER),
        HeaderValue::from_static(FALLBACK_CSP),
    ))
}

async fn security_headers_middleware(mut req: Request<Body>, next: Next) -> Response {
    let nonce = CspNonce::generate();

    // Never trust a client-supplied nonce.
    req.headers_mut().remove(NONCE_HEADER);
    if let Ok(v) = HeaderValue::from_str(nonce.as_str()) {
        req.headers_mut()
            .insert(HeaderName::from_static(NONCE_HEADER), v);
    }
    req.extensions_mut().insert(nonce.clone());

    let mut resp = next.run(req).await;
    apply_headers(resp.headers_mut(), &nonce);
    resp
}

/// Set each hardening header unless already present. Safe to call more than once.
pub fn apply_headers(headers: &mut HeaderMap, nonce: &CspNonce) {
    for (name, value) in STATIC_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert(HeaderValue::from_static(value));
    }

    let csp = HeaderValue::from_str(&nonce.content_security_policy()).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "csp header rejected; falling back to static policy");
        HeaderValue::from_static(FALLBACK_CSP)
    });
    headers
        .entry(HeaderName::from_static(CSP_HEADER))
        .or_insert(csp);

    // The nonce travels in the CSP only.
    headers.remove(NONCE_HEADER);
}
