//! Edge authorization gate: runs before any page handler.
//!
//! - classify + evaluate + decide happen in `services::gate::Gate` (HTTP-agnostic)
//! - this layer only executes the outcome: 307 redirect, or pass-through with
//!   `GateCtx` stored in request extensions for handlers
//! - no error type: every failure ends as pass-through / login / forbidden

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::api::extractors::GateCtx;
use crate::middleware::security_headers;
use crate::services::nonce::CspNonce;
use crate::state::AppState;

/// Install the gate on every route of `router`.
///
/// Apply before `security_headers::apply` so the header layer wraps the gate.
pub fn apply(router: Router, state: AppState) -> Router {
    router.layer(middleware::from_fn_with_state(state, gate_middleware))
}

async fn gate_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let outcome = state.gate.check(
        original_uri.path(),
        original_uri.query(),
        req.headers(),
        Utc::now(),
    );

    if let Some(redirect) = outcome.redirect {
        let mut resp = redirect.into_response();
        // The outer header layer does this too; redirects must carry headers even without it.
        let nonce = req
            .extensions()
            .get::<CspNonce>()
            .cloned()
            .unwrap_or_else(CspNonce::generate);
        security_headers::apply_headers(resp.headers_mut(), &nonce);
        return resp;
    }

    if let Some(auth) = outcome.auth {
        req.extensions_mut().insert(GateCtx {
            category: outcome.category,
            auth,
        });
    }

    next.run(req).await
}
