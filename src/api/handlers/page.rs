/*
 * Responsibility
 * - Placeholder for the external page renderer
 * - Shows how markup picks up the per-request nonce and the gate context
 *
 * Notes
 * - The request path is never echoed back into markup
 */
use axum::{Extension, response::Html};

use crate::api::extractors::GateCtxExtractor;
use crate::services::nonce::CspNonce;

pub async fn page(
    ctx: Option<GateCtxExtractor>,
    nonce: Option<Extension<CspNonce>>,
) -> Html<String> {
    let nonce_attr = nonce
        .map(|Extension(n)| format!(" nonce=\"{}\"", n.as_str()))
        .unwrap_or_default();

    let (category, signed_in, role) = match ctx {
        Some(GateCtxExtractor(ctx)) => (
            ctx.category.to_string(),
            ctx.auth.has_valid_session(),
            ctx.auth
                .role
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| "none".to_string()),
        ),
        None => ("excluded".to_string(), false, "none".to_string()),
    };

    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>route-gate</title>\
         <script{nonce_attr}>window.__GATE__={{\"category\":\"{category}\",\"signedIn\":{signed_in},\"role\":\"{role}\"}};</script>\
         </head><body><main data-category=\"{category}\"></main></body></html>\n"
    ))
}
