use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::{StatusCode, request::Parts};

use crate::state::AppState;

use super::GateCtx;

/// Extractor for the `GateCtx` the gate middleware stored in request extensions.
/// Rejects with 401 when missing (excluded path, or the gate is not installed).
/// Use `Option<GateCtxExtractor>` on handlers that also serve excluded paths.
pub struct GateCtxExtractor(pub GateCtx);

impl FromRequestParts<AppState> for GateCtxExtractor {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<GateCtx>()
            .cloned()
            .map(GateCtxExtractor)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

impl OptionalFromRequestParts<AppState> for GateCtxExtractor {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<GateCtx>().cloned().map(GateCtxExtractor))
    }
}
