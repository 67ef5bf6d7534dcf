/*
 * Responsibility
 * - URL structure behind the gate
 * - /health is explicit; every other path falls through to the page renderer
 * - Whether a path is reachable is decided by the gate, never here
 */
use axum::{Router, routing::get};

use crate::api::handlers::{health::health, page::page};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health)).fallback(page)
}
